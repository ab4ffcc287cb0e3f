use fitcoach::choice_token::{translate, TokenAction};
use fitcoach::dialogue::{advance, DialogState, Input};
use fitcoach::localization::t_lang;
use fitcoach::profile::{Answer, DiabetesStatus, FitnessLevel, Goal, Sex, WorkoutType};
use fitcoach::session::{Identity, Session};

fn press(session: &mut Session, token: &str) {
    match translate(token).expect("valid token") {
        TokenAction::Field(update) => {
            advance(session, &Input::Choice(update));
        }
        other => panic!("unexpected action {other:?}"),
    }
}

/// Walks the whole questionnaire with buttons and typed numbers
#[test]
fn test_full_questionnaire_with_buttons() {
    let mut session = Session::new(Identity(100));

    advance(&mut session, &Input::Text(""));
    assert_eq!(session.state, DialogState::AskSex);

    press(&mut session, "sex:female");
    assert_eq!(session.state, DialogState::AskAge);
    advance(&mut session, &Input::Text("29"));
    advance(&mut session, &Input::Text("168 cm"));
    advance(&mut session, &Input::Text("61"));
    assert_eq!(session.state, DialogState::AskDiabetes);

    press(&mut session, "dia:no");
    press(&mut session, "lvl:intermediate");
    press(&mut session, "gol:endurance");
    press(&mut session, "typ:yoga");
    assert_eq!(session.state, DialogState::Payment);

    let profile = &session.profile;
    assert_eq!(profile.sex, Some(Answer::Choice(Sex::Female)));
    assert_eq!(profile.age, Some(29));
    assert_eq!(profile.height_cm, Some(168));
    assert_eq!(profile.weight_kg, Some(61));
    assert_eq!(profile.diabetes, Some(Answer::Choice(DiabetesStatus::No)));
    assert_eq!(profile.fitness_level, Some(Answer::Choice(FitnessLevel::Intermediate)));
    assert_eq!(profile.goal, Some(Answer::Choice(Goal::Endurance)));
    assert_eq!(profile.workout_type, Some(Answer::Choice(WorkoutType::Yoga)));
    assert!(profile.payment_reference.is_none());
}

/// Clients without buttons can type every answer
#[test]
fn test_full_questionnaire_with_text() {
    let mut session = Session::new(Identity(101));
    let answers = [
        "", "Male", "41", "182", "90", "yes", "beginner", "weight loss", "swimming",
    ];
    for answer in answers {
        advance(&mut session, &Input::Text(answer));
    }

    assert_eq!(session.state, DialogState::Payment);
    assert_eq!(session.profile.sex, Some(Answer::Choice(Sex::Male)));
    assert!(session.profile.has_diabetes());
    assert_eq!(session.profile.goal_choice(), Some(Goal::WeightLoss));
    assert_eq!(
        session.profile.workout_type,
        Some(Answer::Text("swimming".to_string()))
    );
}

#[test]
fn test_numeric_states_reject_bad_input() {
    for (state, retry_key) in [
        (DialogState::AskAge, "retry-age"),
        (DialogState::AskHeight, "retry-height"),
        (DialogState::AskWeight, "retry-weight"),
    ] {
        let mut session = Session::new(Identity(102));
        session.state = state;
        for bad in ["abc", "", "0", "1.5", "-3"] {
            let reply = advance(&mut session, &Input::Text(bad));
            assert_eq!(session.state, state, "{bad:?} advanced {state:?}");
            assert_eq!(reply.text, t_lang(retry_key, None));
        }
    }
}

#[test]
fn test_payment_summary_lists_answers() {
    let mut session = Session::new(Identity(103));
    for answer in ["", "female", "35", "170", "65", "no", "advanced", "maintenance", "pilates"] {
        advance(&mut session, &Input::Text(answer));
    }
    let reply = advance(&mut session, &Input::Text("hello?"));

    assert_eq!(session.state, DialogState::Payment);
    assert!(reply.text.contains("170"));
    assert!(reply.text.contains("65"));
    assert!(reply.text.contains(&t_lang("type-pilates", None)));
    assert!(reply.text.contains("/pay"));
    assert!(reply.effect.is_none());
}

#[test]
fn test_localized_prompts_follow_session_language() {
    let mut session = Session::new(Identity(104));
    session.language_code = Some("ru".to_string());
    let reply = advance(&mut session, &Input::Text(""));
    assert_eq!(reply.text, t_lang("prompt-opening", Some("ru")));
    assert_eq!(reply.language_code.as_deref(), Some("ru"));

    let labels: Vec<String> = reply
        .choices
        .expect("sex buttons")
        .rows
        .into_iter()
        .flatten()
        .map(|button| button.label)
        .collect();
    assert!(labels.contains(&t_lang("sex-male", Some("ru"))));
}
