//! Follow-up topic answers offered once the programme has been delivered.
//!
//! Answers are composed from fixed locale sections, parameterized by the
//! collected profile. Nothing here touches dialog state.

use crate::localization::{t_args_lang, t_lang};
use crate::profile::{FitnessLevel, Goal, ProfileData, WorkoutType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Nutrition,
    Exercises,
    Progress,
    Diabetes,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Nutrition,
        Topic::Exercises,
        Topic::Progress,
        Topic::Diabetes,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Topic::Nutrition => "nutrition",
            Topic::Exercises => "exercises",
            Topic::Progress => "progress",
            Topic::Diabetes => "diabetes",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|topic| topic.code() == code)
    }

    pub fn label(&self, language_code: Option<&str>) -> String {
        t_lang(&format!("topic-{}", self.code()), language_code)
    }
}

/// Recommended daily calorie intake (kcal) for a body weight and goal
pub fn daily_calorie_range(weight_kg: u32, goal: Option<Goal>) -> (u32, u32) {
    let base = weight_kg * 30;
    match goal {
        Some(Goal::WeightLoss) => (base.saturating_sub(500), base.saturating_sub(400)),
        Some(Goal::MuscleGain) => (base + 300, base + 400),
        _ => (weight_kg * 28, base),
    }
}

/// Protein grams per day (1.6-2.0 g per kg)
pub fn protein_range(weight_kg: u32) -> (u32, u32) {
    (weight_kg * 16 / 10, weight_kg * 2)
}

/// Fat grams per day (0.8-1.0 g per kg)
pub fn fat_range(weight_kg: u32) -> (u32, u32) {
    (weight_kg * 8 / 10, weight_kg)
}

/// Water ml per day
pub fn water_ml(weight_kg: u32) -> u32 {
    weight_kg * 30
}

/// Compose the answer for `topic` from the session's profile
pub fn answer(topic: Topic, profile: &ProfileData, language_code: Option<&str>) -> String {
    let sections = match topic {
        Topic::Nutrition => nutrition(profile, language_code),
        Topic::Exercises => exercises(profile, language_code),
        Topic::Progress => vec![
            t_lang("topic-progress-title", language_code),
            t_lang("topic-progress-body", language_code),
        ],
        Topic::Diabetes => vec![
            t_lang("topic-diabetes-title", language_code),
            if profile.has_diabetes() {
                t_lang("topic-diabetes-yes", language_code)
            } else {
                t_lang("topic-diabetes-no", language_code)
            },
        ],
    };
    sections.join("\n\n")
}

fn nutrition(profile: &ProfileData, language_code: Option<&str>) -> Vec<String> {
    let weight = profile.weight_kg.unwrap_or_default();
    let height = profile.height_cm.unwrap_or_default();
    let (min_kcal, max_kcal) = daily_calorie_range(weight, profile.goal_choice());
    let (protein_min, protein_max) = protein_range(weight);
    let (fat_min, fat_max) = fat_range(weight);

    let calories_key = match profile.goal_choice() {
        Some(Goal::WeightLoss) => "topic-nutrition-calories-loss",
        Some(Goal::MuscleGain) => "topic-nutrition-calories-gain",
        _ => "topic-nutrition-calories-maintain",
    };

    let mut sections = vec![
        t_lang("topic-nutrition-title", language_code),
        t_args_lang(
            calories_key,
            &[
                ("weight", &weight.to_string()),
                ("height", &height.to_string()),
                ("min", &min_kcal.to_string()),
                ("max", &max_kcal.to_string()),
            ],
            language_code,
        ),
        t_args_lang(
            "topic-nutrition-macros",
            &[
                ("protein_min", &protein_min.to_string()),
                ("protein_max", &protein_max.to_string()),
                ("fat_min", &fat_min.to_string()),
                ("fat_max", &fat_max.to_string()),
            ],
            language_code,
        ),
        t_lang("topic-nutrition-meals", language_code),
        t_args_lang(
            "topic-nutrition-water",
            &[("water", &water_ml(weight).to_string())],
            language_code,
        ),
    ];

    if profile.has_diabetes() {
        sections.push(t_lang("topic-nutrition-diabetes", language_code));
    }
    sections
}

fn exercises(profile: &ProfileData, language_code: Option<&str>) -> Vec<String> {
    let plan_key = match profile.workout_choice() {
        Some(WorkoutType::Strength) => "topic-exercises-strength",
        Some(WorkoutType::Cardio) => "topic-exercises-cardio",
        _ => "topic-exercises-full-body",
    };

    let mut sections = vec![
        t_lang("topic-exercises-title", language_code),
        t_lang(plan_key, language_code),
        t_lang("topic-exercises-general", language_code),
    ];

    if profile.level_choice() == Some(FitnessLevel::Beginner) {
        sections.push(t_lang("topic-exercises-beginner", language_code));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calorie_ranges() {
        assert_eq!(daily_calorie_range(70, Some(Goal::WeightLoss)), (1600, 1700));
        assert_eq!(daily_calorie_range(70, Some(Goal::MuscleGain)), (2400, 2500));
        assert_eq!(daily_calorie_range(70, Some(Goal::Maintenance)), (1960, 2100));
        assert_eq!(daily_calorie_range(70, None), (1960, 2100));
        assert_eq!(daily_calorie_range(10, Some(Goal::WeightLoss)), (0, 0));
    }

    #[test]
    fn test_macro_ranges() {
        assert_eq!(protein_range(70), (112, 140));
        assert_eq!(fat_range(70), (56, 70));
        assert_eq!(water_ml(70), 2100);
    }

    #[test]
    fn test_topic_codes() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_code(topic.code()), Some(topic));
        }
        assert_eq!(Topic::from_code("sleep"), None);
    }
}
