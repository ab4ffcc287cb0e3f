//! # Profile Data Model
//!
//! The record collected by the intake dialog. Structured questions (sex,
//! diabetes, fitness level, goal, workout type) have a closed set of canonical
//! values; clients without buttons may answer with free text, which is kept
//! verbatim unless it names a canonical value.
//!
//! Every question field is written at most once. A second write is refused and
//! only [`ProfileData::default`] (a full session reset) clears the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::localization::{t_args_lang, t_lang};

/// A closed set of canonical answers for one structured question
pub trait ChoiceValue: Sized + Copy + 'static {
    /// Prefix used for this category's locale keys
    const LABEL_PREFIX: &'static str;

    /// Every canonical value, in display order
    fn all() -> &'static [Self];

    /// Canonical stored form, also used as the token value suffix
    fn code(&self) -> &'static str;

    fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|value| value.code() == code)
    }

    /// Localized button/summary label
    fn label(&self, language_code: Option<&str>) -> String {
        t_lang(&format!("{}-{}", Self::LABEL_PREFIX, self.code()), language_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl ChoiceValue for Sex {
    const LABEL_PREFIX: &'static str = "sex";

    fn all() -> &'static [Self] {
        &[Sex::Male, Sex::Female]
    }

    fn code(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiabetesStatus {
    Yes,
    No,
}

impl ChoiceValue for DiabetesStatus {
    const LABEL_PREFIX: &'static str = "diabetes";

    fn all() -> &'static [Self] {
        &[DiabetesStatus::Yes, DiabetesStatus::No]
    }

    fn code(&self) -> &'static str {
        match self {
            DiabetesStatus::Yes => "yes",
            DiabetesStatus::No => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ChoiceValue for FitnessLevel {
    const LABEL_PREFIX: &'static str = "level";

    fn all() -> &'static [Self] {
        &[
            FitnessLevel::Beginner,
            FitnessLevel::Intermediate,
            FitnessLevel::Advanced,
        ]
    }

    fn code(&self) -> &'static str {
        match self {
            FitnessLevel::Beginner => "beginner",
            FitnessLevel::Intermediate => "intermediate",
            FitnessLevel::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    MuscleGain,
    Maintenance,
    Endurance,
}

impl ChoiceValue for Goal {
    const LABEL_PREFIX: &'static str = "goal";

    fn all() -> &'static [Self] {
        &[
            Goal::WeightLoss,
            Goal::MuscleGain,
            Goal::Maintenance,
            Goal::Endurance,
        ]
    }

    fn code(&self) -> &'static str {
        match self {
            Goal::WeightLoss => "weight_loss",
            Goal::MuscleGain => "muscle_gain",
            Goal::Maintenance => "maintenance",
            Goal::Endurance => "endurance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Strength,
    Cardio,
    Mixed,
    Yoga,
    Pilates,
    Other,
}

impl ChoiceValue for WorkoutType {
    const LABEL_PREFIX: &'static str = "type";

    fn all() -> &'static [Self] {
        &[
            WorkoutType::Strength,
            WorkoutType::Cardio,
            WorkoutType::Mixed,
            WorkoutType::Yoga,
            WorkoutType::Pilates,
            WorkoutType::Other,
        ]
    }

    fn code(&self) -> &'static str {
        match self {
            WorkoutType::Strength => "strength",
            WorkoutType::Cardio => "cardio",
            WorkoutType::Mixed => "mixed",
            WorkoutType::Yoga => "yoga",
            WorkoutType::Pilates => "pilates",
            WorkoutType::Other => "other",
        }
    }
}

/// Answer to a structured question: a canonical value or verbatim free text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer<T> {
    Choice(T),
    Text(String),
}

impl<T: ChoiceValue> Answer<T> {
    /// Interpret typed text, recognising canonical values ("Weight loss" -> WeightLoss)
    pub fn from_text(text: &str) -> Self {
        let normalized = text
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");

        match T::from_code(&normalized) {
            Some(value) => Answer::Choice(value),
            None => Answer::Text(text.trim().to_string()),
        }
    }

    pub fn choice(&self) -> Option<T> {
        match self {
            Answer::Choice(value) => Some(*value),
            Answer::Text(_) => None,
        }
    }

    pub fn display(&self, language_code: Option<&str>) -> String {
        match self {
            Answer::Choice(value) => value.label(language_code),
            Answer::Text(text) => text.clone(),
        }
    }
}

/// Identifies one question of the questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Sex,
    Age,
    Height,
    Weight,
    Diabetes,
    Level,
    Goal,
    WorkoutType,
}

/// A single write to one profile field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Sex(Answer<Sex>),
    Age(u32),
    Height(u32),
    Weight(u32),
    Diabetes(Answer<DiabetesStatus>),
    Level(Answer<FitnessLevel>),
    Goal(Answer<Goal>),
    WorkoutType(Answer<WorkoutType>),
}

impl FieldUpdate {
    pub fn field(&self) -> ProfileField {
        match self {
            FieldUpdate::Sex(_) => ProfileField::Sex,
            FieldUpdate::Age(_) => ProfileField::Age,
            FieldUpdate::Height(_) => ProfileField::Height,
            FieldUpdate::Weight(_) => ProfileField::Weight,
            FieldUpdate::Diabetes(_) => ProfileField::Diabetes,
            FieldUpdate::Level(_) => ProfileField::Level,
            FieldUpdate::Goal(_) => ProfileField::Goal,
            FieldUpdate::WorkoutType(_) => ProfileField::WorkoutType,
        }
    }
}

/// The data collected from a user during intake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub sex: Option<Answer<Sex>>,
    pub age: Option<u32>,
    pub height_cm: Option<u32>,
    pub weight_kg: Option<u32>,
    pub diabetes: Option<Answer<DiabetesStatus>>,
    pub fitness_level: Option<Answer<FitnessLevel>>,
    pub goal: Option<Answer<Goal>>,
    pub workout_type: Option<Answer<WorkoutType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

fn write_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

impl ProfileData {
    /// Write a question field. Returns false (and changes nothing) if it was already set.
    pub fn apply(&mut self, update: FieldUpdate) -> bool {
        let field = update.field();
        let written = match update {
            FieldUpdate::Sex(value) => write_once(&mut self.sex, value),
            FieldUpdate::Age(value) => write_once(&mut self.age, value),
            FieldUpdate::Height(value) => write_once(&mut self.height_cm, value),
            FieldUpdate::Weight(value) => write_once(&mut self.weight_kg, value),
            FieldUpdate::Diabetes(value) => write_once(&mut self.diabetes, value),
            FieldUpdate::Level(value) => write_once(&mut self.fitness_level, value),
            FieldUpdate::Goal(value) => write_once(&mut self.goal, value),
            FieldUpdate::WorkoutType(value) => write_once(&mut self.workout_type, value),
        };
        if !written {
            debug!(field = ?field, "Refusing to overwrite profile field");
        }
        written
    }

    /// Record a confirmed payment. The first confirmation wins.
    pub fn record_payment(&mut self, reference: &str, at: DateTime<Utc>) -> bool {
        if self.payment_reference.is_some() {
            return false;
        }
        self.payment_reference = Some(reference.to_string());
        self.created_at = Some(at);
        true
    }

    pub fn has_diabetes(&self) -> bool {
        self.diabetes.as_ref().and_then(Answer::choice) == Some(DiabetesStatus::Yes)
    }

    pub fn goal_choice(&self) -> Option<Goal> {
        self.goal.as_ref().and_then(Answer::choice)
    }

    pub fn workout_choice(&self) -> Option<WorkoutType> {
        self.workout_type.as_ref().and_then(Answer::choice)
    }

    pub fn level_choice(&self) -> Option<FitnessLevel> {
        self.fitness_level.as_ref().and_then(Answer::choice)
    }

    /// JSON rendering used inside completion prompts
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Human-readable summary shown before payment
    pub fn summary(&self, language_code: Option<&str>) -> String {
        fn text<T: ChoiceValue>(answer: &Option<Answer<T>>, language_code: Option<&str>) -> String {
            answer
                .as_ref()
                .map(|a| a.display(language_code))
                .unwrap_or_else(|| "-".to_string())
        }
        fn number(value: Option<u32>) -> String {
            value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
        }

        t_args_lang(
            "profile-summary",
            &[
                ("sex", &text(&self.sex, language_code)),
                ("age", &number(self.age)),
                ("height", &number(self.height_cm)),
                ("weight", &number(self.weight_kg)),
                ("diabetes", &text(&self.diabetes, language_code)),
                ("level", &text(&self.fitness_level, language_code)),
                ("goal", &text(&self.goal, language_code)),
                ("type", &text(&self.workout_type, language_code)),
            ],
            language_code,
        )
    }
}
