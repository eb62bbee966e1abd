//! Calibrated question bank types
//!
//! Questions are immutable once authored: the kernel reads them but never
//! writes them back. Each question carries its IRT calibration, a Bloom
//! cognitive level, and the knowledge component it targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Answer option label, fixed to the four-choice A–D format
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AnswerLabel {
    A,
    B,
    C,
    D,
}

impl AnswerLabel {
    /// Label for an option position in authored order (0 → A, 3 → D)
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::C),
            3 => Some(Self::D),
            _ => None,
        }
    }

    /// String form of the label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnswerLabel {
    type Err = EngineError;

    /// Parse a submitted answer, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => Err(EngineError::InvalidArgument(format!(
                "selected answer must be one of A-D, got '{other}'"
            ))),
        }
    }
}

/// Bloom cognitive complexity tier attached to each item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
}

impl BloomLevel {
    /// Numeric tier (1 remember, 2 understand, 3 apply)
    pub fn tier(&self) -> u8 {
        match self {
            Self::Remember => 1,
            Self::Understand => 2,
            Self::Apply => 3,
        }
    }
}

impl From<BloomLevel> for u8 {
    fn from(level: BloomLevel) -> u8 {
        level.tier()
    }
}

impl TryFrom<u8> for BloomLevel {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Remember),
            2 => Ok(Self::Understand),
            3 => Ok(Self::Apply),
            other => Err(EngineError::InvalidArgument(format!(
                "bloom level must be 1-3, got {other}"
            ))),
        }
    }
}

/// 3PL calibration for one item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Discrimination, must be positive
    pub a: f64,
    /// Difficulty on the theta scale
    pub b: f64,
    /// Guessing floor, in `[0, 1)`
    pub c: f64,
}

impl IrtParams {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Reject calibrations outside the 3PL domain
    pub fn validate(&self) -> Result<()> {
        if !self.a.is_finite() || self.a <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "discrimination a must be positive, got {}",
                self.a
            )));
        }
        if !self.b.is_finite() {
            return Err(EngineError::InvalidArgument(
                "difficulty b must be finite".into(),
            ));
        }
        if !self.c.is_finite() || !(0.0..1.0).contains(&self.c) {
            return Err(EngineError::InvalidArgument(format!(
                "guessing c must be in [0, 1), got {}",
                self.c
            )));
        }
        Ok(())
    }
}

/// One answer option in authored order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

impl QuestionOption {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// An immutable calibrated item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub quiz_id: String,
    /// The question stem shown to the learner
    pub stem: String,
    /// Exactly four options, labelled A-D by position
    pub options: Vec<QuestionOption>,
    pub irt: IrtParams,
    pub bloom: BloomLevel,
    /// Knowledge component this item targets
    pub kc: String,
    /// Authored position, used by static-condition ordering
    pub order: u32,
}

impl Question {
    /// Label of the single correct option under A,B,C,D order
    ///
    /// A bank item with no correct option is a catalogue integrity failure,
    /// not a caller mistake.
    pub fn correct_label(&self) -> Result<AnswerLabel> {
        let index = self
            .options
            .iter()
            .position(|option| option.is_correct)
            .ok_or_else(|| {
                EngineError::Internal(format!("question '{}' has no correct option", self.id))
            })?;
        AnswerLabel::from_index(index).ok_or_else(|| {
            EngineError::Internal(format!(
                "question '{}' has its correct option outside A-D",
                self.id
            ))
        })
    }

    /// Validate the authoring invariants (four options, one correct, valid IRT)
    pub fn validate(&self) -> Result<()> {
        if self.options.len() != 4 {
            return Err(EngineError::InvalidArgument(format!(
                "question '{}' must have exactly 4 options, got {}",
                self.id,
                self.options.len()
            )));
        }
        let correct_count = self.options.iter().filter(|o| o.is_correct).count();
        if correct_count != 1 {
            return Err(EngineError::InvalidArgument(format!(
                "question '{}' must have exactly 1 correct option, got {correct_count}",
                self.id
            )));
        }
        self.irt.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            id: "q-001".into(),
            quiz_id: "quiz-1".into(),
            stem: "What is the capital of Scotland?".into(),
            options: vec![
                QuestionOption::new("Glasgow", false),
                QuestionOption::new("Edinburgh", true),
                QuestionOption::new("Aberdeen", false),
                QuestionOption::new("Dundee", false),
            ],
            irt: IrtParams::new(1.2, -0.8, 0.25),
            bloom: BloomLevel::Remember,
            kc: "UK_capitals".into(),
            order: 1,
        }
    }

    #[test]
    fn answer_label_parses_case_insensitively() {
        assert_eq!("a".parse::<AnswerLabel>().unwrap(), AnswerLabel::A);
        assert_eq!(" b ".parse::<AnswerLabel>().unwrap(), AnswerLabel::B);
        assert_eq!("D".parse::<AnswerLabel>().unwrap(), AnswerLabel::D);
    }

    #[test]
    fn answer_label_rejects_unknown_values() {
        let result = "E".parse::<AnswerLabel>();
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn answer_label_from_index_covers_four_positions() {
        assert_eq!(AnswerLabel::from_index(0), Some(AnswerLabel::A));
        assert_eq!(AnswerLabel::from_index(3), Some(AnswerLabel::D));
        assert_eq!(AnswerLabel::from_index(4), None);
    }

    #[test]
    fn bloom_level_roundtrips_through_u8() {
        for level in [BloomLevel::Remember, BloomLevel::Understand, BloomLevel::Apply] {
            let tier: u8 = level.into();
            assert_eq!(BloomLevel::try_from(tier).unwrap(), level);
        }
        assert!(BloomLevel::try_from(4).is_err());
    }

    #[test]
    fn irt_params_validation_rejects_bad_domains() {
        assert!(IrtParams::new(1.0, 0.0, 0.2).validate().is_ok());
        assert!(IrtParams::new(0.0, 0.0, 0.2).validate().is_err());
        assert!(IrtParams::new(-1.0, 0.0, 0.2).validate().is_err());
        assert!(IrtParams::new(1.0, 0.0, 1.0).validate().is_err());
        assert!(IrtParams::new(1.0, 0.0, -0.1).validate().is_err());
    }

    #[test]
    fn correct_label_follows_authored_order() {
        let question = sample_question();
        assert_eq!(question.correct_label().unwrap(), AnswerLabel::B);
    }

    #[test]
    fn correct_label_fails_without_correct_option() {
        let mut question = sample_question();
        for option in &mut question.options {
            option.is_correct = false;
        }
        assert!(matches!(
            question.correct_label(),
            Err(EngineError::Internal(_))
        ));
    }

    #[test]
    fn validate_enforces_four_options_and_one_correct() {
        let mut question = sample_question();
        assert!(question.validate().is_ok());

        question.options.pop();
        assert!(question.validate().is_err());

        let mut doubled = sample_question();
        doubled.options[0].is_correct = true;
        assert!(doubled.validate().is_err());
    }

    #[test]
    fn question_serialization_roundtrip() {
        let question = sample_question();
        let json = serde_json::to_string(&question).unwrap();
        let parsed: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, question.id);
        assert_eq!(parsed.correct_label().unwrap(), AnswerLabel::B);
        assert_eq!(parsed.bloom, BloomLevel::Remember);
    }
}
