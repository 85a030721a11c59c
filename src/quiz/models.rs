use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::game::GameError;

/// Quiz difficulty chosen at room creation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// A multiple choice question with its answer key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

/// A submitted answer as it arrives on the wire.
///
/// Browsers send either the option index or the option text; generated
/// quizzes sometimes use letters (`"B"`) or numeric strings (`"1"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(usize),
    Text(String),
}

impl From<usize> for AnswerValue {
    fn from(index: usize) -> Self {
        AnswerValue::Index(index)
    }
}

impl From<&str> for AnswerValue {
    fn from(text: &str) -> Self {
        AnswerValue::Text(text.to_string())
    }
}

impl Question {
    pub fn new(text: impl Into<String>, options: Vec<String>, correct_option: usize) -> Self {
        Self {
            text: text.into(),
            options,
            correct_option,
        }
    }

    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct_option)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }

    /// Checks the question is answerable: non-empty text, at least two options
    /// and an answer key pointing at one of them.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text cannot be empty".to_string());
        }
        if self.options.len() < 2 {
            return Err(format!(
                "question '{}' needs at least two options",
                self.text
            ));
        }
        if self.correct_option >= self.options.len() {
            return Err(format!(
                "question '{}' has correct option {} but only {} options",
                self.text,
                self.correct_option,
                self.options.len()
            ));
        }
        Ok(())
    }

    /// Maps a submitted value onto an option index.
    ///
    /// Exact option text wins over the letter and numeric readings so that an
    /// option literally named "A" stays addressable.
    pub fn resolve(&self, value: &AnswerValue) -> Result<usize, GameError> {
        let index = match value {
            AnswerValue::Index(index) => Some(*index),
            AnswerValue::Text(text) => {
                let trimmed = text.trim();
                self.options
                    .iter()
                    .position(|option| option.trim() == trimmed)
                    .or_else(|| trimmed.parse::<usize>().ok())
                    .or_else(|| letter_index(trimmed))
            }
        };

        match index {
            Some(index) if index < self.options.len() => Ok(index),
            _ => Err(GameError::InvalidAnswer(format!(
                "{:?} does not match any of the {} options",
                value,
                self.options.len()
            ))),
        }
    }
}

fn letter_index(text: &str) -> Option<usize> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some((c.to_ascii_uppercase() as u8 - b'A') as usize)
        }
        _ => None,
    }
}
