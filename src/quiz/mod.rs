// Public API - what other modules can use
pub use models::{AnswerValue, Difficulty, Question};
pub use source::{HttpQuizSource, QuizSource, StaticQuizSource, UnconfiguredQuizSource};

// Internal modules
mod models;
mod source;
