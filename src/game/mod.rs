// Public API
pub use engine::{AdvanceOutcome, AnswerOutcome, GameRules, Phase, StragglerPolicy};
pub use errors::GameError;
pub use ledger::{AnswerLedger, AnswerRecord, Distribution, OptionCount};
pub use scoring::ScoringRule;

// Internal modules
mod engine;
mod errors;
mod ledger;
mod scoring;
