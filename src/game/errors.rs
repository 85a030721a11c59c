use thiserror::Error;

/// Rule violations raised by the phase transition engine and the answer ledger.
///
/// Every variant except `Unrecoverable` is a client error: the caller can
/// recover by re-fetching the room and retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Player {0} is not a member of this room")]
    NotAMember(String),

    #[error("Not enough players: {actual} joined, {required} required")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("Not all players have answered the current question")]
    NotAllAnswered,

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Answer already submitted for this question")]
    DuplicateAnswer,

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Room is unrecoverable: {0}")]
    Unrecoverable(String),
}
