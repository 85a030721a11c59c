use serde::{Deserialize, Serialize};

/// Change notifications for a room.
///
/// Events never carry scores or answers. They only tell subscribers that the
/// room changed so they re-fetch the authoritative view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    PlayerJoined {
        pin: String,
        player_id: String,
        username: String,
    },
    PlayerLeft {
        pin: String,
        player_id: String,
        creator_id: String,
    },
    GameStarted {
        pin: String,
    },
    /// Someone answered the current question
    AnswerSubmitted {
        pin: String,
        question_index: usize,
        player_id: String,
        all_answered: bool,
    },
    QuestionAdvanced {
        pin: String,
        question_index: usize,
    },
    GameCompleted {
        pin: String,
    },
    ChatPosted {
        pin: String,
        message_id: u64,
    },
    /// The room is gone: expired, emptied or unrecoverable
    RoomClosed {
        pin: String,
        reason: String,
    },
}

impl RoomEvent {
    pub fn pin(&self) -> &str {
        match self {
            RoomEvent::PlayerJoined { pin, .. }
            | RoomEvent::PlayerLeft { pin, .. }
            | RoomEvent::GameStarted { pin }
            | RoomEvent::AnswerSubmitted { pin, .. }
            | RoomEvent::QuestionAdvanced { pin, .. }
            | RoomEvent::GameCompleted { pin }
            | RoomEvent::ChatPosted { pin, .. }
            | RoomEvent::RoomClosed { pin, .. } => pin,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::PlayerJoined { .. } => "player_joined",
            RoomEvent::PlayerLeft { .. } => "player_left",
            RoomEvent::GameStarted { .. } => "game_started",
            RoomEvent::AnswerSubmitted { .. } => "answer_submitted",
            RoomEvent::QuestionAdvanced { .. } => "question_advanced",
            RoomEvent::GameCompleted { .. } => "game_completed",
            RoomEvent::ChatPosted { .. } => "chat_posted",
            RoomEvent::RoomClosed { .. } => "room_closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoomEvent::RoomClosed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = RoomEvent::QuestionAdvanced {
            pin: "123456".to_string(),
            question_index: 2,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "question_advanced", "pin": "123456", "question_index": 2})
        );
        assert_eq!(value["type"], event.event_type());
    }

    #[test]
    fn test_event_parses_back() {
        let event: RoomEvent =
            serde_json::from_str(r#"{"type":"room_closed","pin":"654321","reason":"expired"}"#)
                .unwrap();
        assert_eq!(event.pin(), "654321");
        assert!(event.is_terminal());
    }
}
