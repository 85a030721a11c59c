use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::chat::ChatLog;
use crate::game::{AnswerLedger, GameError, Phase};
use crate::quiz::{Difficulty, Question};
use crate::session::PlayerIdentity;

/// Quiz configuration fixed when the room is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub time_per_question: u32,
}

/// Running totals shown on the podium
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub questions_seen: u32,
    pub correct_answers: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_answer_time: f64,
    pub timed_answers: u32,
}

impl PlayerStats {
    pub fn average_answer_time(&self) -> Option<f64> {
        if self.timed_answers == 0 {
            None
        } else {
            Some(self.total_answer_time / f64::from(self.timed_answers))
        }
    }
}

/// A member of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub score: u32,
    pub has_answered: bool,
    pub current_answer: Option<usize>,
    pub joined_at: DateTime<Utc>,
    pub stats: PlayerStats,
}

impl Player {
    pub fn new(identity: &PlayerIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            avatar_url: identity.avatar_url.clone(),
            score: 0,
            has_answered: false,
            current_answer: None,
            joined_at: now,
            stats: PlayerStats::default(),
        }
    }
}

/// Authoritative record of one game room. All mutation goes through the
/// phase transition engine while the room's lock is held.
#[derive(Debug, Clone)]
pub struct RoomModel {
    pub pin: String,
    pub creator_id: String,
    pub phase: Phase,
    pub settings: QuizSettings,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    /// Join order is preserved and used to break leaderboard ties
    pub players: Vec<Player>,
    pub ledger: AnswerLedger,
    pub chat: ChatLog,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub unrecoverable: Option<String>,
    /// Set under the lock just before the room leaves the repository
    pub deleted: bool,
}

/// Generates a 6 digit room pin
pub fn generate_pin() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

impl RoomModel {
    /// Creates a room in the waiting phase with the creator as first player
    pub fn new(
        pin: String,
        creator: &PlayerIdentity,
        settings: QuizSettings,
        questions: Vec<Question>,
        chat_capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pin,
            creator_id: creator.id.clone(),
            phase: Phase::Waiting,
            settings,
            questions,
            current_question_index: 0,
            players: vec![Player::new(creator, now)],
            ledger: AnswerLedger::new(),
            chat: ChatLog::new(chat_capacity),
            created_at: now,
            started_at: None,
            completed_at: None,
            last_activity_at: now,
            unrecoverable: None,
            deleted: false,
        }
    }

    pub fn question_count(&self) -> usize {
        self.settings.question_count
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.id.as_str())
    }

    pub fn is_creator(&self, player_id: &str) -> bool {
        self.creator_id == player_id
    }

    pub fn is_full(&self, max_players: usize) -> bool {
        self.players.len() >= max_players
    }

    /// Adds a player unless already present. Returns whether the player was new.
    pub fn add_player(&mut self, identity: &PlayerIdentity, now: DateTime<Utc>) -> bool {
        if self.has_player(&identity.id) {
            return false;
        }
        self.players.push(Player::new(identity, now));
        true
    }

    /// Removes a player, handing the room to the next player in join order if
    /// the creator leaves. Returns whether the player was present.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != player_id);
        if self.players.len() == before {
            return false;
        }

        if self.creator_id == player_id {
            if let Some(next) = self.players.first() {
                self.creator_id = next.id.clone();
            }
        }
        true
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Waiting => None,
            Phase::InProgress | Phase::Completed => self.questions.get(self.current_question_index),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn ensure_recoverable(&self) -> Result<(), GameError> {
        match &self.unrecoverable {
            Some(reason) => Err(GameError::Unrecoverable(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn mark_unrecoverable(&mut self, reason: String) {
        self.unrecoverable = Some(reason);
    }

    /// Completed rooms live for `completed_ttl` after completion; any room
    /// expires once idle for `idle_ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, completed_ttl: Duration, idle_ttl: Duration) -> bool {
        if let Some(completed_at) = self.completed_at {
            if now - completed_at >= completed_ttl {
                return true;
            }
        }
        now - self.last_activity_at >= idle_ttl
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;

    pub fn identity(id: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: id.to_string(),
            username: format!("{}-name", id),
            avatar_url: Some(format!("https://avatars.example/{}.png", id)),
        }
    }

    pub fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| {
                Question::new(
                    format!("Question {}", i),
                    vec!["A0".into(), "A1".into(), "A2".into(), "A3".into()],
                    i % 4,
                )
            })
            .collect()
    }

    pub fn settings(count: usize) -> QuizSettings {
        QuizSettings {
            topic: "general".to_string(),
            difficulty: Difficulty::Medium,
            question_count: count,
            time_per_question: 30,
        }
    }

    pub fn room_with_players(pin: &str, ids: &[&str], count: usize) -> RoomModel {
        let now = Utc::now();
        let mut room = RoomModel::new(
            pin.to_string(),
            &identity(ids[0]),
            settings(count),
            questions(count),
            50,
            now,
        );
        for id in &ids[1..] {
            room.add_player(&identity(id), now);
        }
        room
    }
}
