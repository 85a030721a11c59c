use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;
use super::models::{Player, RoomModel};
use crate::game::{Distribution, Phase};
use crate::quiz::{AnswerValue, Difficulty, Question};

fn default_count() -> usize {
    10
}

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_count", alias = "question_count")]
    pub count: usize,
    pub creator_avatar_url: Option<String>,
    /// Pre-authored questions; when absent the quiz source generates them
    #[serde(default, alias = "quiz_data")]
    pub questions: Option<Vec<Question>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub pin: String,
}

/// Question as shown to one player. The answer key is only present once that
/// player has answered or the game is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub index: usize,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub correct_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub score: u32,
    pub has_answered: bool,
    pub is_creator: bool,
}

/// Read-only snapshot of a room for one requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub pin: String,
    pub phase: Phase,
    pub topic: String,
    pub difficulty: Difficulty,
    pub creator_id: String,
    pub current_question_index: usize,
    pub question_count: usize,
    pub time_per_question: u32,
    pub current_question: Option<QuestionView>,
    pub players: Vec<PlayerView>,
    pub all_answered: bool,
    pub finished: bool,
    /// Whether the requester answered the current question
    pub has_answered: bool,
    pub is_creator: bool,
}

impl RoomView {
    pub fn for_player(room: &RoomModel, requester: &str) -> Self {
        let has_answered = room.phase == Phase::InProgress
            && room.ledger.has_answered(room.current_question_index, requester);
        let reveal = has_answered || room.phase == Phase::Completed;

        let current_question = room.current_question().map(|question| QuestionView {
            index: room.current_question_index,
            text: question.text.clone(),
            options: question.options.clone(),
            correct_answer: reveal.then(|| question.correct_answer().to_string()),
            correct_index: reveal.then_some(question.correct_option),
        });

        Self {
            pin: room.pin.clone(),
            phase: room.phase,
            topic: room.settings.topic.clone(),
            difficulty: room.settings.difficulty,
            creator_id: room.creator_id.clone(),
            current_question_index: room.current_question_index,
            question_count: room.question_count(),
            time_per_question: room.settings.time_per_question,
            current_question,
            players: room
                .players
                .iter()
                .map(|player| PlayerView {
                    id: player.id.clone(),
                    username: player.username.clone(),
                    avatar_url: player.avatar_url.clone(),
                    score: player.score,
                    has_answered: player.has_answered,
                    is_creator: room.is_creator(&player.id),
                })
                .collect(),
            all_answered: room.all_answered(),
            finished: room.phase == Phase::Completed,
            has_answered,
            is_creator: room.is_creator(requester),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitAnswerRequest {
    pub question_index: usize,
    /// `null` when the timer ran out
    #[serde(default)]
    pub value: Option<AnswerValue>,
    pub elapsed_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub score: u32,
    pub is_correct: bool,
    pub all_answered: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub score: u32,
    pub is_creator: bool,
    pub correct_answers: u32,
    pub best_streak: u32,
    pub average_answer_time: Option<f64>,
}

impl LeaderboardEntry {
    pub fn new(rank: usize, player: &Player, is_creator: bool) -> Self {
        Self {
            rank,
            id: player.id.clone(),
            username: player.username.clone(),
            avatar_url: player.avatar_url.clone(),
            score: player.score,
            is_creator,
            correct_answers: player.stats.correct_answers,
            best_streak: player.stats.best_streak,
            average_answer_time: player.stats.average_answer_time(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    pub question_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub answer: String,
    pub count: u32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResponse {
    pub question_index: usize,
    pub correct_answer: String,
    pub correct_index: usize,
    pub distribution: Vec<DistributionEntry>,
    pub no_answer: u32,
}

impl DistributionResponse {
    pub fn new(question_index: usize, question: &Question, distribution: Distribution) -> Self {
        Self {
            question_index,
            correct_answer: question.correct_answer().to_string(),
            correct_index: question.correct_option,
            distribution: distribution
                .counts
                .into_iter()
                .map(|entry| DistributionEntry {
                    answer: entry.answer,
                    count: entry.count,
                    is_correct: entry.is_correct,
                })
                .collect(),
            no_answer: distribution.no_answer,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub after: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}
