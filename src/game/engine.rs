// Phase transition engine for quiz rooms.
//
// waiting --start_game--> in_progress --(submit_answer / advance_question)*--> completed
//
// The question index doubles as a fencing token: an answer is only accepted
// for the question the room is currently on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::debug;

use super::{
    errors::GameError,
    ledger::AnswerRecord,
    scoring::ScoringRule,
};
use crate::quiz::AnswerValue;
use crate::room::models::{PlayerStats, RoomModel};

/// Top level state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Waiting,
    InProgress,
    Completed,
}

/// What happens to players who have not answered when the creator advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StragglerPolicy {
    /// Advancing is refused until everyone answered
    #[default]
    WaitForAll,
    /// Advancing records a forced "no answer" (+0) for each straggler
    ScoreAsNoAnswer,
}

/// Rules the engine enforces, fixed per server
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub scoring: ScoringRule,
    pub straggler_policy: StragglerPolicy,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 10,
            scoring: ScoringRule::default(),
            straggler_policy: StragglerPolicy::default(),
        }
    }
}

/// Result of an accepted answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub score: u32,
    pub is_correct: bool,
    pub points_awarded: u32,
    pub all_answered: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NextQuestion(usize),
    Completed,
}

impl RoomModel {
    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.question_count()
    }

    /// Every current member has a ledger entry for the active question.
    /// Always false before the game starts and always true once completed.
    pub fn all_answered(&self) -> bool {
        match self.phase {
            Phase::Waiting => false,
            Phase::Completed => true,
            Phase::InProgress => self
                .ledger
                .all_answered(self.current_question_index, self.player_ids()),
        }
    }

    pub fn start_game(
        &mut self,
        by: &str,
        rules: &GameRules,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        if self.phase != Phase::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        if !self.is_creator(by) {
            return Err(GameError::Forbidden(
                "Only the room creator can start the game".to_string(),
            ));
        }
        if self.player_count() < rules.min_players {
            return Err(GameError::NotEnoughPlayers {
                required: rules.min_players,
                actual: self.player_count(),
            });
        }

        self.phase = Phase::InProgress;
        self.current_question_index = 0;
        self.started_at = Some(now);
        self.reset_answer_flags();

        debug!(pin = %self.pin, players = self.player_count(), "Game started");
        Ok(())
    }

    /// Records `by`'s answer to `question_index`. `value` of `None` means the
    /// player ran out of time.
    pub fn submit_answer(
        &mut self,
        by: &str,
        question_index: usize,
        value: Option<&AnswerValue>,
        elapsed_time: Option<f64>,
        rules: &GameRules,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, GameError> {
        match self.phase {
            Phase::Waiting => {
                return Err(GameError::InvalidPhase(
                    "The game has not started yet".to_string(),
                ))
            }
            Phase::Completed => {
                return Err(GameError::InvalidPhase(
                    "The game is already completed".to_string(),
                ))
            }
            Phase::InProgress => {}
        }
        if !self.has_player(by) {
            return Err(GameError::NotAMember(by.to_string()));
        }
        if question_index != self.current_question_index {
            return Err(GameError::InvalidPhase(format!(
                "Answer is for question {} but the room is on question {}",
                question_index, self.current_question_index
            )));
        }
        if self.ledger.has_answered(question_index, by) {
            return Err(GameError::DuplicateAnswer);
        }

        let question = self.questions.get(question_index).ok_or_else(|| {
            GameError::Unrecoverable(format!("question {} is missing", question_index))
        })?;
        let resolved = value.map(|v| question.resolve(v)).transpose()?;
        let is_correct = resolved.is_some_and(|option| question.is_correct(option));
        let points = rules.scoring.points(is_correct, elapsed_time);

        self.ledger.record(
            question_index,
            by,
            AnswerRecord::answered(resolved, is_correct, points, elapsed_time, now),
        )?;

        let player = self
            .player_mut(by)
            .ok_or_else(|| GameError::NotAMember(by.to_string()))?;
        player.score = player.score.saturating_add(points);
        player.has_answered = true;
        player.current_answer = resolved;
        update_stats(&mut player.stats, is_correct, elapsed_time);
        let score = player.score;

        let all_answered = self.all_answered();
        let completed = all_answered && self.is_last_question();
        if completed {
            self.complete(now);
        }

        Ok(AnswerOutcome {
            question_index,
            score,
            is_correct,
            points_awarded: points,
            all_answered,
            completed,
        })
    }

    pub fn advance_question(
        &mut self,
        by: &str,
        rules: &GameRules,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, GameError> {
        match self.phase {
            Phase::Waiting => {
                return Err(GameError::InvalidPhase(
                    "The game has not started yet".to_string(),
                ))
            }
            Phase::Completed => {
                return Err(GameError::InvalidPhase(
                    "The game is already completed".to_string(),
                ))
            }
            Phase::InProgress => {}
        }
        if !self.is_creator(by) {
            return Err(GameError::Forbidden(
                "Only the room creator can advance questions".to_string(),
            ));
        }

        if !self.all_answered() {
            match rules.straggler_policy {
                StragglerPolicy::WaitForAll => return Err(GameError::NotAllAnswered),
                StragglerPolicy::ScoreAsNoAnswer => self.record_stragglers(now)?,
            }
        }

        if self.is_last_question() {
            self.complete(now);
            return Ok(AdvanceOutcome::Completed);
        }

        self.current_question_index += 1;
        self.reset_answer_flags();
        debug!(pin = %self.pin, question_index = self.current_question_index, "Advanced to next question");
        Ok(AdvanceOutcome::NextQuestion(self.current_question_index))
    }

    /// Verifies the structural invariants of the room. A failure means the
    /// stored state can no longer be trusted.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.questions.len() != self.question_count() {
            return Err(format!(
                "room holds {} questions but is configured for {}",
                self.questions.len(),
                self.question_count()
            ));
        }
        if self.phase != Phase::Waiting && self.current_question_index >= self.question_count() {
            return Err(format!(
                "question index {} is past question count {}",
                self.current_question_index,
                self.question_count()
            ));
        }
        if !self.players.is_empty() && !self.has_player(&self.creator_id) {
            return Err(format!("creator {} is not a member", self.creator_id));
        }

        for (i, player) in self.players.iter().enumerate() {
            if self.players[..i].iter().any(|p| p.id == player.id) {
                return Err(format!("player {} is listed twice", player.id));
            }
            let recorded = self.ledger.total_score(&player.id);
            if player.score != recorded {
                return Err(format!(
                    "player {} has score {} but the ledger records {}",
                    player.id, player.score, recorded
                ));
            }
            if self.phase == Phase::InProgress
                && player.has_answered
                    != self.ledger.has_answered(self.current_question_index, &player.id)
            {
                return Err(format!(
                    "player {} answered flag disagrees with the ledger",
                    player.id
                ));
            }
        }

        if self.phase == Phase::Completed
            && !(self.is_last_question() && self.ledger.all_answered(self.current_question_index, self.player_ids()))
        {
            return Err("room completed before the last question was fully answered".to_string());
        }
        Ok(())
    }

    fn record_stragglers(&mut self, now: DateTime<Utc>) -> Result<(), GameError> {
        let index = self.current_question_index;
        let stragglers: Vec<String> = self
            .player_ids()
            .filter(|id| !self.ledger.has_answered(index, id))
            .map(str::to_string)
            .collect();

        for id in stragglers {
            self.ledger.record(index, &id, AnswerRecord::no_answer(now))?;
            if let Some(player) = self.player_mut(&id) {
                player.has_answered = true;
                player.current_answer = None;
                update_stats(&mut player.stats, false, None);
            }
            debug!(pin = %self.pin, player_id = %id, question_index = index, "Recorded no answer for straggler");
        }
        Ok(())
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        self.phase = Phase::Completed;
        self.completed_at = Some(now);
        debug!(pin = %self.pin, "Game completed");
    }

    fn reset_answer_flags(&mut self) {
        for player in &mut self.players {
            player.has_answered = false;
            player.current_answer = None;
        }
    }
}

fn update_stats(stats: &mut PlayerStats, is_correct: bool, elapsed: Option<f64>) {
    stats.questions_seen += 1;
    if is_correct {
        stats.correct_answers += 1;
        stats.current_streak += 1;
        stats.best_streak = stats.best_streak.max(stats.current_streak);
    } else {
        stats.current_streak = 0;
    }
    if let Some(elapsed) = elapsed.filter(|t| t.is_finite() && *t >= 0.0) {
        stats.total_answer_time += elapsed;
        stats.timed_answers += 1;
    }
}
