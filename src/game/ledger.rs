use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::errors::GameError;
use crate::quiz::Question;

/// One player's answer to one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    /// Resolved option index, `None` when no answer was given
    pub submitted: Option<usize>,
    pub is_correct: bool,
    pub score_delta: u32,
    pub elapsed_time: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    /// Written by the straggler policy rather than by the player
    pub forced: bool,
}

impl AnswerRecord {
    pub fn answered(
        submitted: Option<usize>,
        is_correct: bool,
        score_delta: u32,
        elapsed_time: Option<f64>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submitted,
            is_correct,
            score_delta,
            elapsed_time,
            submitted_at,
            forced: false,
        }
    }

    pub fn no_answer(submitted_at: DateTime<Utc>) -> Self {
        Self {
            submitted: None,
            is_correct: false,
            score_delta: 0,
            elapsed_time: None,
            submitted_at,
            forced: true,
        }
    }
}

/// How many players picked one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub option: usize,
    pub answer: String,
    pub count: u32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
    /// One entry per option in option order, zero counts included
    pub counts: Vec<OptionCount>,
    pub no_answer: u32,
}

/// At-most-once record of answers keyed by `(question_index, player_id)`.
///
/// Records are never overwritten; a player's score is always the sum of their
/// recorded deltas.
#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    records: BTreeMap<(usize, String), AnswerRecord>,
}

impl AnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        question_index: usize,
        player_id: &str,
        record: AnswerRecord,
    ) -> Result<&AnswerRecord, GameError> {
        match self.records.entry((question_index, player_id.to_string())) {
            Entry::Occupied(_) => Err(GameError::DuplicateAnswer),
            Entry::Vacant(slot) => Ok(slot.insert(record)),
        }
    }

    pub fn get(&self, question_index: usize, player_id: &str) -> Option<&AnswerRecord> {
        self.records.get(&(question_index, player_id.to_string()))
    }

    pub fn has_answered(&self, question_index: usize, player_id: &str) -> bool {
        self.get(question_index, player_id).is_some()
    }

    /// True iff every listed player has a record for the question. An empty
    /// player list never counts as answered.
    pub fn all_answered<'a>(
        &self,
        question_index: usize,
        player_ids: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        let mut any = false;
        for player_id in player_ids {
            if !self.has_answered(question_index, player_id) {
                return false;
            }
            any = true;
        }
        any
    }

    pub fn records_for_question(
        &self,
        question_index: usize,
    ) -> impl Iterator<Item = (&str, &AnswerRecord)> {
        self.records
            .range((question_index, String::new())..(question_index + 1, String::new()))
            .map(|((_, player_id), record)| (player_id.as_str(), record))
    }

    pub fn distribution(&self, question_index: usize, question: &Question) -> Distribution {
        let mut counts: Vec<OptionCount> = question
            .options
            .iter()
            .enumerate()
            .map(|(option, answer)| OptionCount {
                option,
                answer: answer.clone(),
                count: 0,
                is_correct: question.is_correct(option),
            })
            .collect();
        let mut no_answer = 0;

        for (_, record) in self.records_for_question(question_index) {
            match record.submitted.and_then(|option| counts.get_mut(option)) {
                Some(entry) => entry.count += 1,
                None => no_answer += 1,
            }
        }

        Distribution { counts, no_answer }
    }

    /// Sum of all score deltas recorded for a player
    pub fn total_score(&self, player_id: &str) -> u32 {
        self.records
            .iter()
            .filter(|((_, id), _)| id == player_id)
            .fold(0u32, |total, (_, record)| total.saturating_add(record.score_delta))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
