use crate::game::Phase;
use crate::room::types::{PlayerView, RoomView};

/// What the presentation layer should do after a fetched view
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Lobby,
    NewQuestion { index: usize },
    AwaitingOthers { index: usize },
    RevealResults { index: usize },
    Finish,
    Scores(Vec<PlayerView>),
}

fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::Waiting => 0,
        Phase::InProgress => 1,
        Phase::Completed => 2,
    }
}

/// Turns a sequence of room views into directives.
///
/// Pure: no I/O and no clock, so it can be driven from tests or any loop.
/// A new question is only recognised by `(in_progress, index)` changing;
/// score or answer-flag changes never restart a question.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    position: Option<(Phase, usize)>,
    revealed: Option<usize>,
    finished: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<(Phase, usize)> {
        self.position
    }

    pub fn apply(&mut self, view: &RoomView) -> Vec<Directive> {
        let position = (view.phase, view.current_question_index);

        // Views older than one already applied are dropped whole
        if let Some((phase, index)) = self.position {
            if (phase_rank(position.0), position.1) < (phase_rank(phase), index) {
                return Vec::new();
            }
        }

        let mut directives = Vec::new();
        let moved = self.position != Some(position);
        self.position = Some(position);

        match view.phase {
            Phase::Waiting => directives.push(Directive::Lobby),
            Phase::InProgress => {
                let index = view.current_question_index;
                if moved {
                    directives.push(Directive::NewQuestion { index });
                }
                if view.has_answered {
                    if !view.all_answered {
                        directives.push(Directive::AwaitingOthers { index });
                    } else if self.revealed != Some(index) {
                        self.revealed = Some(index);
                        directives.push(Directive::RevealResults { index });
                    }
                }
            }
            Phase::Completed => {
                if !self.finished {
                    self.finished = true;
                    directives.push(Directive::Finish);
                }
            }
        }

        directives.push(Directive::Scores(view.players.clone()));
        directives
    }
}
