use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use super::{
    chat::{validate_message, ChatMessage},
    models::{generate_pin, QuizSettings, RoomModel},
    repository::{InsertRoomResult, RoomRepository},
    types::{
        CreateRoomRequest, CreateRoomResponse, DistributionResponse, LeaderboardEntry, RoomView,
        SubmitAnswerRequest, SubmitAnswerResponse,
    },
};
use crate::config::{CleanupConfig, ServerConfig};
use crate::event::{EventBus, RoomEvent};
use crate::game::{AdvanceOutcome, GameError, GameRules, Phase};
use crate::quiz::{Question, QuizSource};
use crate::session::PlayerIdentity;
use crate::shared::AppError;

const MAX_PIN_ATTEMPTS: usize = 32;

/// Settings the room service needs from the server configuration
#[derive(Debug, Clone)]
pub struct RoomServiceConfig {
    pub rules: GameRules,
    pub max_questions: usize,
    pub time_per_question_secs: u32,
    pub chat_history: usize,
}

impl Default for RoomServiceConfig {
    fn default() -> Self {
        RoomServiceConfig::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RoomServiceConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            max_questions: config.max_questions,
            time_per_question_secs: config.time_per_question_secs,
            chat_history: config.chat_history,
        }
    }
}

/// Room State Store: owns every room and serializes mutations per room.
///
/// Each operation takes the room's lock, runs the engine, re-checks the room
/// invariants and publishes a change event before releasing the lock, so
/// subscribers observe events in mutation order.
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    quiz_source: Arc<dyn QuizSource>,
    event_bus: EventBus,
    config: RoomServiceConfig,
}

impl RoomService {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        quiz_source: Arc<dyn QuizSource>,
        event_bus: EventBus,
        config: RoomServiceConfig,
    ) -> Self {
        Self {
            repository,
            quiz_source,
            event_bus,
            config,
        }
    }

    /// Creates a room in the waiting phase with the creator as its first player
    #[instrument(skip(self, creator, request), fields(creator_id = %creator.id, topic = %request.topic))]
    pub async fn create_room(
        &self,
        creator: &PlayerIdentity,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, AppError> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(AppError::BadRequest("Topic cannot be empty".to_string()));
        }
        if request.count == 0 || request.count > self.config.max_questions {
            return Err(AppError::BadRequest(format!(
                "Question count must be between 1 and {}",
                self.config.max_questions
            )));
        }

        let questions = match request.questions {
            Some(questions) => questions,
            None => {
                self.quiz_source
                    .generate(&topic, request.difficulty, request.count)
                    .await?
            }
        };
        let questions = prepare_questions(questions, request.count)?;

        let mut creator = creator.clone();
        if let Some(avatar_url) = request.creator_avatar_url.filter(|url| !url.trim().is_empty()) {
            creator.avatar_url = Some(avatar_url);
        }
        let settings = QuizSettings {
            topic,
            difficulty: request.difficulty,
            question_count: request.count,
            time_per_question: self.config.time_per_question_secs,
        };

        for attempt in 1..=MAX_PIN_ATTEMPTS {
            let room = RoomModel::new(
                generate_pin(),
                &creator,
                settings.clone(),
                questions.clone(),
                self.config.chat_history,
                Utc::now(),
            );
            let pin = room.pin.clone();

            match self.repository.try_insert_room(room).await? {
                InsertRoomResult::Inserted(_) => {
                    info!(pin = %pin, question_count = settings.question_count, "Room created");
                    return Ok(CreateRoomResponse { pin });
                }
                InsertRoomResult::PinTaken => {
                    debug!(pin = %pin, attempt, "Pin collision, retrying");
                }
            }
        }

        error!("Could not allocate a free room pin");
        Err(AppError::Storage("No free room pin available".to_string()))
    }

    /// Joins a waiting room. Joining a room the player is already in returns
    /// the current view whatever the phase.
    #[instrument(skip(self, player), fields(player_id = %player.id))]
    pub async fn join_room(&self, pin: &str, player: &PlayerIdentity) -> Result<RoomView, AppError> {
        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;

        if room.has_player(&player.id) {
            debug!("Player already in room");
            return Ok(RoomView::for_player(&room, &player.id));
        }
        if room.phase != Phase::Waiting {
            return Err(GameError::AlreadyStarted.into());
        }
        if room.is_full(self.config.rules.max_players) {
            return Err(GameError::RoomFull.into());
        }

        let now = Utc::now();
        room.add_player(player, now);
        room.touch(now);
        self.verify(&mut room).await?;

        info!(player_count = room.player_count(), "Player joined room");
        self.event_bus
            .emit(RoomEvent::PlayerJoined {
                pin: room.pin.clone(),
                player_id: player.id.clone(),
                username: player.username.clone(),
            })
            .await;

        Ok(RoomView::for_player(&room, &player.id))
    }

    /// Leaves a room before the game starts. The last player out deletes the room.
    #[instrument(skip(self))]
    pub async fn leave_room(&self, pin: &str, player_id: &str) -> Result<(), AppError> {
        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;

        if !room.has_player(player_id) {
            return Err(GameError::NotAMember(player_id.to_string()).into());
        }
        if room.phase != Phase::Waiting {
            return Err(GameError::InvalidPhase(
                "Players cannot leave once the game has started".to_string(),
            )
            .into());
        }

        room.remove_player(player_id);

        if room.players.is_empty() {
            self.repository.delete_room(pin).await?;
            room.deleted = true;
            info!("Last player left, room deleted");
            self.close(pin, "empty").await;
            return Ok(());
        }

        room.touch(Utc::now());
        self.verify(&mut room).await?;

        info!(creator_id = %room.creator_id, "Player left room");
        self.event_bus
            .emit(RoomEvent::PlayerLeft {
                pin: room.pin.clone(),
                player_id: player_id.to_string(),
                creator_id: room.creator_id.clone(),
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_room_view(&self, pin: &str, requester: &str) -> Result<RoomView, AppError> {
        let room = self.lock_room(pin).await?;
        ensure_member(&room, requester)?;
        Ok(RoomView::for_player(&room, requester))
    }

    #[instrument(skip(self))]
    pub async fn start_game(&self, pin: &str, by: &str) -> Result<RoomView, AppError> {
        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;

        let now = Utc::now();
        room.start_game(by, &self.config.rules, now)?;
        room.touch(now);
        self.verify(&mut room).await?;

        info!(player_count = room.player_count(), "Game started");
        self.event_bus
            .emit(RoomEvent::GameStarted {
                pin: room.pin.clone(),
            })
            .await;

        Ok(RoomView::for_player(&room, by))
    }

    #[instrument(skip(self, request), fields(question_index = request.question_index))]
    pub async fn submit_answer(
        &self,
        pin: &str,
        by: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, AppError> {
        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;

        let now = Utc::now();
        let outcome = room.submit_answer(
            by,
            request.question_index,
            request.value.as_ref(),
            request.elapsed_time,
            &self.config.rules,
            now,
        )?;
        room.touch(now);
        self.verify(&mut room).await?;

        info!(
            is_correct = outcome.is_correct,
            points = outcome.points_awarded,
            all_answered = outcome.all_answered,
            "Answer recorded"
        );
        self.event_bus
            .emit(RoomEvent::AnswerSubmitted {
                pin: room.pin.clone(),
                question_index: outcome.question_index,
                player_id: by.to_string(),
                all_answered: outcome.all_answered,
            })
            .await;
        if outcome.completed {
            info!("Final question answered by everyone, game completed");
            self.event_bus
                .emit(RoomEvent::GameCompleted {
                    pin: room.pin.clone(),
                })
                .await;
        }

        Ok(SubmitAnswerResponse {
            score: outcome.score,
            is_correct: outcome.is_correct,
            all_answered: outcome.all_answered,
            points_awarded: outcome.points_awarded,
        })
    }

    #[instrument(skip(self))]
    pub async fn advance_question(&self, pin: &str, by: &str) -> Result<RoomView, AppError> {
        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;

        let now = Utc::now();
        let outcome = room.advance_question(by, &self.config.rules, now)?;
        room.touch(now);
        self.verify(&mut room).await?;

        let event = match outcome {
            AdvanceOutcome::NextQuestion(question_index) => {
                info!(question_index, "Advanced to next question");
                RoomEvent::QuestionAdvanced {
                    pin: room.pin.clone(),
                    question_index,
                }
            }
            AdvanceOutcome::Completed => {
                info!("Game completed");
                RoomEvent::GameCompleted {
                    pin: room.pin.clone(),
                }
            }
        };
        self.event_bus.emit(event).await;

        Ok(RoomView::for_player(&room, by))
    }

    /// Players by score descending; ties keep join order
    #[instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        pin: &str,
        requester: &str,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let room = self.lock_room(pin).await?;
        ensure_member(&room, requester)?;

        let mut players: Vec<_> = room.players.iter().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));

        Ok(players
            .into_iter()
            .enumerate()
            .map(|(i, player)| LeaderboardEntry::new(i + 1, player, room.is_creator(&player.id)))
            .collect())
    }

    /// Answer counts for a question. Only revealed for past questions, for
    /// the current one once the requester answered it, or after the game.
    #[instrument(skip(self))]
    pub async fn answer_distribution(
        &self,
        pin: &str,
        requester: &str,
        question_index: usize,
    ) -> Result<DistributionResponse, AppError> {
        let room = self.lock_room(pin).await?;
        ensure_member(&room, requester)?;

        let question = room.questions.get(question_index).ok_or_else(|| {
            AppError::BadRequest(format!("Question {} does not exist", question_index))
        })?;

        let revealed = match room.phase {
            Phase::Waiting => false,
            Phase::Completed => true,
            Phase::InProgress => {
                question_index < room.current_question_index
                    || (question_index == room.current_question_index
                        && room.ledger.has_answered(question_index, requester))
            }
        };
        if !revealed {
            return Err(GameError::InvalidPhase(format!(
                "Results for question {} are not available yet",
                question_index
            ))
            .into());
        }

        let distribution = room.ledger.distribution(question_index, question);
        Ok(DistributionResponse::new(question_index, question, distribution))
    }

    #[instrument(skip(self, sender, message), fields(player_id = %sender.id))]
    pub async fn post_chat(
        &self,
        pin: &str,
        sender: &PlayerIdentity,
        message: &str,
    ) -> Result<ChatMessage, AppError> {
        let message = validate_message(message).map_err(AppError::BadRequest)?;

        let mut room = self.lock_room(pin).await?;
        room.ensure_recoverable()?;
        ensure_member(&room, &sender.id)?;

        let now = Utc::now();
        let username = room
            .player(&sender.id)
            .map(|p| p.username.clone())
            .unwrap_or_else(|| sender.username.clone());
        let entry = room.chat.push(&sender.id, &username, message, now);
        room.touch(now);

        debug!(message_id = entry.id, "Chat message posted");
        self.event_bus
            .emit(RoomEvent::ChatPosted {
                pin: room.pin.clone(),
                message_id: entry.id,
            })
            .await;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn chat_history(
        &self,
        pin: &str,
        requester: &str,
        after: Option<u64>,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let room = self.lock_room(pin).await?;
        ensure_member(&room, requester)?;
        Ok(room.chat.after(after))
    }

    /// Subscribes a member to the room's change events. The subscription is
    /// taken under the room lock so no event after the current state is missed.
    #[instrument(skip(self))]
    pub async fn subscribe(
        &self,
        pin: &str,
        requester: &str,
    ) -> Result<broadcast::Receiver<RoomEvent>, AppError> {
        let room = self.lock_room(pin).await?;
        ensure_member(&room, requester)?;
        Ok(self.event_bus.subscribe(pin).await)
    }

    /// Deletes completed rooms past their lifetime and rooms idle for too long
    #[instrument(skip(self, cleanup))]
    pub async fn expire_rooms(
        &self,
        now: DateTime<Utc>,
        cleanup: &CleanupConfig,
    ) -> Result<usize, AppError> {
        let completed_ttl =
            chrono::Duration::from_std(cleanup.completed_room_ttl).map_err(|_| AppError::Internal)?;
        let idle_ttl =
            chrono::Duration::from_std(cleanup.idle_room_ttl).map_err(|_| AppError::Internal)?;

        let mut expired = 0;
        for handle in self.repository.list_rooms().await? {
            let mut room = handle.lock().await;
            if room.deleted || !room.is_expired(now, completed_ttl, idle_ttl) {
                continue;
            }

            let pin = room.pin.clone();
            match self.repository.delete_room(&pin).await {
                Ok(true) => {
                    room.deleted = true;
                    expired += 1;
                    info!(pin = %pin, phase = %room.phase, "Expired room deleted");
                    self.close(&pin, "expired").await;
                }
                Ok(false) => {}
                Err(e) => warn!(pin = %pin, error = %e, "Failed to delete expired room"),
            }
        }
        Ok(expired)
    }

    /// Locks a room. A room deleted while this call waited for the lock
    /// is reported as not found.
    async fn lock_room(&self, pin: &str) -> Result<OwnedMutexGuard<RoomModel>, AppError> {
        let handle = self
            .repository
            .get_room(pin)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", pin)))?;

        let room = handle.lock_owned().await;
        if room.deleted {
            debug!(pin = %pin, "Room was deleted while waiting for its lock");
            return Err(AppError::NotFound(format!("Room {} not found", pin)));
        }
        Ok(room)
    }

    /// Marks the room unrecoverable when a mutation left it inconsistent.
    /// The room is never repaired; every later operation fails.
    async fn verify(&self, room: &mut RoomModel) -> Result<(), AppError> {
        match room.check_invariants() {
            Ok(()) => Ok(()),
            Err(reason) => {
                error!(pin = %room.pin, reason = %reason, "Room invariant violated, closing room");
                room.mark_unrecoverable(reason.clone());
                self.event_bus
                    .emit(RoomEvent::RoomClosed {
                        pin: room.pin.clone(),
                        reason: "unrecoverable".to_string(),
                    })
                    .await;
                Err(GameError::Unrecoverable(reason).into())
            }
        }
    }

    async fn close(&self, pin: &str, reason: &str) {
        self.event_bus
            .emit(RoomEvent::RoomClosed {
                pin: pin.to_string(),
                reason: reason.to_string(),
            })
            .await;
        self.event_bus.remove_room(pin).await;
    }
}

fn ensure_member(room: &RoomModel, player_id: &str) -> Result<(), AppError> {
    room.ensure_recoverable()?;
    if room.has_player(player_id) {
        Ok(())
    } else {
        Err(GameError::NotAMember(player_id.to_string()).into())
    }
}

/// Truncates to `count` and validates every question that is kept
fn prepare_questions(mut questions: Vec<Question>, count: usize) -> Result<Vec<Question>, AppError> {
    if questions.len() < count {
        return Err(AppError::BadRequest(format!(
            "{} questions requested but only {} available",
            count,
            questions.len()
        )));
    }
    questions.truncate(count);

    for (i, question) in questions.iter().enumerate() {
        question
            .validate()
            .map_err(|reason| AppError::BadRequest(format!("Question {}: {}", i, reason)))?;
    }
    Ok(questions)
}
