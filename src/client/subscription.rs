use futures::{future, FutureExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::api::{ClientError, GameApi};
use super::feed::ChangeStream;
use super::reconcile::{Directive, Reconciler};
use crate::config::ClientConfig;
use crate::quiz::AnswerValue;
use crate::room::types::{
    DistributionResponse, LeaderboardEntry, PlayerView, RoomView, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use crate::shared::ErrorCode;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch now, ignoring the minimum spacing
    Refresh,
    SubmitAnswer {
        question_index: usize,
        value: Option<AnswerValue>,
        elapsed_time: Option<f64>,
    },
    StartGame,
    AdvanceQuestion,
}

/// Why a subscription stopped following its room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    RoomGone,
    Removed,
    Unrecoverable,
    Unauthorized,
}

impl EndReason {
    fn from_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Forbidden | ErrorCode::NotAMember => EndReason::Removed,
            ErrorCode::RoomUnrecoverable => EndReason::Unrecoverable,
            ErrorCode::Unauthorized => EndReason::Unauthorized,
            _ => EndReason::RoomGone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Screen {
    #[default]
    Connecting,
    Lobby,
    Question {
        index: usize,
    },
    WaitingForPlayers {
        index: usize,
    },
    Results {
        index: usize,
    },
    Leaderboard {
        index: usize,
    },
    Finished,
    Ended(EndReason),
}

impl Screen {
    pub fn is_ended(&self) -> bool {
        matches!(self, Screen::Ended(_))
    }
}

/// Everything a presentation layer needs to render one player's view of a
/// room. Scores only ever come from server responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientSnapshot {
    pub screen: Screen,
    pub room: Option<RoomView>,
    pub scores: Vec<PlayerView>,
    pub selected_answer: Option<AnswerValue>,
    pub last_answer: Option<SubmitAnswerResponse>,
    pub results: Option<DistributionResponse>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub transient_error: Option<String>,
}

/// Owner side of a running subscription. Dropping it stops the task.
pub struct SubscriptionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ClientSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Cancelled)
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.send(Command::Refresh).await
    }

    pub async fn submit_answer(
        &self,
        question_index: usize,
        value: Option<AnswerValue>,
        elapsed_time: Option<f64>,
    ) -> Result<(), ClientError> {
        self.send(Command::SubmitAnswer {
            question_index,
            value,
            elapsed_time,
        })
        .await
    }

    pub async fn start_game(&self) -> Result<(), ClientError> {
        self.send(Command::StartGame).await
    }

    pub async fn advance_question(&self) -> Result<(), ClientError> {
        self.send(Command::AdvanceQuestion).await
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ClientSnapshot> {
        self.state.clone()
    }

    /// Resolves with the first snapshot matching `predicate`, or
    /// `Cancelled` if the subscription stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ClientSnapshot) -> bool,
    ) -> Result<ClientSnapshot, ClientError> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::Cancelled)?;
        Ok(snapshot.clone())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancels the task and waits for it to stop
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Room subscription task failed");
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keeps one player's snapshot of a room in step with the server.
///
/// Runs as a single task, so fetches never overlap. It refreshes on a
/// polling tick, on every item of the optional change feed and after every
/// command, and feeds each fetched view through a [`Reconciler`].
pub struct RoomSubscription {
    api: Arc<dyn GameApi>,
    pin: String,
    config: ClientConfig,
    reconciler: Reconciler,
    snapshot: ClientSnapshot,
    state: watch::Sender<ClientSnapshot>,
    cancel: CancellationToken,
    last_fetch: Option<Instant>,
    /// Results dwell timer, tagged with the question it belongs to
    dwell: Option<(usize, Pin<Box<Sleep>>)>,
    ended: bool,
}

impl RoomSubscription {
    pub fn start(
        api: Arc<dyn GameApi>,
        pin: impl Into<String>,
        config: ClientConfig,
        feed: Option<ChangeStream>,
    ) -> SubscriptionHandle {
        let pin = pin.into();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ClientSnapshot::default());
        let cancel = CancellationToken::new();

        let span = info_span!("room_subscription", pin = %pin, player_id = %api.player_id());
        let subscription = Self {
            api,
            pin,
            config,
            reconciler: Reconciler::new(),
            snapshot: ClientSnapshot::default(),
            state: state_tx,
            cancel: cancel.clone(),
            last_fetch: None,
            dwell: None,
            ended: false,
        };
        let task = tokio::spawn(subscription.run(command_rx, feed).instrument(span));

        SubscriptionHandle {
            commands: command_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut feed: Option<ChangeStream>) {
        info!("Following room");
        let cancel = self.cancel.clone();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.ended {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => {
                        let mut batch = vec![command];
                        while let Ok(more) = commands.try_recv() {
                            batch.push(more);
                        }
                        self.handle_commands(batch).await;
                    }
                    None => break,
                },
                change = next_change(&mut feed) => match change {
                    Some(()) => {
                        // Coalesce a burst of notifications into one fetch
                        if let Some(stream) = feed.as_mut() {
                            while let Some(Some(())) = stream.next().now_or_never() {}
                        }
                        self.refresh(true).await;
                    }
                    None => {
                        info!("Change feed ended, falling back to polling");
                        feed = None;
                    }
                },
                index = dwell_elapsed(&mut self.dwell) => self.show_leaderboard(index).await,
                _ = ticker.tick() => self.refresh(false).await,
            }
            self.publish();
        }

        self.dwell = None;
        self.publish();
        info!(ended = self.ended, "Stopped following room");
    }

    async fn handle_commands(&mut self, batch: Vec<Command>) {
        let mut refreshed = false;
        let mut wants_refresh = false;

        for command in batch {
            if self.ended || self.cancel.is_cancelled() {
                return;
            }
            match command {
                Command::Refresh => wants_refresh = true,
                Command::SubmitAnswer {
                    question_index,
                    value,
                    elapsed_time,
                } => {
                    self.submit(question_index, value, elapsed_time).await;
                    refreshed = true;
                }
                Command::StartGame => {
                    self.start_game_command().await;
                    refreshed = true;
                }
                Command::AdvanceQuestion => {
                    self.advance_command().await;
                    refreshed = true;
                }
            }
        }

        if wants_refresh && !refreshed && !self.ended {
            self.refresh(true).await;
        }
    }

    /// Races a request against cancellation
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            result = request => result,
        }
    }

    async fn refresh(&mut self, forced: bool) {
        if !forced
            && self
                .last_fetch
                .is_some_and(|at| at.elapsed() < self.config.min_spacing)
        {
            return;
        }

        match self.call(self.api.fetch_room(&self.pin)).await {
            Ok(view) => self.apply_fetched(view).await,
            Err(error) => self.fail(error),
        }
    }

    async fn apply_fetched(&mut self, view: RoomView) {
        self.last_fetch = Some(Instant::now());
        self.snapshot.transient_error = None;
        self.apply_view(view).await;
    }

    async fn apply_view(&mut self, view: RoomView) {
        let directives = self.reconciler.apply(&view);
        if directives.is_empty() {
            debug!("Ignoring stale room view");
            return;
        }
        self.snapshot.room = Some(view);

        for directive in directives {
            if self.ended {
                return;
            }
            match directive {
                Directive::Lobby => self.snapshot.screen = Screen::Lobby,
                Directive::NewQuestion { index } => {
                    debug!(question_index = index, "New question");
                    self.dwell = None;
                    self.snapshot.selected_answer = None;
                    self.snapshot.last_answer = None;
                    self.snapshot.results = None;
                    self.snapshot.screen = Screen::Question { index };
                }
                Directive::AwaitingOthers { index } => {
                    self.snapshot.screen = Screen::WaitingForPlayers { index };
                }
                Directive::RevealResults { index } => {
                    match self.call(self.api.distribution(&self.pin, index)).await {
                        Ok(results) => self.snapshot.results = Some(results),
                        Err(error) => self.fail(error),
                    }
                    if !self.ended {
                        self.snapshot.screen = Screen::Results { index };
                        self.dwell = Some((index, Box::pin(sleep(self.config.results_dwell))));
                    }
                }
                Directive::Finish => {
                    self.dwell = None;
                    self.load_leaderboard().await;
                    if !self.ended {
                        self.snapshot.screen = Screen::Finished;
                    }
                }
                Directive::Scores(players) => self.snapshot.scores = players,
            }
        }
    }

    async fn show_leaderboard(&mut self, index: usize) {
        self.dwell = None;
        if self.snapshot.screen != (Screen::Results { index }) {
            return;
        }
        self.load_leaderboard().await;
        if !self.ended {
            self.snapshot.screen = Screen::Leaderboard { index };
        }
    }

    async fn load_leaderboard(&mut self) {
        match self.call(self.api.leaderboard(&self.pin)).await {
            Ok(entries) => self.snapshot.leaderboard = entries,
            Err(error) => self.fail(error),
        }
    }

    async fn submit(
        &mut self,
        question_index: usize,
        value: Option<AnswerValue>,
        elapsed_time: Option<f64>,
    ) {
        self.snapshot.selected_answer = value.clone();
        self.publish();

        let request = SubmitAnswerRequest {
            question_index,
            value,
            elapsed_time,
        };
        match self.call(self.api.submit_answer(&self.pin, request)).await {
            Ok(response) => {
                self.snapshot.last_answer = Some(response);
                self.snapshot.transient_error = None;
            }
            Err(error) => match error.code() {
                Some(ErrorCode::DuplicateAnswer) => debug!("Answer was already recorded"),
                Some(ErrorCode::InvalidPhase) => {
                    debug!(question_index, "Answer was for a question that is no longer open");
                    self.snapshot.selected_answer = None;
                }
                _ => self.fail(error),
            },
        }

        if !self.ended {
            self.refresh(true).await;
        }
    }

    async fn start_game_command(&mut self) {
        match self.call(self.api.start_game(&self.pin)).await {
            Ok(view) => self.apply_fetched(view).await,
            Err(error) if error.code() == Some(ErrorCode::AlreadyStarted) => {
                debug!("Game was already started");
                self.refresh(true).await;
            }
            Err(error) => self.fail_command(error),
        }
    }

    async fn advance_command(&mut self) {
        match self.call(self.api.advance_question(&self.pin)).await {
            Ok(view) => self.apply_fetched(view).await,
            Err(error) if error.code() == Some(ErrorCode::NotAllAnswered) => {
                debug!("Not everyone has answered yet");
                self.refresh(true).await;
            }
            Err(error) => self.fail_command(error),
        }
    }

    /// A creator-only action refused for this player does not end the session
    fn fail_command(&mut self, error: ClientError) {
        if error.code() == Some(ErrorCode::Forbidden) {
            self.snapshot.transient_error = Some(error.to_string());
        } else {
            self.fail(error);
        }
    }

    fn fail(&mut self, error: ClientError) {
        match error {
            ClientError::Cancelled => {}
            error if error.is_terminal() => {
                warn!(error = %error, "Room can no longer be followed");
                let reason = error
                    .code()
                    .map(EndReason::from_code)
                    .unwrap_or(EndReason::RoomGone);
                self.ended = true;
                self.dwell = None;
                self.snapshot.transient_error = None;
                self.snapshot.screen = Screen::Ended(reason);
            }
            error => {
                debug!(error = %error, "Request failed, retrying next cycle");
                self.snapshot.transient_error = Some(error.to_string());
            }
        }
    }

    fn publish(&self) {
        self.state.send_if_modified(|current| {
            if *current == self.snapshot {
                false
            } else {
                *current = self.snapshot.clone();
                true
            }
        });
    }
}

async fn next_change(feed: &mut Option<ChangeStream>) -> Option<()> {
    match feed {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

async fn dwell_elapsed(dwell: &mut Option<(usize, Pin<Box<Sleep>>)>) -> usize {
    match dwell {
        Some((index, timer)) => {
            timer.as_mut().await;
            *index
        }
        None => future::pending().await,
    }
}
