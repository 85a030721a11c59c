#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use serde_json::json;

use mindclash::{
    build_router,
    quiz::{Question, StaticQuizSource},
    room::repository::InMemoryRoomRepository,
    session::InMemorySessionRepository,
    AppState, ServerConfig,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Questions whose correct option cycles through 0..4
pub fn quiz_questions(count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| {
            Question::new(
                format!("Question {}", i),
                vec![
                    "Red".to_string(),
                    "Green".to_string(),
                    "Blue".to_string(),
                    "Yellow".to_string(),
                ],
                i % 4,
            )
        })
        .collect()
}

pub struct TestPlayer {
    pub token: String,
    pub player_id: String,
}

pub struct TestSetup {
    pub state: AppState,
    pub router: Router,
    pub players: HashMap<String, TestPlayer>,
    pub pin: String,
}

pub struct TestSetupBuilder {
    players: Vec<String>,
    question_count: usize,
    config: ServerConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            players: vec![],
            question_count: 2,
            config: ServerConfig::default(),
        }
    }

    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_two_players(self) -> Self {
        self.with_players(vec!["alice", "bob"])
    }

    pub fn with_three_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "carol"])
    }

    pub fn with_questions(mut self, count: usize) -> Self {
        self.question_count = count;
        self
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens a session for every player, lets the first one create a room
    /// and the rest join it
    pub async fn build(self) -> TestSetup {
        let state = AppState::new(
            &self.config,
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(InMemoryRoomRepository::new()),
            Arc::new(StaticQuizSource::new(quiz_questions(self.question_count))),
        );
        let router = build_router(state.clone());

        let mut setup = TestSetup {
            state,
            router,
            players: HashMap::new(),
            pin: String::new(),
        };

        for name in &self.players {
            let session = setup
                .call("POST", "/session", None, Some(json!({ "username": name })))
                .await
                .expect_status(201);
            let player = TestPlayer {
                token: session.json["token"].as_str().unwrap().to_string(),
                player_id: session.json["player_id"].as_str().unwrap().to_string(),
            };
            setup.players.insert(name.clone(), player);
        }

        if let Some(host) = self.players.first() {
            let created = setup
                .call(
                    "POST",
                    "/rooms",
                    Some(host),
                    Some(json!({ "topic": "colours", "count": self.question_count })),
                )
                .await
                .expect_status(201);
            setup.pin = created.json["pin"].as_str().unwrap().to_string();

            for name in self.players.iter().skip(1) {
                setup.join(name).await.expect_status(200);
            }
        }

        setup
    }
}

impl TestSetup {
    pub fn player_id(&self, name: &str) -> &str {
        &self.players[name].player_id
    }

    pub fn token(&self, name: &str) -> &str {
        &self.players[name].token
    }
}
