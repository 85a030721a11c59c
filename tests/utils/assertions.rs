//! Test assertion helpers - fluent API for verifying responses
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Status and decoded body of one API call
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub json: Value,
}

impl ApiResponse {
    pub fn expect_status(self, expected: u16) -> Self {
        assert_eq!(
            self.status, expected,
            "unexpected status, body: {}",
            self.json
        );
        self
    }

    /// Asserts an error response with the given status and machine code
    pub fn expect_error(self, status: u16, code: &str) -> Self {
        let response = self.expect_status(status);
        assert_eq!(response.json["code"], code, "body: {}", response.json);
        assert!(response.json["error"].is_string());
        response
    }

    pub fn score_of(&self, player_id: &str) -> u64 {
        self.json["players"]
            .as_array()
            .expect("room view has players")
            .iter()
            .find(|p| p["id"] == player_id)
            .and_then(|p| p["score"].as_u64())
            .expect("player present in room view")
    }

    pub fn phase(&self) -> &str {
        self.json["phase"].as_str().unwrap_or_default()
    }
}
