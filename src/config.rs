use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::game::{GameRules, ScoringRule, StragglerPolicy};

const DEFAULT_JWT_SECRET: &str = "mindclash-development-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Token signing settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    pub expiration_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            expiration_days: 7,
        }
    }
}

/// Configuration for the room expiry sweep
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the sweep
    pub interval: Duration,
    /// How long a completed room is kept for the podium and leaderboard
    pub completed_room_ttl: Duration,
    /// How long any room may go without activity
    pub idle_room_ttl: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            completed_room_ttl: Duration::from_secs(10 * 60),
            idle_room_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Everything the server reads from its environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session: SessionConfig,
    pub rules: GameRules,
    pub max_questions: usize,
    pub time_per_question_secs: u32,
    pub chat_history: usize,
    pub cleanup: CleanupConfig,
    pub quiz_generator_url: Option<String>,
    pub quiz_generator_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            session: SessionConfig::default(),
            rules: GameRules::default(),
            max_questions: 50,
            time_per_question_secs: 30,
            chat_history: 100,
            cleanup: CleanupConfig::default(),
            quiz_generator_url: None,
            quiz_generator_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration from an explicit key/value map
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = EnvReader { lookup: &lookup };

        let time_per_question_secs: u32 =
            env.parse("TIME_PER_QUESTION_SECS", defaults.time_per_question_secs)?;
        if time_per_question_secs == 0 {
            return Err(invalid("TIME_PER_QUESTION_SECS", "0", "must be positive"));
        }

        let scoring_name: String = env.parse("SCORING_RULE", "flat".to_string())?;
        let scoring = match scoring_name.to_ascii_lowercase().as_str() {
            "flat" => ScoringRule::Flat {
                points: env.parse("FLAT_POINTS", 100)?,
            },
            "time_weighted" => ScoringRule::TimeWeighted {
                max_points: env.parse("MAX_POINTS", 1000)?,
                time_limit_secs: f64::from(time_per_question_secs),
            },
            _ => {
                return Err(invalid(
                    "SCORING_RULE",
                    &scoring_name,
                    "expected flat or time_weighted",
                ))
            }
        };

        let rules = GameRules {
            min_players: env.parse("MIN_PLAYERS", defaults.rules.min_players)?,
            max_players: env.parse("MAX_PLAYERS", defaults.rules.max_players)?,
            scoring,
            straggler_policy: env.parse::<StragglerPolicy>(
                "STRAGGLER_POLICY",
                defaults.rules.straggler_policy,
            )?,
        };
        if rules.min_players == 0 {
            return Err(invalid("MIN_PLAYERS", "0", "must be at least 1"));
        }
        if rules.max_players < rules.min_players {
            return Err(invalid(
                "MAX_PLAYERS",
                &rules.max_players.to_string(),
                "must not be below MIN_PLAYERS",
            ));
        }

        let config = Self {
            bind_addr: env.parse("BIND_ADDR", defaults.bind_addr)?,
            session: SessionConfig {
                jwt_secret: env.parse("JWT_SECRET", defaults.session.jwt_secret)?,
                expiration_days: env
                    .parse("SESSION_EXPIRATION_DAYS", defaults.session.expiration_days)?,
            },
            rules,
            max_questions: env.parse("MAX_QUESTIONS", defaults.max_questions)?,
            time_per_question_secs,
            chat_history: env.parse("CHAT_HISTORY", defaults.chat_history)?,
            cleanup: CleanupConfig {
                interval: env.secs("CLEANUP_INTERVAL_SECS", defaults.cleanup.interval)?,
                completed_room_ttl: env
                    .secs("COMPLETED_ROOM_TTL_SECS", defaults.cleanup.completed_room_ttl)?,
                idle_room_ttl: env.secs("IDLE_ROOM_TTL_SECS", defaults.cleanup.idle_room_ttl)?,
            },
            quiz_generator_url: lookup("QUIZ_GENERATOR_URL").filter(|url| !url.trim().is_empty()),
            quiz_generator_timeout: env
                .secs("QUIZ_GENERATOR_TIMEOUT_SECS", defaults.quiz_generator_timeout)?,
        };

        if config.session.jwt_secret == DEFAULT_JWT_SECRET {
            info!("JWT_SECRET not set, using the development secret");
        }
        Ok(config)
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match (self.lookup)(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse(key, default.as_secs())?;
        if secs == 0 {
            return Err(invalid(key, "0", "must be positive"));
        }
        Ok(Duration::from_secs(secs))
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Tuning for the client reconciliation loop
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Period of the background refresh
    pub poll_interval: Duration,
    /// Scheduled refreshes are skipped when the last successful fetch is younger than this
    pub min_spacing: Duration,
    /// How long the results of a question stay on screen before the leaderboard
    pub results_dwell: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            min_spacing: Duration::from_secs(1),
            results_dwell: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}
