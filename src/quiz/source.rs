use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::models::{AnswerValue, Difficulty, Question};
use crate::shared::AppError;

/// Boundary to whatever turns a topic into questions.
///
/// Question authoring lives outside this server; implementations only have to
/// hand back at least `count` questions.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, AppError>;
}

/// Serves questions from a fixed bank, cycling when more are requested than
/// the bank holds
pub struct StaticQuizSource {
    questions: Vec<Question>,
}

impl StaticQuizSource {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }
}

#[async_trait]
impl QuizSource for StaticQuizSource {
    async fn generate(
        &self,
        topic: &str,
        _difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, AppError> {
        if self.questions.is_empty() {
            return Err(AppError::QuizSource(format!(
                "no questions available for topic '{}'",
                topic
            )));
        }

        Ok(self.questions.iter().cycle().take(count).cloned().collect())
    }
}

/// Used when no generator is configured: rooms must then be created with
/// an explicit question list
pub struct UnconfiguredQuizSource;

#[async_trait]
impl QuizSource for UnconfiguredQuizSource {
    async fn generate(
        &self,
        _topic: &str,
        _difficulty: Difficulty,
        _count: usize,
    ) -> Result<Vec<Question>, AppError> {
        Err(AppError::BadRequest(
            "No quiz generator is configured; supply questions when creating the room".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    topic: &'a str,
    difficulty: Difficulty,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    questions: Vec<GeneratedQuestion>,
}

/// Question shape produced by the generator, whose answer key may be a
/// letter, an index or the option text
#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(alias = "question")]
    text: String,
    options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    correct_answer: AnswerValue,
}

impl GeneratedQuestion {
    fn into_question(self) -> Result<Question, AppError> {
        let mut question = Question::new(self.text, self.options, 0);
        question.correct_option = question
            .resolve(&self.correct_answer)
            .map_err(|e| AppError::QuizSource(format!("generated answer key unusable: {}", e)))?;
        Ok(question)
    }
}

/// Calls an external HTTP generator: `POST {url}` with
/// `{topic, difficulty, count}`, expecting `{questions: [...]}` back
pub struct HttpQuizSource {
    client: reqwest::Client,
    url: String,
}

impl HttpQuizSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::QuizSource(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QuizSource for HttpQuizSource {
    #[instrument(skip(self))]
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Question>, AppError> {
        debug!(url = %self.url, "Requesting questions from quiz generator");

        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                topic,
                difficulty,
                count,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Quiz generator unreachable");
                AppError::QuizSource(e.to_string())
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Quiz generator returned an error");
            return Err(AppError::QuizSource(format!(
                "generator responded with {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::QuizSource(format!("malformed generator response: {}", e)))?;

        let questions = body
            .questions
            .into_iter()
            .map(GeneratedQuestion::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        info!(received = questions.len(), "Quiz generator returned questions");
        Ok(questions)
    }
}
