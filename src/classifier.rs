//! Content classifier collaborator.
//!
//! The trust engine never reads answers. A classifier decides whether an answer
//! is relevant to the campaign question, and its outages are reported as
//! such rather than read as a verdict.

use crate::config::{ClassifierConfig, MIN_ATTEMPTS};
use crate::error::{Error, Result};
use crate::trust::Verdict;
use async_trait::async_trait;
use backoff::future::retry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// The classifier could not produce a verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("classifier unavailable: {0}")]
pub struct ClassifierError(pub String);

/// Judges answers.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    /// Classify `answer` against the campaign question, if any.
    async fn classify(
        &self,
        question: Option<&str>,
        answer: &str,
    ) -> std::result::Result<Verdict, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    question: Option<&'a str>,
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    relevant: bool,
}

/// Classifier reached over HTTP.
///
/// POSTs `{question, answer}` and expects `{relevant: bool}`.
pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    /// Create a classifier client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build classifier client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ContentClassifier for HttpClassifier {
    async fn classify(
        &self,
        question: Option<&str>,
        answer: &str,
    ) -> std::result::Result<Verdict, ClassifierError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ClassifyRequest { question, answer })
            .send()
            .await
            .map_err(|e| ClassifierError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifierError(format!("HTTP {}", response.status())));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError(format!("unreadable verdict: {e}")))?;

        Ok(if body.relevant {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        })
    }
}

/// Classifier that is never reachable. Used when no endpoint is configured,
/// so submissions fail with 503 instead of being judged by a guess.
pub struct UnconfiguredClassifier;

#[async_trait]
impl ContentClassifier for UnconfiguredClassifier {
    async fn classify(
        &self,
        _question: Option<&str>,
        _answer: &str,
    ) -> std::result::Result<Verdict, ClassifierError> {
        Err(ClassifierError("no classifier endpoint configured".to_string()))
    }
}

/// Classify with bounded retries.
///
/// # Errors
///
/// `Error::Unavailable { collaborator: "classifier" }` once `max_attempts`
/// calls have failed.
pub async fn classify_with_retry(
    classifier: &Arc<dyn ContentClassifier>,
    config: &ClassifierConfig,
    question: Option<&str>,
    answer: &str,
) -> Result<Verdict> {
    let max_attempts = config.max_attempts.max(MIN_ATTEMPTS);
    let mut attempt = 0u32;

    retry(config.backoff(), || {
        attempt += 1;
        let this_attempt = attempt;
        let classifier = Arc::clone(classifier);

        async move {
            match classifier.classify(question, answer).await {
                Ok(verdict) => {
                    debug!("Classifier verdict {verdict:?} (attempt {this_attempt})");
                    Ok(verdict)
                }
                Err(e) => {
                    warn!("Classifier call failed (attempt {this_attempt}/{max_attempts}): {e}");
                    let err = Error::Unavailable {
                        collaborator: "classifier",
                        reason: e.0,
                    };
                    if this_attempt >= max_attempts {
                        Err(backoff::Error::permanent(err))
                    } else {
                        Err(backoff::Error::transient(err))
                    }
                }
            }
        }
    })
    .await
}
