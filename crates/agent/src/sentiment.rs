use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zenbot_core::config::SentimentConfig;

/// Label + confidence pair as returned by the binary frustration
/// classifier collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: String,
    pub score: f64,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentScore>;
}

/// HTTP classifier collaborator: POSTs the raw text, expects a
/// `{label, score}` body.
pub struct HttpSentimentClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSentimentClassifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentScore> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<SentimentScore>().await?)
    }
}

/// Escalation gate in front of the pipeline. Frustration means the
/// classifier reports NEGATIVE at or above the configured threshold.
///
/// The gate is advisory: empty text and classifier failures both read
/// as not frustrated, so losing the classifier never takes down the
/// pipeline.
pub struct SentimentGate {
    classifier: Option<Arc<dyn SentimentClassifier>>,
    threshold: f64,
}

impl SentimentGate {
    pub fn new(classifier: Arc<dyn SentimentClassifier>, threshold: f64) -> Self {
        Self { classifier: Some(classifier), threshold }
    }

    /// Gate with no classifier wired; classifies everything as calm.
    pub fn disabled() -> Self {
        Self { classifier: None, threshold: f64::INFINITY }
    }

    pub fn from_config(config: &SentimentConfig) -> Self {
        match &config.base_url {
            Some(base_url) => Self::new(
                Arc::new(HttpSentimentClassifier::new(base_url.clone())),
                config.threshold,
            ),
            None => Self::disabled(),
        }
    }

    pub async fn is_frustrated(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let Some(classifier) = &self.classifier else {
            return false;
        };

        match classifier.classify(text).await {
            Ok(score) => {
                score.label.eq_ignore_ascii_case("negative") && score.score >= self.threshold
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "sentiment.classifier_failed",
                    error = %error,
                    "sentiment classifier unavailable; treating text as calm"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{SentimentClassifier, SentimentGate, SentimentScore};

    struct FixedClassifier {
        label: &'static str,
        score: f64,
    }

    #[async_trait]
    impl SentimentClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<SentimentScore> {
            Ok(SentimentScore { label: self.label.to_owned(), score: self.score })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl SentimentClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<SentimentScore> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn negative_above_threshold_is_frustrated() {
        let gate = SentimentGate::new(Arc::new(FixedClassifier { label: "NEGATIVE", score: 0.97 }), 0.5);
        assert!(gate.is_frustrated("I am furious, where is my stuff").await);
    }

    #[tokio::test]
    async fn negative_below_threshold_is_calm() {
        let gate = SentimentGate::new(Arc::new(FixedClassifier { label: "NEGATIVE", score: 0.6 }), 10.0);
        assert!(!gate.is_frustrated("cancel my order").await);
    }

    #[tokio::test]
    async fn positive_label_is_calm_regardless_of_score() {
        let gate = SentimentGate::new(Arc::new(FixedClassifier { label: "POSITIVE", score: 0.99 }), 0.5);
        assert!(!gate.is_frustrated("thanks, where is my order?").await);
    }

    #[tokio::test]
    async fn empty_text_skips_the_classifier() {
        let gate = SentimentGate::new(Arc::new(FailingClassifier), 0.5);
        assert!(!gate.is_frustrated("   ").await);
    }

    #[tokio::test]
    async fn classifier_failure_degrades_to_calm() {
        let gate = SentimentGate::new(Arc::new(FailingClassifier), 0.5);
        assert!(!gate.is_frustrated("track my order").await);
    }

    #[tokio::test]
    async fn disabled_gate_never_escalates() {
        let gate = SentimentGate::disabled();
        assert!(!gate.is_frustrated("I hate everything about this").await);
    }
}
