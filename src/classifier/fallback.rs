//! Remote zero-shot classification used when keyword confidence is low.
//!
//! Speaks the Hugging Face inference API shape: the request carries the text
//! and the candidate labels, the response is either
//! `{"labels": [...], "scores": [...]}` or `[{"label", "score"}, ...]`.
//! Every failure is returned to the caller, which discards it and keeps the
//! keyword result.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TaskCategory;
use crate::config::ZeroShotConfig;

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Zero-shot request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Zero-shot service returned HTTP {0}")]
    Status(u16),

    #[error("Zero-shot response could not be parsed: {0}")]
    Malformed(String),
}

/// A label the remote service chose with enough confidence to adopt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroShotVerdict {
    pub category: TaskCategory,
    pub score: f64,
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Columns { labels: Vec<String>, scores: Vec<f64> },
    Rows(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

impl ZeroShotResponse {
    fn best(self) -> Option<(String, f64)> {
        let pairs: Vec<(String, f64)> = match self {
            Self::Columns { labels, scores } => labels.into_iter().zip(scores).collect(),
            Self::Rows(rows) => rows.into_iter().map(|r| (r.label, r.score)).collect(),
        };
        pairs
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Client for a configured zero-shot endpoint.
#[derive(Debug, Clone)]
pub struct ZeroShotClassifier {
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    min_score: f64,
}

impl ZeroShotClassifier {
    pub fn new(client: Client, config: &ZeroShotConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            min_score: config.min_score,
        }
    }

    /// Ask the service to pick one of `labels`. Returns `Ok(None)` when the
    /// best label is below the score threshold or is not a known category.
    pub async fn classify(
        &self,
        text: &str,
        labels: &[TaskCategory],
    ) -> Result<Option<ZeroShotVerdict>, FallbackError> {
        let body = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels.iter().map(|c| c.as_str()).collect(),
            },
        };

        let mut request = self.client.post(&self.url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FallbackError::Status(response.status().as_u16()));
        }

        let parsed: ZeroShotResponse = response
            .json()
            .await
            .map_err(|e| FallbackError::Malformed(e.to_string()))?;

        let Some((label, score)) = parsed.best() else {
            return Err(FallbackError::Malformed("no labels returned".into()));
        };

        if score < self.min_score {
            tracing::debug!(label = %label, score, min_score = self.min_score, "Zero-shot label below threshold");
            return Ok(None);
        }

        Ok(label
            .parse::<TaskCategory>()
            .ok()
            .filter(|c| labels.contains(c))
            .map(|category| ZeroShotVerdict { category, score }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    use super::*;

    fn config(url: String) -> ZeroShotConfig {
        ZeroShotConfig {
            url,
            api_key: Some("hf_test".into()),
            timeout_ms: 500,
            min_score: 0.5,
        }
    }

    #[test]
    fn test_best_from_columns() {
        let response: ZeroShotResponse = serde_json::from_value(json!({
            "labels": ["chat", "audio"],
            "scores": [0.2, 0.7]
        }))
        .unwrap();
        assert_eq!(response.best(), Some(("audio".to_string(), 0.7)));
    }

    #[test]
    fn test_best_from_rows() {
        let response: ZeroShotResponse = serde_json::from_value(json!([
            {"label": "video", "score": 0.9},
            {"label": "vision", "score": 0.05}
        ]))
        .unwrap();
        assert_eq!(response.best(), Some(("video".to_string(), 0.9)));
    }

    #[tokio::test]
    async fn test_classify_adopts_confident_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zero-shot"))
            .and(body_partial_json(json!({"inputs": "make a dubbing pipeline"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "labels": ["audio", "chat"],
                "scores": [0.82, 0.18]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let classifier =
            ZeroShotClassifier::new(Client::new(), &config(format!("{}/zero-shot", server.uri())));
        let verdict = classifier
            .classify("make a dubbing pipeline", &TaskCategory::ALL)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Some(ZeroShotVerdict {
                category: TaskCategory::Audio,
                score: 0.82
            })
        );
    }

    #[tokio::test]
    async fn test_classify_rejects_low_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"label": "audio", "score": 0.3}
            ])))
            .mount(&server)
            .await;

        let classifier = ZeroShotClassifier::new(Client::new(), &config(server.uri()));
        let verdict = classifier.classify("hmm", &TaskCategory::ALL).await.unwrap();
        assert_eq!(verdict, None);
    }

    #[tokio::test]
    async fn test_classify_reports_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let classifier = ZeroShotClassifier::new(Client::new(), &config(server.uri()));
        let err = classifier.classify("hmm", &TaskCategory::ALL).await.unwrap_err();
        assert!(matches!(err, FallbackError::Status(503)));
    }
}
