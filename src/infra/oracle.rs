//! Client for the external ranking model.
//!
//! The model is asked for a JSON array of at most three
//! `{ itemId, score, reason }` objects. Anything else is rejected as
//! malformed; there is no local fallback ranking.

use std::time::Duration;

use anyhow::anyhow;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::item::{Category, ItemKind};

const MAX_ATTEMPTS: u32 = 2;
pub const MAX_RANKINGS: usize = 3;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("matching oracle is not configured")]
    NotConfigured,
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Only transient failures are worth the single retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Transport(_) => true,
            OracleError::Status { status, .. } => *status == 429 || *status >= 500,
            OracleError::NotConfigured | OracleError::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankingTarget<'a> {
    pub kind: ItemKind,
    pub title: &'a str,
    pub category: Category,
    pub description: &'a str,
    pub location: &'a str,
}

#[derive(Debug, Clone)]
pub struct RankingCandidate<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
}

/// One entry of the oracle's answer, validated against the output contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub item_id: Uuid,
    pub score: f64,
    pub reason: String,
}

#[derive(Clone)]
pub struct MatchOracle {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl MatchOracle {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.oracle_timeout_seconds))
            .build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.oracle_url.as_str().trim_end_matches('/'),
            config.oracle_model
        );
        let endpoint =
            Url::parse(&endpoint).map_err(|err| anyhow!("invalid oracle endpoint: {}", err))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.oracle_api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn rank(
        &self,
        target: &RankingTarget<'_>,
        candidates: &[RankingCandidate<'_>],
    ) -> Result<Vec<Ranking>, OracleError> {
        let api_key = self.api_key.as_deref().ok_or(OracleError::NotConfigured)?;
        let body = request_body(&build_prompt(target, candidates));

        let mut attempt = 1;
        loop {
            match self.generate(&body, api_key).await {
                Ok(text) => return parse_rankings(&text),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "oracle call failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn generate(&self, body: &Value, api_key: &str) -> Result<String, OracleError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| OracleError::Malformed(format!("invalid response body: {}", err)))?;
        extract_text(payload)
    }
}

pub fn build_prompt(target: &RankingTarget<'_>, candidates: &[RankingCandidate<'_>]) -> String {
    let counterpart = target.kind.counterpart().as_db();
    let mut prompt = format!(
        "A student reported a {kind} item on campus. Rank which {counterpart} items are most likely the same object.\n\
         \n\
         Reported {kind} item:\n\
         Title: {title}\n\
         Category: {category}\n\
         Description: {description}\n\
         Location: {location}\n\
         \n\
         {counterpart} items:\n",
        kind = target.kind.as_db(),
        counterpart = counterpart,
        title = target.title,
        category = target.category.as_str(),
        description = target.description,
        location = target.location,
    );
    for candidate in candidates {
        prompt.push_str(&format!(
            "[ID: {}] {} - {} at {}\n",
            candidate.id, candidate.title, candidate.description, candidate.location
        ));
    }
    prompt.push_str(&format!(
        "\nCompare physical attributes such as color and brand, how close the locations are, \
         and the key nouns. Return a JSON array with the top {} matches, each an object with \
         itemId, score (0-100) and a short reason.",
        MAX_RANKINGS
    ));
    prompt
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "itemId": { "type": "STRING" },
                        "score": { "type": "NUMBER" },
                        "reason": { "type": "STRING" }
                    },
                    "required": ["itemId", "score", "reason"]
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn extract_text(payload: Value) -> Result<String, OracleError> {
    let response: GenerateContentResponse = serde_json::from_value(payload)
        .map_err(|err| OracleError::Malformed(format!("unexpected response shape: {}", err)))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(OracleError::Malformed("empty response".to_string()));
    }
    Ok(text)
}

#[derive(Deserialize)]
struct RawRanking {
    #[serde(rename = "itemId")]
    item_id: String,
    score: f64,
    reason: String,
}

pub fn parse_rankings(text: &str) -> Result<Vec<Ranking>, OracleError> {
    let raw: Vec<RawRanking> = serde_json::from_str(text.trim())
        .map_err(|err| OracleError::Malformed(format!("not a ranking array: {}", err)))?;

    raw.into_iter()
        .map(|entry| {
            if !entry.score.is_finite() || !(0.0..=100.0).contains(&entry.score) {
                return Err(OracleError::Malformed(format!(
                    "score {} out of range",
                    entry.score
                )));
            }
            let item_id = Uuid::parse_str(entry.item_id.trim()).map_err(|_| {
                OracleError::Malformed(format!("invalid item id {:?}", entry.item_id))
            })?;
            Ok(Ranking {
                item_id,
                score: entry.score,
                reason: entry.reason,
            })
        })
        .collect()
}
