//! HTTP client for the Ollama-compatible analyst service.
//!
//! One finding per request: the chat body carries a fixed system prompt
//! plus the finding and project snapshot, and the response content must
//! contain a single JSON assessment object.

use crate::analyst::{Analyst, AnalystError, Assessment};
use crate::models::{Finding, ProjectSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP analyst.
#[derive(Debug, Clone)]
pub struct AnalystConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:latest".to_string(),
            temperature: 0.2,
            timeout_seconds: 120,
        }
    }
}

impl From<&crate::config::AnalystConfig> for AnalystConfig {
    fn from(config: &crate::config::AnalystConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Message in the chat request.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat API request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Chat API response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[allow(dead_code)] // Response field, used for future stream handling
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[allow(dead_code)] // Response field
    role: String,
    content: String,
}

/// Analyst backed by an Ollama-compatible `/api/chat` endpoint.
pub struct HttpAnalyst {
    config: AnalystConfig,
    http_client: reqwest::Client,
}

impl HttpAnalyst {
    /// Creates a client with the configured per-request timeout.
    pub fn new(config: AnalystConfig) -> Result<Self, AnalystError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl Analyst for HttpAnalyst {
    async fn assess(
        &self,
        finding: &Finding,
        snapshot: &ProjectSnapshot,
    ) -> Result<Assessment, AnalystError> {
        let url = format!("{}/api/chat", self.config.base_url);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: ANALYST_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(finding, snapshot),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending assessment request for {}", finding.finding_id);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalystError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    AnalystError::Connect(self.config.base_url.clone())
                } else {
                    AnalystError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalystError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        parse_assessment(&chat_response.message.content)
    }
}

/// Builds the user prompt for one finding.
fn build_prompt(finding: &Finding, snapshot: &ProjectSnapshot) -> String {
    let snapshot_json =
        serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    let credibility = finding
        .credibility
        .as_ref()
        .map(|c| format!("{} ({})", c.score, c.flags.join(", ")))
        .unwrap_or_else(|| "unscored".to_string());

    format!(
        "## Finding\n\
         - id: {}\n\
         - project: {} ({})\n\
         - category: {}\n\
         - source: {} [{}]\n\
         - published: {}\n\
         - credibility: {}\n\n\
         ### Extracted text\n{}\n\n\
         ## Current project state\n```json\n{}\n```\n\n\
         Assess how this evidence changes the four velocity factors and \
         respond with the JSON object described in the system prompt.",
        finding.finding_id,
        finding.project_name,
        finding.project_id,
        finding.category,
        finding.raw_data.source_name,
        finding.raw_data.source_type,
        finding.raw_data.publication_date,
        credibility,
        finding.raw_data.extracted_text,
        snapshot_json,
    )
}

/// Parses the assessment object out of the response content.
///
/// Tolerates surrounding prose and markdown fences by taking everything
/// between the first `{` and the last `}`.
pub(crate) fn parse_assessment(content: &str) -> Result<Assessment, AnalystError> {
    let json = extract_json(content)
        .ok_or_else(|| AnalystError::Malformed("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| AnalystError::Malformed(e.to_string()))
}

fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

/// System prompt for the assessment call.
const ANALYST_SYSTEM_PROMPT: &str = r#"You are an infrastructure-construction analyst. You receive one finding about a tracked construction project plus the project's current state, and you judge how the evidence moves four factor scores.

Respond with ONLY one JSON object, no prose, no markdown fences, in this shape:

{
  "summary": "one-sentence reading of the evidence",
  "factor_impacts": {
    "timeline_adherence": {"change": 0, "rationale": "..."},
    "funding_security": {"change": 0, "rationale": "..."},
    "construction_progress": {"change": 0, "rationale": "..."},
    "operator_stability": {"change": 0, "rationale": "..."}
  },
  "net_velocity_change": 0,
  "confidence": {"level": "high|medium|low", "score": 0, "assumptions": [], "data_gaps": []},
  "verification": {"claims_consistent": true, "notes": "..."},
  "risks": [],
  "actions": [],
  "issues": [],
  "decisions": [],
  "early_warnings": [],
  "milestones": [],
  "needs_review": false
}

Rules:
- Each "change" is an integer between -10 and +10. Use 0 when the evidence says nothing about that factor.
- Never invent facts that are not in the extracted text.
- If the evidence contradicts the project state, say so under verification and lower your confidence.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyst_config_default() {
        let config = AnalystConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.1:latest");
        assert_eq!(config.timeout_seconds, 120);
    }

    #[test]
    fn test_parse_assessment_plain_json() {
        let content = r#"{"factor_impacts": {"timeline_adherence": {"change": -4, "rationale": "six month delay announced"}}}"#;
        let assessment = parse_assessment(content).unwrap();
        assert_eq!(assessment.factor_impacts.timeline_adherence.change, -4.0);
    }

    #[test]
    fn test_parse_assessment_strips_fences_and_prose() {
        let content = "Here is my assessment:\n```json\n{\"factor_impacts\": {\"funding_security\": {\"change\": 3, \"rationale\": \"loan closed\"}}, \"needs_review\": false}\n```\nLet me know if you need more.";
        let assessment = parse_assessment(content).unwrap();
        assert_eq!(assessment.factor_impacts.funding_security.change, 3.0);
    }

    #[test]
    fn test_parse_assessment_rejects_prose_only() {
        let err = parse_assessment("The project looks fine to me.").unwrap_err();
        assert!(matches!(err, AnalystError::Malformed(_)));
    }

    #[test]
    fn test_parse_assessment_rejects_wrong_shape() {
        let err = parse_assessment(r#"{"factor_impacts": "all good"}"#).unwrap_err();
        assert!(matches!(err, AnalystError::Malformed(_)));
    }

    #[test]
    fn test_extract_json_bounds() {
        assert_eq!(extract_json("x {\"a\": 1} y"), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} reversed {"), None);
    }
}
