use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::Config,
    constants::grading_prompt::{build_grading_prompt, GRADER_SYSTEM_PROMPT},
    errors::{AppError, AppResult},
    services::grading_service::{Assessment, AssessmentRequest, FreeformGrader, GraderError},
};

const GRADING_TEMPERATURE: f64 = 0.2;
const RESPONSE_TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Shape the model is asked to answer in.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiVerdict {
    /// Awarded points, between 0 and the maximum score.
    pub score: f64,
    /// Short feedback for the student.
    #[serde(default)]
    pub feedback: String,
}

/// `responseSchema` for the Gemini API, which rejects the JSON-Schema meta keys.
pub fn verdict_schema() -> Value {
    let mut schema = serde_json::to_value(schema_for!(AiVerdict)).unwrap_or_else(|_| json!({}));
    if let Some(map) = schema.as_object_mut() {
        map.remove("$schema");
        map.remove("title");
    }
    schema
}

/// Grades free-form answers through the Gemini `generateContent` endpoint.
pub struct GeminiGrader {
    client: Client,
    base_url: String,
    model: String,
    schema: Value,
    timeout: Duration,
}

impl GeminiGrader {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            schema: verdict_schema(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            &config.gemini_base_url,
            &config.gemini_model,
            Duration::from_secs(config.ai_grading_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request_body(&self, request: &AssessmentRequest) -> Value {
        let prompt = build_grading_prompt(
            request.question_type,
            &request.question,
            request.key_answer.as_deref(),
            &request.student_answer,
            request.max_score,
        );

        json!({
            "systemInstruction": { "parts": [{ "text": GRADER_SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": GRADING_TEMPERATURE,
                "responseMimeType": "application/json",
                "responseSchema": self.schema,
            }
        })
    }
}

/// Pulls the verdict out of a `generateContent` response body.
pub fn parse_verdict(body: &Value) -> Result<Assessment, GraderError> {
    let text = body
        .pointer(RESPONSE_TEXT_POINTER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(GraderError::Empty)?;

    let verdict: AiVerdict =
        serde_json::from_str(text).map_err(|e| GraderError::Malformed(e.to_string()))?;

    Ok(Assessment {
        score: verdict.score,
        feedback: verdict.feedback,
    })
}

#[async_trait]
impl FreeformGrader for GeminiGrader {
    async fn assess(
        &self,
        api_key: &str,
        request: AssessmentRequest,
    ) -> Result<Assessment, GraderError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GraderError::Timeout(self.timeout)
                } else {
                    GraderError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GraderError::Malformed(e.without_url().to_string()))?;

        parse_verdict(&body)
    }
}
