//! Remediation advice for a diagnosed condition.
//!
//! [`StaticSolutions`] serves curated text. [`RemoteSolutions`] asks an
//! OpenAI-compatible chat endpoint and falls back to the curated text when
//! that call fails for any reason.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SolutionError;

pub const HEALTHY_SOLUTION: &str = "Your potato plant is healthy! Continue monitoring for any signs of disease and maintain good cultural practices like proper watering and spacing.";

const SYSTEM_PROMPT: &str =
    "You are an agricultural expert specializing in potato crop diseases.";

#[async_trait]
pub trait SolutionProvider: Send + Sync {
    async fn solution(&self, disease: &str, confidence: f64) -> String;

    fn name(&self) -> &'static str;
}

pub fn static_solution(disease: &str, confidence: f64) -> String {
    match disease {
        "Healthy" => HEALTHY_SOLUTION.to_string(),
        "Early Blight" => format!(
            "Early Blight (Confidence: {confidence:.2}%) detected. Management includes: \
             1. Remove and destroy infected leaves. \
             2. Apply a recommended fungicide (e.g., chlorothalonil or mancozeb). \
             3. Ensure proper plant spacing and avoid overhead watering to reduce leaf wetness."
        ),
        "Late Blight" => format!(
            "\u{1F6A8} Late Blight (Confidence: {confidence:.2}%) detected. \
             This is a severe threat! \
             Immediate action is critical: \
             1. Apply a systemic fungicide immediately. \
             2. Remove and destroy all infected plant material (do not compost). \
             3. Monitor neighboring plants daily for rapid spread. \
             Consult a local agricultural extension office without delay."
        ),
        other => format!(
            "Diagnosis complete (Confidence: {confidence:.2}%). \
             The disease is recognized as {other}. \
             Please consult a local agricultural expert for the best next steps."
        ),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSolutions;

#[async_trait]
impl SolutionProvider for StaticSolutions {
    async fn solution(&self, disease: &str, confidence: f64) -> String {
        static_solution(disease, confidence)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct RemoteSolutions {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteSolutions {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn prompt(disease: &str, confidence: f64) -> String {
        format!(
            "You are an agricultural expert helping farmers with potato crop diseases.\n\
             A farmer has uploaded an image of a potato leaf, and our AI system detected:\n\
             - Disease: {disease}\n\
             - Confidence: {confidence:.2}%\n\n\
             Provide a practical, farmer-friendly solution that includes:\n\
             1. Brief explanation of the disease\n\
             2. Immediate action steps\n\
             3. Prevention measures\n\
             4. When to seek professional help\n\n\
             Keep it concise (2-3 paragraphs), simple, and actionable."
        )
    }

    pub async fn generate(&self, disease: &str, confidence: f64) -> Result<String, SolutionError> {
        let prompt = Self::prompt(disease, confidence);
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: 300,
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SolutionError::Status(response.status()));
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SolutionError::EmptyResponse)?;

        tracing::info!("Remote solution generated for {}", disease);
        Ok(content)
    }
}

#[async_trait]
impl SolutionProvider for RemoteSolutions {
    async fn solution(&self, disease: &str, confidence: f64) -> String {
        match self.generate(disease, confidence).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Remote solution failed, using static text: {}", e);
                static_solution(disease, confidence)
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
