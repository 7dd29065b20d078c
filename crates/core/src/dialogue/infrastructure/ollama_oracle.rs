use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dialogue::domain::dialogue_oracle::{DialogueOracle, DialogueRequest, OracleError};
use crate::dialogue::domain::prompt_builder::{build_reply_prompt, build_summary_prompt};
use crate::memory::domain::conversation_turn::ConversationTurn;
use crate::memory::domain::profile::Profile;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Dialogue oracle backed by an Ollama `/api/generate` endpoint.
pub struct OllamaOracle {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl OllamaOracle {
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let resp = self.client.post(&self.url).json(&body).send()?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(format!("HTTP {status} from {}: {text}", self.url).into());
        }

        let text = resp.text()?;
        parse_generate_response(&text)
    }
}

fn parse_generate_response(body: &str) -> Result<String, OracleError> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    Ok(parsed.response.trim().to_string())
}

impl DialogueOracle for OllamaOracle {
    fn reply(&self, request: &DialogueRequest) -> Result<String, OracleError> {
        let prompt = build_reply_prompt(request);
        log::debug!(
            "Requesting {} reply for {} from {}",
            request.state.as_str(),
            request.name,
            self.model
        );
        self.generate(&prompt)
    }

    fn summarize(
        &self,
        name: &str,
        profile: &Profile,
        session: &[ConversationTurn],
    ) -> Result<String, OracleError> {
        log::debug!("Requesting session summary for {name} from {}", self.model);
        self.generate(&build_summary_prompt(profile, session))
    }
}
