use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::WhispererConfig;
use crate::external::error::ExternalError;

/// Client for the LLM Whisperer OCR service (v2 API).
///
/// Extraction is asynchronous on the service side: a submitted document returns
/// a `whisper_hash`, which is polled until the status reaches `processed`.
#[derive(Debug)]
pub struct WhispererClient {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: usize,
}

#[derive(Deserialize)]
struct WhisperSubmitResponse {
    whisper_hash: Option<String>,
}

#[derive(Deserialize)]
struct WhisperStatusResponse {
    status: String,
}

#[derive(Deserialize)]
struct WhisperRetrieveResponse {
    extraction: WhisperExtraction,
}

#[derive(Deserialize)]
struct WhisperExtraction {
    result_text: String,
}

impl WhispererClient {
    pub fn new(config: &WhispererConfig) -> Result<Self, ExternalError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ExternalError::MissingKey("LLMWHISPERER_API_KEY"))?;

        Url::parse(&config.base_url)
            .map_err(|e| ExternalError::Config(format!("Invalid Whisperer URL: {}", e)))?;

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_polls: config.max_polls,
        })
    }

    /// Submit a PDF and wait for the extracted text.
    pub async fn extract_text(&self, pdf_path: &Path) -> Result<String, ExternalError> {
        let bytes = std::fs::read(pdf_path)
            .map_err(|e| ExternalError::Config(format!("Cannot read {}: {}", pdf_path.display(), e)))?;

        let hash = self.submit(bytes).await?;
        info!(whisper_hash = %hash, "document submitted to Whisperer");

        self.wait_until_processed(&hash).await?;
        self.retrieve(&hash).await
    }

    async fn submit(&self, bytes: Vec<u8>) -> Result<String, ExternalError> {
        let url = format!("{}/api/v2/whisper", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("unstract-key", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .query(&[("mode", "form"), ("output_mode", "layout_preserving")])
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExternalError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExternalError::Api { status, body });
        }

        let submitted: WhisperSubmitResponse = resp
            .json()
            .await
            .map_err(|e| ExternalError::Parse(e.to_string()))?;

        submitted
            .whisper_hash
            .ok_or_else(|| ExternalError::Parse("Whisperer did not return a whisper_hash".to_string()))
    }

    async fn wait_until_processed(&self, hash: &str) -> Result<(), ExternalError> {
        for attempt in 0..self.max_polls {
            let url = format!("{}/api/v2/whisper-status", self.base_url);
            let resp = self
                .client
                .get(&url)
                .header("unstract-key", &self.api_key)
                .query(&[("whisper_hash", hash)])
                .send()
                .await
                .map_err(|e| ExternalError::Network(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(ExternalError::Api { status, body });
            }

            let status: WhisperStatusResponse = resp
                .json()
                .await
                .map_err(|e| ExternalError::Parse(e.to_string()))?;

            debug!(attempt, status = %status.status, "Whisperer status poll");
            if status.status == "processed" {
                return Ok(());
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(ExternalError::Timeout(format!(
            "Whisperer extraction {} after {} polls",
            hash, self.max_polls
        )))
    }

    async fn retrieve(&self, hash: &str) -> Result<String, ExternalError> {
        let url = format!("{}/api/v2/whisper-retrieve", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("unstract-key", &self.api_key)
            .query(&[("whisper_hash", hash)])
            .send()
            .await
            .map_err(|e| ExternalError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExternalError::Api { status, body });
        }

        let retrieved: WhisperRetrieveResponse = resp
            .json()
            .await
            .map_err(|e| ExternalError::Parse(e.to_string()))?;

        Ok(retrieved.extraction.result_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhispererConfig;

    fn test_config(api_key: Option<String>) -> WhispererConfig {
        WhispererConfig {
            base_url: "https://llmwhisperer-api.us-central.unstract.com".to_string(),
            api_key,
            poll_interval_secs: 5,
            max_polls: 60,
        }
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = WhispererClient::new(&test_config(None)).unwrap_err();
        assert!(matches!(err, ExternalError::MissingKey(_)));
    }

    #[test]
    fn test_invalid_base_url_is_an_error() {
        let mut config = test_config(Some("key".to_string()));
        config.base_url = "not a url".to_string();
        assert!(matches!(
            WhispererClient::new(&config).unwrap_err(),
            ExternalError::Config(_)
        ));
    }

    #[test]
    fn test_retrieve_response_shape() {
        let json = r#"{"extraction": {"result_text": "Use of Proceeds | SDG"}}"#;
        let parsed: WhisperRetrieveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.extraction.result_text, "Use of Proceeds | SDG");
    }
}
