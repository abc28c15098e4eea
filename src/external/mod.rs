pub mod error;
mod gemini;
mod groq;
pub mod whisperer;

use async_trait::async_trait;

pub use error::ExternalError;
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use whisperer::WhispererClient;

use crate::config::ModelConfig;

/// Common interface over the chat-style LLM providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, ExternalError>;
}

/// Create an LLM client by provider name.
pub fn create_client(
    provider: &str,
    models: &ModelConfig,
) -> Result<Box<dyn LlmClient>, ExternalError> {
    match provider {
        "gemini" => {
            let key = models
                .gemini_api_key
                .clone()
                .ok_or(ExternalError::MissingKey("GEMINI_API_KEY"))?;
            Ok(Box::new(GeminiClient::new(key, models.gemini_model.clone())?))
        }
        "groq" => {
            let key = models
                .groq_api_key
                .clone()
                .ok_or(ExternalError::MissingKey("GROQ_API_KEY"))?;
            Ok(Box::new(GroqClient::new(key, models.groq_model.clone())))
        }
        other => Err(ExternalError::Config(format!(
            "Unknown provider: {}. Use: gemini, groq",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> ModelConfig {
        ModelConfig {
            gemini_model: "gemini-2.5-flash".to_string(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            gemini_api_key: Some("g-key".to_string()),
            groq_api_key: Some("q-key".to_string()),
        }
    }

    #[test]
    fn test_create_client_factory() {
        let client = create_client("gemini", &models()).unwrap();
        assert_eq!(client.name(), "gemini");

        let client = create_client("groq", &models()).unwrap();
        assert_eq!(client.name(), "groq");

        assert!(create_client("openai", &models()).is_err());
    }

    #[test]
    fn test_create_client_requires_key() {
        let mut m = models();
        m.gemini_api_key = None;
        assert!(matches!(
            create_client("gemini", &m).err().unwrap(),
            ExternalError::MissingKey("GEMINI_API_KEY")
        ));
    }
}
