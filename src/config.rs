use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub gemini_model: String,
    pub groq_model: String,
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhispererConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Give up after this many polls.
    pub max_polls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root_folder: String,
    pub excel_file: String,
    pub prompts_file: String,
    pub table_prompts_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub models: ModelConfig,
    pub whisperer: WhispererConfig,
    pub output: OutputConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let retrieval = RetrievalConfig {
            chunk_size: env::var("CHUNK_SIZE")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            overlap: env::var("CHUNK_OVERLAP")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap_or(200),
            top_k: env::var("TOP_K")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap_or(6),
        };

        let models = ModelConfig {
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            groq_api_key: env::var("GROQ_API_KEY").ok(),
        };

        let whisperer = WhispererConfig {
            base_url: env::var("WHISPERER_BASE")
                .unwrap_or_else(|_| "https://llmwhisperer-api.us-central.unstract.com".to_string()),
            api_key: env::var("LLMWHISPERER_API_KEY").ok(),
            poll_interval_secs: env::var("WHISPERER_POLL_INTERVAL")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            max_polls: env::var("WHISPERER_MAX_POLLS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        };

        let output = OutputConfig {
            root_folder: env::var("MAIN_FOLDER").unwrap_or_else(|_| "Main_Folder".to_string()),
            excel_file: env::var("EXCEL_FILE")
                .unwrap_or_else(|_| "Framework Output.xlsx".to_string()),
            prompts_file: env::var("PROMPTS_FILE")
                .unwrap_or_else(|_| "Prompts/prompts.json".to_string()),
            table_prompts_file: env::var("PROMPTS_TABLE")
                .unwrap_or_else(|_| "Prompts/prompts_table.json".to_string()),
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let config = Self {
            retrieval,
            models,
            whisperer,
            output,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_size == 0 {
            bail!("CHUNK_SIZE must be greater than zero");
        }
        if self.retrieval.overlap >= self.retrieval.chunk_size {
            bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.retrieval.overlap,
                self.retrieval.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("TOP_K must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeguard::guard;
    use std::env;

    fn clean_env() {
        env::remove_var("CHUNK_SIZE");
        env::remove_var("CHUNK_OVERLAP");
        env::remove_var("TOP_K");
        env::remove_var("GEMINI_MODEL");
        env::remove_var("GROQ_MODEL");
        env::remove_var("GEMINI_API_KEY");
        env::remove_var("GROQ_API_KEY");
        env::remove_var("WHISPERER_BASE");
        env::remove_var("LLMWHISPERER_API_KEY");
        env::remove_var("WHISPERER_POLL_INTERVAL");
        env::remove_var("WHISPERER_MAX_POLLS");
        env::remove_var("MAIN_FOLDER");
        env::remove_var("EXCEL_FILE");
        env::remove_var("PROMPTS_FILE");
        env::remove_var("PROMPTS_TABLE");
        env::remove_var("LOG_LEVEL");
    }

    #[test]
    #[serial_test::serial]
    fn test_default_config() {
        clean_env();
        let _guard = guard((), |_| clean_env());

        let config = Config::from_env().unwrap();

        assert_eq!(config.retrieval.chunk_size, 2000, "wrong default chunk size");
        assert_eq!(config.retrieval.overlap, 200, "wrong default overlap");
        assert_eq!(config.retrieval.top_k, 6, "wrong default top_k");
        assert_eq!(
            config.models.gemini_model, "gemini-2.5-flash",
            "wrong default gemini model"
        );
        assert_eq!(
            config.models.groq_model, "llama-3.3-70b-versatile",
            "wrong default groq model"
        );
        assert_eq!(
            config.output.root_folder, "Main_Folder",
            "wrong default root folder"
        );
        assert_eq!(config.whisperer.poll_interval_secs, 5);
        assert!(config.models.gemini_api_key.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn test_custom_config() {
        clean_env();
        let _guard = guard((), |_| clean_env());

        env::set_var("CHUNK_SIZE", "500");
        env::set_var("CHUNK_OVERLAP", "50");
        env::set_var("TOP_K", "3");
        env::set_var("GEMINI_MODEL", "custom-gemini");
        env::set_var("MAIN_FOLDER", "/data/companies");
        env::set_var("EXCEL_FILE", "out.xlsx");

        let config = Config::from_env().unwrap();

        assert_eq!(config.retrieval.chunk_size, 500, "chunk size mismatch");
        assert_eq!(config.retrieval.overlap, 50, "overlap mismatch");
        assert_eq!(config.retrieval.top_k, 3, "top_k mismatch");
        assert_eq!(
            config.models.gemini_model, "custom-gemini",
            "gemini model mismatch"
        );
        assert_eq!(
            config.output.root_folder, "/data/companies",
            "root folder mismatch"
        );
        assert_eq!(config.output.excel_file, "out.xlsx", "excel file mismatch");
    }

    #[test]
    #[serial_test::serial]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        clean_env();
        let _guard = guard((), |_| clean_env());

        env::set_var("CHUNK_SIZE", "100");
        env::set_var("CHUNK_OVERLAP", "100");

        assert!(Config::from_env().is_err());
    }
}
