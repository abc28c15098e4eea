use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prompt pair for one extraction section: the TF-IDF retrieval query and the
/// system instruction sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPrompt {
    pub retrieval_query: String,
    pub system: String,
}

/// Prompts for the text pipeline, loaded from the prompts JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    pub framework: SectionPrompt,
    pub spo: SectionPrompt,
}

/// Prompt for the table pipeline, loaded from its own JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePrompt {
    pub system: String,
}

impl Prompts {
    /// Load prompts from a JSON file, falling back to the built-in defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "prompts file not found, using built-in prompts");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read prompts file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid prompts file {}", path.display()))
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            framework: SectionPrompt {
                retrieval_query: "green bond framework issuer use of proceeds alignment \
                                  eligibility exclusion criteria impact reporting external \
                                  verification"
                    .to_string(),
                system: "You extract structured data from green bond framework documents. \
                         Answer with a single JSON object with the keys \"Issuer\", \
                         \"Framework Name\", \"SPO Provider\", \"Alignment\", \"Year\", \
                         \"SPO Date\", \"Framework Source\", \"Exclusion Criteria\", \
                         \"Impact Reporting\" and \"External Verification\". Use an empty \
                         string for anything the context does not state."
                    .to_string(),
            },
            spo: SectionPrompt {
                retrieval_query: "second party opinion provider assessment date summary \
                                  conclusion alignment"
                    .to_string(),
                system: "You extract structured data from second party opinion documents. \
                         Answer with a single JSON object with the keys \"SPO Provider\", \
                         \"SPO Date\" and \"Summary\". The summary is a short paragraph of \
                         the opinion's conclusions. Use an empty string for anything the \
                         context does not state."
                    .to_string(),
            },
        }
    }
}

impl TablePrompt {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "table prompts file not found, using built-in prompt");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read table prompts file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid table prompts file {}", path.display()))
    }
}

impl Default for TablePrompt {
    fn default() -> Self {
        Self {
            system: "You extract use-of-proceeds tables from green bond frameworks and \
                     second party opinions. Answer with a single JSON object: \
                     {\"Use_of_Proceeds\": [{\"Name\": string, \"SDGs\": [string], \
                     \"Eligibility_Criteria\": [{\"Description\": string, \
                     \"SPO_Evaluation\": string, \"EU_Taxonomy_Alignment\": string, \
                     \"DNSH\": string, \"Minimum_Safeguards\": string, \"NACE_Code\": \
                     string, \"EU_Taxonomy_Economic_Activity\": string}]}]}. Use empty \
                     strings for missing values."
                .to_string(),
        }
    }
}
