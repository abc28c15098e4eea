use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::external::LlmClient;
use crate::parser::parse_with_fallback;
use crate::prompts::TablePrompt;

/// Structured result of parsing extracted table text.
///
/// Field names mirror the JSON contract the table prompt asks the model for.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TableAnswer {
    #[serde(rename = "Use_of_Proceeds", default)]
    pub use_of_proceeds: Vec<UseOfProceeds>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UseOfProceeds {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SDGs", default)]
    pub sdgs: Vec<String>,
    #[serde(rename = "Eligibility_Criteria", default)]
    pub eligibility_criteria: Vec<EligibilityCriterion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EligibilityCriterion {
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "SPO_Evaluation", default)]
    pub spo_evaluation: String,
    #[serde(rename = "EU_Taxonomy_Alignment", default)]
    pub eu_taxonomy_alignment: String,
    #[serde(rename = "DNSH", default)]
    pub dnsh: String,
    #[serde(rename = "Minimum_Safeguards", default)]
    pub minimum_safeguards: String,
    #[serde(rename = "NACE_Code", default)]
    pub nace_code: String,
    #[serde(rename = "EU_Taxonomy_Economic_Activity", default)]
    pub eu_taxonomy_economic_activity: String,
}

/// Parse OCR-extracted table text into a [`TableAnswer`] via the LLM.
pub async fn parse_table_text(
    primary: &dyn LlmClient,
    fallback: Option<&dyn LlmClient>,
    prompt: &TablePrompt,
    table_text: &str,
) -> Result<TableAnswer> {
    let user = format!(
        "Extracted table text (layout preserved):\n\n{}\n\nRespond with a single JSON object only.",
        table_text
    );

    let value = parse_with_fallback(primary, fallback, &prompt.system, &user).await?;
    serde_json::from_value(value).context("Table response does not match the expected shape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalError;
    use async_trait::async_trait;

    struct FixedClient(&'static str);

    #[async_trait]
    impl LlmClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ExternalError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_parse_table_text_full_shape() {
        let client = FixedClient(
            r#"{
                "Use_of_Proceeds": [
                    {
                        "Name": "Renewable Energy",
                        "SDGs": ["7", "13"],
                        "Eligibility_Criteria": [
                            {
                                "Description": "Solar and wind generation",
                                "SPO_Evaluation": "Aligned",
                                "EU_Taxonomy_Alignment": "Yes",
                                "DNSH": "Met",
                                "Minimum_Safeguards": "Met",
                                "NACE_Code": "D35.11",
                                "EU_Taxonomy_Economic_Activity": "Electricity generation"
                            }
                        ]
                    }
                ]
            }"#,
        );

        let answer = parse_table_text(&client, None, &TablePrompt::default(), "text")
            .await
            .unwrap();

        assert_eq!(answer.use_of_proceeds.len(), 1);
        let uop = &answer.use_of_proceeds[0];
        assert_eq!(uop.name, "Renewable Energy");
        assert_eq!(uop.sdgs, vec!["7", "13"]);
        assert_eq!(uop.eligibility_criteria[0].nace_code, "D35.11");
    }

    #[tokio::test]
    async fn test_parse_table_text_missing_fields_default() {
        let client = FixedClient(r#"{"Use_of_Proceeds": [{"Name": "Clean Transport"}]}"#);

        let answer = parse_table_text(&client, None, &TablePrompt::default(), "text")
            .await
            .unwrap();

        let uop = &answer.use_of_proceeds[0];
        assert_eq!(uop.name, "Clean Transport");
        assert!(uop.sdgs.is_empty());
        assert!(uop.eligibility_criteria.is_empty());
    }

    #[tokio::test]
    async fn test_parse_table_text_empty_object() {
        let client = FixedClient("{}");
        let answer = parse_table_text(&client, None, &TablePrompt::default(), "text")
            .await
            .unwrap();
        assert!(answer.use_of_proceeds.is_empty());
    }
}
