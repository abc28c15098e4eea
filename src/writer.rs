use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::tables::TableAnswer;

const SHEET_OVERVIEW: &str = "Framework Overview";
const SHEET_GOVERNANCE: &str = "Governance";
const SHEET_SPO_SUMMARY: &str = "SPO Summary";
const SHEET_ELIGIBILITY: &str = "Eligibility+EU Tax";
const SHEET_SDG: &str = "SDG";

const OVERVIEW_HEADERS: [&str; 8] = [
    "Framework ID",
    "Issuer",
    "Framework Name",
    "SPO Provider",
    "Alignment",
    "Year",
    "SPO Date",
    "Framework Source",
];

const GOVERNANCE_HEADERS: [&str; 4] = [
    "Framework ID",
    "Exclusion Criteria",
    "Impact Reporting",
    "External Verification",
];

const SPO_SUMMARY_HEADERS: [&str; 2] = ["Framework ID", "Summary"];

const ELIGIBILITY_HEADERS: [&str; 9] = [
    "Framework ID",
    "Use of Proceeds",
    "Eligibility Criteria",
    "SPO Evaluation",
    "EU Taxonomy Alignment",
    "DNSH",
    "Minimum Safeguards",
    "NACE Code",
    "EU Taxonomy Economic Activity",
];

const SDG_HEADERS: [&str; 3] = ["Framework ID", "Use of Proceeds", "SDG"];

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Failed to read workbook {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write workbook {path}: {message}")]
    Write { path: String, message: String },

    #[error("No framework entry exists yet. Add a framework first.")]
    NoFramework,
}

/// Structured framework data from the LLM, keyed by the output column names.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrameworkRecord {
    #[serde(rename = "Issuer", default)]
    pub issuer: String,
    #[serde(rename = "Framework Name", default)]
    pub framework_name: String,
    #[serde(rename = "SPO Provider", default)]
    pub spo_provider: String,
    #[serde(rename = "Alignment", default)]
    pub alignment: String,
    #[serde(rename = "Year", default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(rename = "SPO Date", default)]
    pub spo_date: String,
    #[serde(rename = "Framework Source", default)]
    pub framework_source: String,
    #[serde(rename = "Exclusion Criteria", default)]
    pub exclusion_criteria: String,
    #[serde(rename = "Impact Reporting", default)]
    pub impact_reporting: String,
    #[serde(rename = "External Verification", default)]
    pub external_verification: String,
}

/// Structured SPO data from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpoRecord {
    #[serde(rename = "SPO Provider", default)]
    pub spo_provider: String,
    #[serde(rename = "SPO Date", default)]
    pub spo_date: String,
    #[serde(rename = "Summary", default)]
    pub summary: String,
}

// Models occasionally return the year as a bare number.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// In-memory view of the output workbook.
///
/// Existing sheets are loaded on open so framework IDs keep incrementing
/// across runs; `save` rewrites the whole file.
pub struct FrameworkWorkbook {
    path: PathBuf,
    overview: Vec<Vec<String>>,
    governance: Vec<Vec<String>>,
    spo_summary: Vec<Vec<String>>,
    eligibility: Vec<Vec<String>>,
    sdg: Vec<Vec<String>>,
}

impl FrameworkWorkbook {
    /// Open the workbook at `path`, loading existing rows when the file exists.
    pub fn open(path: &Path) -> Result<Self, WriterError> {
        let mut workbook = Self {
            path: path.to_path_buf(),
            overview: Vec::new(),
            governance: Vec::new(),
            spo_summary: Vec::new(),
            eligibility: Vec::new(),
            sdg: Vec::new(),
        };

        if path.exists() {
            workbook.load_existing()?;
            info!(
                path = %path.display(),
                frameworks = workbook.overview.len(),
                "loaded existing workbook"
            );
        }

        Ok(workbook)
    }

    fn load_existing(&mut self) -> Result<(), WriterError> {
        let mut reader: Xlsx<std::io::BufReader<std::fs::File>> =
            open_workbook(&self.path).map_err(|e: calamine::XlsxError| WriterError::Read {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        for (name, rows) in [
            (SHEET_OVERVIEW, &mut self.overview),
            (SHEET_GOVERNANCE, &mut self.governance),
            (SHEET_SPO_SUMMARY, &mut self.spo_summary),
            (SHEET_ELIGIBILITY, &mut self.eligibility),
            (SHEET_SDG, &mut self.sdg),
        ] {
            if let Ok(range) = reader.worksheet_range(name) {
                // First row is the header
                for row in range.rows().skip(1) {
                    rows.push(row.iter().map(|cell| cell.to_string()).collect());
                }
            }
        }

        Ok(())
    }

    /// The next framework ID in sequence (`F001`, `F002`, ...), derived from
    /// the last row of the given sheet.
    fn next_id(rows: &[Vec<String>]) -> String {
        let last = rows
            .last()
            .and_then(|row| row.first())
            .map(String::as_str)
            .unwrap_or("");

        match last.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
            Some(number) => format!("F{:03}", number + 1),
            None => "F001".to_string(),
        }
    }

    /// Append a framework: a row in Framework Overview and one in Governance.
    /// Returns the assigned framework ID.
    pub fn append_framework(&mut self, record: &FrameworkRecord) -> String {
        let id = Self::next_id(&self.overview);

        self.overview.push(vec![
            id.clone(),
            record.issuer.clone(),
            record.framework_name.clone(),
            record.spo_provider.clone(),
            record.alignment.clone(),
            record.year.clone(),
            record.spo_date.clone(),
            record.framework_source.clone(),
        ]);
        self.governance.push(vec![
            id.clone(),
            record.exclusion_criteria.clone(),
            record.impact_reporting.clone(),
            record.external_verification.clone(),
        ]);

        debug!(framework_id = %id, issuer = %record.issuer, "framework appended");
        id
    }

    /// Attach an SPO to the most recently appended framework: fills the SPO
    /// Provider and SPO Date columns on that row and appends the summary.
    pub fn append_spo(&mut self, record: &SpoRecord) -> Result<String, WriterError> {
        let last = self.overview.last_mut().ok_or(WriterError::NoFramework)?;
        let id = last.first().cloned().unwrap_or_default();

        if last.len() >= 7 {
            last[3] = record.spo_provider.clone();
            last[6] = record.spo_date.clone();
        }

        self.spo_summary.push(vec![id.clone(), record.summary.clone()]);

        debug!(framework_id = %id, provider = %record.spo_provider, "SPO appended");
        Ok(id)
    }

    /// Append a parsed table: one SDG row per use of proceeds and one
    /// eligibility row per criterion, all under one fresh framework ID.
    pub fn append_table_answer(&mut self, answer: &TableAnswer) -> String {
        let id = Self::next_id(&self.eligibility);

        for uop in &answer.use_of_proceeds {
            self.sdg.push(vec![
                id.clone(),
                uop.name.clone(),
                uop.sdgs.join(", "),
            ]);

            for criterion in &uop.eligibility_criteria {
                self.eligibility.push(vec![
                    id.clone(),
                    uop.name.clone(),
                    criterion.description.clone(),
                    criterion.spo_evaluation.clone(),
                    criterion.eu_taxonomy_alignment.clone(),
                    criterion.dnsh.clone(),
                    criterion.minimum_safeguards.clone(),
                    criterion.nace_code.clone(),
                    criterion.eu_taxonomy_economic_activity.clone(),
                ]);
            }
        }

        debug!(framework_id = %id, categories = answer.use_of_proceeds.len(), "table appended");
        id
    }

    /// Write all sheets back to disk.
    pub fn save(&self) -> Result<(), WriterError> {
        let mut workbook = Workbook::new();

        let sheets: [(&str, &[&str], &[Vec<String>]); 5] = [
            (SHEET_OVERVIEW, &OVERVIEW_HEADERS, &self.overview),
            (SHEET_GOVERNANCE, &GOVERNANCE_HEADERS, &self.governance),
            (SHEET_SPO_SUMMARY, &SPO_SUMMARY_HEADERS, &self.spo_summary),
            (SHEET_ELIGIBILITY, &ELIGIBILITY_HEADERS, &self.eligibility),
            (SHEET_SDG, &SDG_HEADERS, &self.sdg),
        ];

        for (name, headers, rows) in sheets {
            let sheet = workbook
                .add_worksheet()
                .set_name(name)
                .map_err(|e| self.write_error(e.to_string()))?;

            for (col, header) in headers.iter().enumerate() {
                sheet
                    .write_string(0, col as u16, *header)
                    .map_err(|e| self.write_error(e.to_string()))?;
            }
            for (row_idx, row) in rows.iter().enumerate() {
                for (col, value) in row.iter().enumerate() {
                    sheet
                        .write_string(row_idx as u32 + 1, col as u16, value)
                        .map_err(|e| self.write_error(e.to_string()))?;
                }
            }
        }

        workbook
            .save(&self.path)
            .map_err(|e| self.write_error(e.to_string()))?;

        info!(path = %self.path.display(), "workbook saved");
        Ok(())
    }

    fn write_error(&self, message: String) -> WriterError {
        WriterError::Write {
            path: self.path.display().to_string(),
            message,
        }
    }

    pub fn framework_count(&self) -> usize {
        self.overview.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{EligibilityCriterion, UseOfProceeds};

    fn framework(issuer: &str) -> FrameworkRecord {
        FrameworkRecord {
            issuer: issuer.to_string(),
            framework_name: format!("{} Green Framework", issuer),
            year: "2024".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ids_increment() {
        let temp = tempfile::tempdir().unwrap();
        let mut wb = FrameworkWorkbook::open(&temp.path().join("out.xlsx")).unwrap();

        assert_eq!(wb.append_framework(&framework("Acme")), "F001");
        assert_eq!(wb.append_framework(&framework("Globex")), "F002");
        assert_eq!(wb.framework_count(), 2);
    }

    #[test]
    fn test_id_rolls_past_three_digits() {
        let rows = vec![vec!["F099".to_string()]];
        assert_eq!(FrameworkWorkbook::next_id(&rows), "F100");

        let rows = vec![vec!["F999".to_string()]];
        assert_eq!(FrameworkWorkbook::next_id(&rows), "F1000");
    }

    #[test]
    fn test_unparsable_last_id_restarts() {
        let rows = vec![vec!["framework one".to_string()]];
        assert_eq!(FrameworkWorkbook::next_id(&rows), "F001");
        assert_eq!(FrameworkWorkbook::next_id(&[]), "F001");
    }

    #[test]
    fn test_spo_updates_last_framework_row() {
        let temp = tempfile::tempdir().unwrap();
        let mut wb = FrameworkWorkbook::open(&temp.path().join("out.xlsx")).unwrap();

        wb.append_framework(&framework("Acme"));
        wb.append_framework(&framework("Globex"));

        let spo = SpoRecord {
            spo_provider: "Sustainalytics".to_string(),
            spo_date: "2024-03-01".to_string(),
            summary: "Credible and impactful.".to_string(),
        };
        let id = wb.append_spo(&spo).unwrap();

        assert_eq!(id, "F002");
        assert_eq!(wb.overview[1][3], "Sustainalytics");
        assert_eq!(wb.overview[1][6], "2024-03-01");
        // first framework untouched
        assert_eq!(wb.overview[0][3], "");
        assert_eq!(wb.spo_summary, vec![vec!["F002".to_string(), "Credible and impactful.".to_string()]]);
    }

    #[test]
    fn test_spo_without_framework_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut wb = FrameworkWorkbook::open(&temp.path().join("out.xlsx")).unwrap();

        let err = wb.append_spo(&SpoRecord::default()).unwrap_err();
        assert!(matches!(err, WriterError::NoFramework));
    }

    #[test]
    fn test_table_answer_rows() {
        let temp = tempfile::tempdir().unwrap();
        let mut wb = FrameworkWorkbook::open(&temp.path().join("out.xlsx")).unwrap();

        let answer = TableAnswer {
            use_of_proceeds: vec![UseOfProceeds {
                name: "Renewable Energy".to_string(),
                sdgs: vec!["7".to_string(), "13".to_string()],
                eligibility_criteria: vec![
                    EligibilityCriterion {
                        description: "Solar".to_string(),
                        ..Default::default()
                    },
                    EligibilityCriterion {
                        description: "Wind".to_string(),
                        ..Default::default()
                    },
                ],
            }],
        };

        let id = wb.append_table_answer(&answer);
        assert_eq!(id, "F001");
        assert_eq!(wb.sdg.len(), 1);
        assert_eq!(wb.sdg[0], vec!["F001", "Renewable Energy", "7, 13"]);
        assert_eq!(wb.eligibility.len(), 2);
        assert_eq!(wb.eligibility[0][2], "Solar");
        assert_eq!(wb.eligibility[1][2], "Wind");
    }

    #[test]
    fn test_ids_continue_across_save_and_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.xlsx");

        let mut wb = FrameworkWorkbook::open(&path).unwrap();
        wb.append_framework(&framework("Acme"));
        wb.save().unwrap();

        let mut wb = FrameworkWorkbook::open(&path).unwrap();
        assert_eq!(wb.framework_count(), 1);
        assert_eq!(wb.append_framework(&framework("Globex")), "F002");
    }

    #[test]
    fn test_framework_record_year_accepts_number() {
        let value = serde_json::json!({"Issuer": "Acme", "Year": 2024});
        let record: FrameworkRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.year, "2024");
    }

    #[test]
    fn test_framework_record_missing_keys_default_empty() {
        let value = serde_json::json!({"Issuer": "Acme"});
        let record: FrameworkRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.issuer, "Acme");
        assert_eq!(record.alignment, "");
        assert_eq!(record.year, "");
    }
}
