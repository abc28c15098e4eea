use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::warn;
use walkdir::WalkDir;

/// A company folder holding the framework / SPO document pair.
#[derive(Debug, Clone)]
pub struct CompanyFolder {
    pub name: String,
    pub framework_pdf: PathBuf,
    pub spo_pdf: PathBuf,
}

/// List company subfolders of the root, sorted by name.
///
/// Folders missing either PDF of the pair are skipped with a warning.
pub fn discover_companies(root: &Path) -> Result<Vec<CompanyFolder>> {
    if !root.is_dir() {
        return Err(anyhow!("Root folder not found: {}", root.display()));
    }

    let mut companies = Vec::new();

    let mut subdirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().to_path_buf())
        .collect();
    subdirs.sort();

    for dir in subdirs {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        match find_document_pair(&dir)? {
            Some((framework_pdf, spo_pdf)) => companies.push(CompanyFolder {
                name,
                framework_pdf,
                spo_pdf,
            }),
            None => {
                warn!(company = %name, "missing framework or SPO PDF, skipping");
            }
        }
    }

    Ok(companies)
}

/// Locate the framework and SPO PDFs inside a company folder.
///
/// Matching is by filename: `framework` marks the framework document; `spo`,
/// `second party opinion`, `second-party-opinion` or `second party` mark the
/// SPO document. Returns `None` unless both are present.
pub fn find_document_pair(folder: &Path) -> Result<Option<(PathBuf, PathBuf)>> {
    let mut framework = None;
    let mut spo = None;

    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();

    for path in files {
        let lower = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();

        if lower.contains("framework") {
            framework.get_or_insert(path.clone());
        }
        if lower.contains("spo")
            || lower.contains("second party opinion")
            || lower.contains("second-party-opinion")
            || lower.contains("second party")
        {
            spo.get_or_insert(path.clone());
        }
    }

    Ok(framework.zip(spo))
}
