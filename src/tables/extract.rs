use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// A page needs at least this many ruling operators (rectangles and line
/// segments) in its content stream to count as a table page. A modest grid
/// already draws a dozen rules; running prose draws almost none.
const MIN_RULING_OPS: usize = 12;

const LABEL_FRAMEWORK: &str = "Framework PDF";
const LABEL_SPO: &str = "Second Party Opinion / SPO";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read PDF {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("Failed to build merged PDF: {0}")]
    Merge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 0-based indices of pages whose content stream draws a ruled grid.
pub fn pages_with_tables(path: &Path) -> Result<Vec<usize>, TableError> {
    let doc = Document::load(path).map_err(|e| TableError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    for (index, (_page_num, page_id)) in doc.get_pages().into_iter().enumerate() {
        let data = match doc.get_page_content(page_id) {
            Ok(data) => data,
            Err(_) => continue,
        };
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(_) => continue,
        };

        let ruling_ops = content
            .operations
            .iter()
            .filter(|op| matches!(op.operator.as_str(), "re" | "l"))
            .count();

        if ruling_ops >= MIN_RULING_OPS {
            pages.push(index);
        }
    }

    debug!(path = %path.display(), pages = ?pages, "table page scan");
    Ok(pages)
}

/// Build a temporary PDF holding only the table pages of the pair, each
/// section preceded by a label page. Returns `None` when neither document
/// has table pages. The file is deleted when the handle drops.
pub fn merge_table_pages(
    framework_pdf: &Path,
    spo_pdf: &Path,
) -> Result<Option<NamedTempFile>, TableError> {
    let framework_pages = pages_with_tables(framework_pdf)?;
    let spo_pages = pages_with_tables(spo_pdf)?;

    info!(
        framework = ?framework_pages,
        spo = ?spo_pages,
        "pages with tables"
    );

    if framework_pages.is_empty() && spo_pages.is_empty() {
        return Ok(None);
    }

    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<ObjectId> = Vec::new();

    if !framework_pages.is_empty() {
        kids.push(add_label_page(&mut merged, pages_id, LABEL_FRAMEWORK)?);
        kids.extend(import_pages(
            &mut merged,
            framework_pdf,
            &framework_pages,
            pages_id,
        )?);
    }
    if !spo_pages.is_empty() {
        kids.push(add_label_page(&mut merged, pages_id, LABEL_SPO)?);
        kids.extend(import_pages(&mut merged, spo_pdf, &spo_pages, pages_id)?);
    }

    let kid_refs: Vec<Object> = kids.iter().map(|id| Object::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kid_refs.len() as i64,
            "Kids" => kid_refs,
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    let file = NamedTempFile::new()?;
    merged
        .save(file.path())
        .map_err(|e| TableError::Merge(e.to_string()))?;

    debug!(path = %file.path().display(), pages = kids.len(), "merged table PDF written");
    Ok(Some(file))
}

/// Append a single page carrying a centered bold label.
fn add_label_page(
    doc: &mut Document,
    pages_id: ObjectId,
    text: &str,
) -> Result<ObjectId, TableError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 20.into()]),
            Operation::new("Td", vec![140.into(), 420.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| TableError::Merge(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        // A4 media box
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    }))
}

/// Copy the selected pages of a source PDF into the merged document.
///
/// Source objects are renumbered past the destination's id space and copied
/// wholesale; each selected page dictionary is then re-parented and given any
/// Resources/MediaBox it previously inherited from its ancestors.
fn import_pages(
    merged: &mut Document,
    source_path: &Path,
    indices: &[usize],
    pages_id: ObjectId,
) -> Result<Vec<ObjectId>, TableError> {
    let mut source = Document::load(source_path).map_err(|e| TableError::Pdf {
        path: source_path.display().to_string(),
        message: e.to_string(),
    })?;

    source.renumber_objects_with(merged.max_id + 1);

    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();

    let mut selected: Vec<(ObjectId, Option<Object>, Option<Object>)> = Vec::new();
    for &index in indices {
        let Some(&page_id) = source_pages.get(index) else {
            continue;
        };
        let resources = inherited_attribute(&source, page_id, b"Resources");
        let media_box = inherited_attribute(&source, page_id, b"MediaBox");
        selected.push((page_id, resources, media_box));
    }

    merged.max_id = source.max_id;
    merged.objects.extend(source.objects);

    let mut imported = Vec::new();
    for (page_id, resources, media_box) in selected {
        let page = merged
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| TableError::Merge(format!("page {:?}: {}", page_id, e)))?;

        page.set("Parent", Object::Reference(pages_id));
        if !page.has(b"Resources") {
            if let Some(resources) = resources {
                page.set("Resources", resources);
            }
        }
        if !page.has(b"MediaBox") {
            if let Some(media_box) = media_box {
                page.set("MediaBox", media_box);
            }
        }
        imported.push(page_id);
    }

    Ok(imported)
}

/// Look up a page attribute, walking the Parent chain for inherited values.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..16 {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            // Resolve one level of indirection so the copy stands alone
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}
