//! The build run: index, listing, per-document rewrite, index again.
//!
//! ```text
//! index.read_all ─┐
//!                 ├─► merge_all ─► for each record:
//! list_documents ─┘                  export ─► unpack ─► describe? ─► rewrite ─► compose
//!                                    └─► posts/{date}-{slug}.html, assets/{prefix/}{id}-{file}
//!                                  ─► index.write_all
//! ```
//!
//! ## Failure Policy
//!
//! Grid access, listing and export are transport operations; a failure in
//! any of them aborts the run before the index is written. Everything that
//! goes wrong with a single exported document (a broken archive, markup that
//! does not parse, a file that cannot be written) is logged, recorded in the
//! [`RunSummary`], and the run moves on to the next document.
//!
//! Descriptions generated during the run are part of the records written back
//! to the index, so an operator sees them and can edit them.

use crate::config::{ConfigError, DescriptionMode, DocblogConfig};
use crate::describe::{DescriptionSupplier, ExcerptSupplier};
use crate::frontmatter::{FrontmatterError, FrontmatterFormat, compose};
use crate::grid::GridService;
use crate::index::{IndexError, IndexSettings, IndexStore, RowError, merge_all};
use crate::markup::{RewriteError, RewriteOptions, rewrite};
use crate::naming::{normalized_asset_path, post_file_name};
use crate::source::{DocumentSource, SourceError, list_documents, unpack_archive};
use crate::types::{EntryKind, ExportedBundle, MetadataRecord, RewrittenDocument};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Why one document produced no post.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] SourceError),
    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
    #[error("export contains no markup file")]
    NoMarkup,
}

/// Everything a run needs besides its two collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub folder_id: String,
    pub posts_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub skip_unpublished: bool,
    pub frontmatter_format: FrontmatterFormat,
    pub layout: Option<String>,
    pub index: IndexSettings,
    pub rewrite: RewriteOptions,
}

impl PipelineSettings {
    /// Settings for a build of the configured folder.
    pub fn from_config(config: &DocblogConfig) -> Result<Self, ConfigError> {
        let mut settings = Self::offline(config);
        settings.folder_id = config.require_folder()?.to_string();
        Ok(settings)
    }

    /// Settings that need no folder, for rewriting single files.
    pub fn offline(config: &DocblogConfig) -> Self {
        Self {
            folder_id: String::new(),
            posts_dir: PathBuf::from(&config.output.posts),
            assets_dir: PathBuf::from(&config.output.assets),
            skip_unpublished: config.output.skip_unpublished,
            frontmatter_format: config.frontmatter.format,
            layout: config.frontmatter.layout.clone(),
            index: IndexSettings {
                name: config.index.name.clone(),
                sheet_title: config.index.sheet_title.clone(),
            },
            rewrite: RewriteOptions {
                asset_prefix: config.output.assets_prefix.clone(),
                parallel_depth: config.rewrite.parallel_depth,
                redirect_prefix: config.rewrite.redirect_prefix.clone(),
            },
        }
    }
}

/// The description supplier selected by config, if any.
pub fn description_supplier(config: &DocblogConfig) -> Option<Box<dyn DescriptionSupplier>> {
    match config.description.mode {
        DescriptionMode::Excerpt => Some(Box::new(ExcerptSupplier {
            max_chars: config.description.max_chars,
        })),
        DescriptionMode::Disabled => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentStatus {
    Written {
        /// Post path relative to the posts directory.
        post: String,
        /// Asset paths relative to the assets directory.
        assets: Vec<String>,
        /// Archive entries that were neither markup nor an image.
        skipped: Vec<String>,
    },
    Unpublished,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub id: String,
    pub title: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub documents: Vec<DocumentOutcome>,
    pub index_errors: Vec<RowError>,
    /// Rows written back to the index.
    pub records_written: usize,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Written { .. }))
    }

    pub fn unpublished(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Unpublished))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&DocumentStatus) -> bool) -> usize {
        self.documents.iter().filter(|d| pred(&d.status)).count()
    }
}

/// Run a full build of `settings.folder_id`.
///
/// Outcomes are sent on `events` as each document finishes, for live
/// progress output; the same outcomes are returned in the summary.
pub fn run<S, G>(
    source: &S,
    grid: &G,
    describer: Option<&dyn DescriptionSupplier>,
    settings: &PipelineSettings,
    events: Option<Sender<DocumentOutcome>>,
) -> Result<RunSummary, PipelineError>
where
    S: DocumentSource + ?Sized,
    G: GridService + ?Sized,
{
    let store = IndexStore::open(grid, &settings.folder_id, &settings.index)?;
    let snapshot = store.read_all()?;
    for error in &snapshot.errors {
        warn!(row = error.row, doc_id = error.id.as_deref().unwrap_or(""), "index row: {}", error.kind);
    }

    let listing = list_documents(source, &settings.folder_id)?;
    info!(
        documents = listing.len(),
        index_records = snapshot.records.len(),
        "listed folder"
    );
    let mut records = merge_all(&listing, &snapshot.records);

    std::fs::create_dir_all(&settings.posts_dir)?;
    std::fs::create_dir_all(&settings.assets_dir)?;

    let mut summary = RunSummary {
        index_errors: snapshot.errors,
        ..Default::default()
    };

    for record in &mut records {
        let status = if settings.skip_unpublished && !record.published {
            debug!(doc_id = %record.id, "skipping unpublished document");
            DocumentStatus::Unpublished
        } else {
            let archive = source.export(&record.id)?;
            match process_document(record, &archive, describer, settings) {
                Ok(status) => status,
                Err(e) => {
                    warn!(doc_id = %record.id, error = %e, "document failed");
                    DocumentStatus::Failed(e.to_string())
                }
            }
        };

        let outcome = DocumentOutcome {
            id: record.id.clone(),
            title: record.title.clone(),
            status,
        };
        if let Some(tx) = &events {
            tx.send(outcome.clone()).ok();
        }
        summary.documents.push(outcome);
    }

    store.write_all(&records)?;
    summary.records_written = records.len();
    info!(
        written = summary.written(),
        failed = summary.failed(),
        "build finished"
    );
    Ok(summary)
}

/// Unpack, rewrite and write one exported document.
///
/// Fills an empty description on `record` when a supplier is given.
fn process_document(
    record: &mut MetadataRecord,
    archive: &[u8],
    describer: Option<&dyn DescriptionSupplier>,
    settings: &PipelineSettings,
) -> Result<DocumentStatus, DocumentError> {
    let bundle = unpack_archive(&record.id, archive)?;
    let markup = primary_markup(&bundle).ok_or(DocumentError::NoMarkup)?;

    if let Some(describer) = describer {
        fill_description(record, markup, describer);
    }

    let document = render(record, markup, settings)?;
    let post = post_file_name(&document.record);
    std::fs::write(settings.posts_dir.join(&post), &document.content)?;
    debug!(doc_id = %record.id, post = %post, "wrote post");

    let mut assets = Vec::new();
    let mut skipped = Vec::new();
    let mut markup_seen = false;
    for entry in &bundle.entries {
        match entry.kind() {
            EntryKind::Markup if !markup_seen => markup_seen = true,
            EntryKind::Asset => {
                let name =
                    normalized_asset_path(&settings.rewrite.asset_prefix, &record.id, &entry.name);
                let path = settings.assets_dir.join(&name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &entry.content)?;
                assets.push(name);
            }
            EntryKind::Markup | EntryKind::Unsupported => {
                warn!(doc_id = %record.id, entry = %entry.name, "skipping archive entry");
                skipped.push(entry.name.clone());
            }
        }
    }

    Ok(DocumentStatus::Written {
        post,
        assets,
        skipped,
    })
}

/// The first markup entry of a bundle; exports carry exactly one.
fn primary_markup(bundle: &ExportedBundle) -> Option<&[u8]> {
    bundle
        .entries
        .iter()
        .find(|e| e.kind() == EntryKind::Markup)
        .map(|e| e.content.as_slice())
}

fn fill_description(
    record: &mut MetadataRecord,
    markup: &[u8],
    describer: &dyn DescriptionSupplier,
) {
    if !record.description.trim().is_empty() {
        return;
    }
    match describer.describe(markup) {
        Ok(text) => record.description = text,
        Err(e) => debug!(doc_id = %record.id, error = %e, "no description generated"),
    }
}

/// Rewrite markup and prepend the record's frontmatter.
fn render(
    record: &MetadataRecord,
    markup: &[u8],
    settings: &PipelineSettings,
) -> Result<RewrittenDocument, DocumentError> {
    let rewritten = rewrite(&record.id, markup, &settings.rewrite)?;
    let content = compose(
        record,
        settings.layout.as_deref(),
        settings.frontmatter_format,
        &rewritten,
    )?;
    Ok(RewrittenDocument {
        record: record.clone(),
        content,
    })
}

/// Rewrite a single markup file without touching the folder or the index.
///
/// The file stem stands in for the document identifier and the title. With
/// `with_frontmatter`, the header is built from that record plus a generated
/// description.
pub fn rewrite_file(
    path: &Path,
    with_frontmatter: bool,
    describer: Option<&dyn DescriptionSupplier>,
    settings: &PipelineSettings,
) -> Result<Vec<u8>, DocumentError> {
    let markup = std::fs::read(path)?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !with_frontmatter {
        return Ok(rewrite(&id, &markup, &settings.rewrite)?);
    }

    let mut record = MetadataRecord::new(&id);
    record.title = id.clone();
    if let Some(describer) = describer {
        fill_description(&mut record, &markup, describer);
    }
    Ok(render(&record, &markup, settings)?.content)
}
