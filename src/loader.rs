//! Filesystem document loader.
//!
//! Walks a directory (or takes a single file), applies the include and
//! exclude globs from `[ingest]` and turns each match into a [`Document`].
//! Text files are read as UTF-8. Images are captioned by the generative
//! model when one is configured and skipped otherwise.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::ingest::caption_image;
use crate::models::{ContentType, Document};
use crate::traits::GenerativeModel;

/// Documents found under a path, plus the files that could not be used.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<Document>,
    pub skipped: Vec<String>,
}

pub async fn load_path(
    root: &Path,
    config: &IngestConfig,
    captioner: Option<&dyn GenerativeModel>,
    caption_timeout: Duration,
) -> Result<LoadedDocuments> {
    if !root.exists() {
        bail!("Ingest path does not exist: {}", root.display());
    }

    let mut loaded = LoadedDocuments::default();

    for (path, relative) in matching_files(root, config)? {
        let Some(media_type) = media_type_for(&path) else {
            tracing::debug!(path = %relative, "no known media type, skipping");
            loaded.skipped.push(relative);
            continue;
        };

        match ContentType::from_media_type(media_type) {
            ContentType::Text => match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let mut doc = Document::text(relative.clone(), content);
                    doc.media_type = media_type.to_string();
                    add_file_metadata(&mut doc, &path);
                    loaded.documents.push(doc);
                }
                Err(e) => {
                    tracing::warn!(path = %relative, error = %e, "could not read text file");
                    loaded.skipped.push(relative);
                }
            },
            ContentType::Image => {
                let Some(model) = captioner else {
                    tracing::warn!(path = %relative, "no generative model configured, skipping image");
                    loaded.skipped.push(relative);
                    continue;
                };
                match load_image(model, &path, &relative, media_type, caption_timeout).await {
                    Some(doc) => loaded.documents.push(doc),
                    None => loaded.skipped.push(relative),
                }
            }
        }
    }

    tracing::info!(
        documents = loaded.documents.len(),
        skipped = loaded.skipped.len(),
        root = %root.display(),
        "loaded documents"
    );
    Ok(loaded)
}

/// Read and caption one image. `None` means the image was skipped.
async fn load_image(
    model: &dyn GenerativeModel,
    path: &Path,
    relative: &str,
    media_type: &str,
    caption_timeout: Duration,
) -> Option<Document> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %relative, error = %e, "could not read image file");
            return None;
        }
    };
    match caption_image(model, relative, &bytes, media_type, caption_timeout).await {
        Ok(mut doc) => {
            add_file_metadata(&mut doc, path);
            Some(doc)
        }
        Err(e) => {
            tracing::warn!(path = %relative, error = %e, "image captioning failed");
            None
        }
    }
}

/// Files under `root` passing the globs, sorted by relative path.
fn matching_files(root: &Path, config: &IngestConfig) -> Result<Vec<(std::path::PathBuf, String)>> {
    if root.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());
        return Ok(vec![(root.to_path_buf(), name)]);
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push((path.to_path_buf(), rel_str));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

pub(crate) fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => Some("text/markdown"),
        "txt" | "text" | "rst" | "csv" | "log" => Some("text/plain"),
        "json" => Some("application/json"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn add_file_metadata(doc: &mut Document, path: &Path) {
    doc.metadata
        .insert("path".to_string(), path.display().to_string().into());
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    if let Some(modified) = modified {
        doc.metadata
            .insert("modified".to_string(), modified.to_rfc3339().into());
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
