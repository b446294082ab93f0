use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::info;

pub mod logging;
pub mod metadata;
pub mod models;
pub mod record;
pub mod render;
pub mod scan;

pub use metadata::{parse_metadata, Fields, ParseError, ParsedMetadata};
pub use models::{ModelEntry, ModelTable};
pub use record::{load_record, sort_records, Record};
pub use render::{render_booklet, write_booklet, BookletOptions};
pub use scan::{collect_pairs, pair_sidecars, Pairing, SidecarPair};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{}: {source}", path.display())]
    Metadata { path: PathBuf, source: ParseError },
    #[error("{}: no 'Model hash' in parameter line", path.display())]
    MissingModelHash { path: PathBuf },
    #[error("{}: unknown model hash {hash}", path.display())]
    UnknownModelHash { path: PathBuf, hash: String },
    #[error("Invalid data: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub root: PathBuf,
    pub output_file: String,
    pub models: ModelTable,
    pub booklet: BookletOptions,
    pub progress: bool,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_file: render::DEFAULT_OUTPUT_FILE.to_string(),
            models: ModelTable::builtin(),
            booklet: BookletOptions::default(),
            progress: false,
        }
    }
}

/// Builds the booklet and returns the path of the written file.
/// Nothing is written unless every sidecar loads.
pub fn run(config: &Config) -> Result<PathBuf, AppError> {
    let root = config.root.as_path();
    let pairs = collect_pairs(root)?;
    info!(count = pairs.len(), root = %root.display(), "collected image sidecars");

    let bar = progress_bar(config.progress, pairs.len() as u64, root);
    if let Some(ref b) = bar {
        b.set_message("reading");
    }
    let mut records = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        records.push(load_record(pair, root, &config.models)?);
        if let Some(ref b) = bar {
            b.inc(1);
        }
    }

    sort_records(&mut records, &config.models);

    if let Some(ref b) = bar {
        b.set_message("rendering");
    }
    let html = render_booklet(&records, &config.models, &config.booklet, bar.as_ref());
    let path = write_booklet(root, &config.output_file, &html)?;

    if let Some(b) = bar {
        b.set_message("done");
        b.finish_and_clear();
    }
    info!(records = records.len(), path = %path.display(), "wrote booklet");
    Ok(path)
}

fn progress_bar(enabled: bool, records: u64, root: &Path) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    // 読み込みと描画で 2 周する
    let b = ProgressBar::new(records.saturating_mul(2));
    let style = ProgressStyle::with_template("{prefix} [{wide_bar}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    b.set_style(style);
    let name = root
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());
    b.set_prefix(name);
    Some(b)
}
