use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::AppError;

pub const METADATA_EXTENSION: &str = "txt";
pub const IMAGE_EXTENSION: &str = "png";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidecarPair {
    pub metadata: PathBuf,
    pub image: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pairing {
    Paired(SidecarPair),
    MissingImage {
        metadata: PathBuf,
        expected_image: PathBuf,
    },
}

/// All `*.txt` files below `root`, in walk order.
pub fn metadata_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let is_metadata = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(METADATA_EXTENSION))
                == Some(true);
        if is_metadata {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn sibling_image(metadata: &Path) -> PathBuf {
    metadata.with_extension(IMAGE_EXTENSION)
}

/// Pairs each metadata file with its sibling image. `image_exists` is the only
/// filesystem access, so callers can substitute it.
pub fn pair_sidecars<I, F>(metadata: I, image_exists: F) -> impl Iterator<Item = Pairing>
where
    I: IntoIterator<Item = PathBuf>,
    F: Fn(&Path) -> bool,
{
    metadata.into_iter().map(move |path| {
        let image = sibling_image(&path);
        if image_exists(&image) {
            Pairing::Paired(SidecarPair {
                metadata: path,
                image,
            })
        } else {
            Pairing::MissingImage {
                metadata: path,
                expected_image: image,
            }
        }
    })
}

pub fn collect_pairs(root: &Path) -> Result<Vec<SidecarPair>, AppError> {
    let files = metadata_files(root)?;
    debug!(count = files.len(), root = %root.display(), "found metadata files");

    let mut pairs = Vec::with_capacity(files.len());
    for pairing in pair_sidecars(files, |p| p.is_file()) {
        match pairing {
            Pairing::Paired(pair) => pairs.push(pair),
            Pairing::MissingImage { expected_image, .. } => {
                warn!("No png found {}", expected_image.display());
            }
        }
    }
    Ok(pairs)
}
