//! Image staging.
//!
//! Copies source images into a per-invocation temp directory under unique names and
//! records their pixel size. The directory lives as long as the [`StagingSession`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::core::composition::PlanWarning;
use crate::core::fs::validate_local_input_path;
use crate::core::{CoreError, CoreResult, Size2D};

/// An image copied into the staging directory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedImage {
    /// Position in the request's image list
    pub source_index: usize,
    pub source: PathBuf,
    pub path: PathBuf,
    pub size: Size2D,
}

/// Staged images plus the directory that owns them; dropping it removes the files
#[derive(Debug)]
pub struct StagingSession {
    dir: TempDir,
    images: Vec<StagedImage>,
    warnings: Vec<PlanWarning>,
}

impl StagingSession {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn images(&self) -> &[StagedImage] {
        &self.images
    }

    /// One `SlideDropped` warning per unusable source, plus `SlideCountClamped`
    /// when the limit cut the list short
    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    /// Staged copy of `source`, if it was staged in this session
    pub fn staged_path(&self, source: &Path) -> Option<&Path> {
        self.images
            .iter()
            .find(|image| image.source == source)
            .map(|image| image.path.as_path())
    }
}

/// Stages source images for a render
#[derive(Clone, Debug, Default)]
pub struct ImageStager {
    root: Option<PathBuf>,
    limit: Option<usize>,
}

impl ImageStager {
    /// `root` is where session directories are created; the system temp dir if `None`
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root, limit: None }
    }

    /// Stops once `limit` images have staged; later sources are not read
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Stages every source, dropping the ones that cannot be used.
    ///
    /// Only failing to create the session directory is an error; an empty session
    /// is returned when no image survives.
    pub async fn stage(&self, sources: &[PathBuf]) -> CoreResult<StagingSession> {
        let root = self.root.clone();
        let limit = self.limit;
        let sources = sources.to_vec();
        tokio::task::spawn_blocking(move || stage_blocking(root.as_deref(), &sources, limit))
            .await
            .map_err(|e| CoreError::Internal(format!("staging task failed: {}", e)))?
    }
}

fn stage_blocking(
    root: Option<&Path>,
    sources: &[PathBuf],
    limit: Option<usize>,
) -> CoreResult<StagingSession> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("reelcast-");
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    debug!("Staging {} images in {}", sources.len(), dir.path().display());

    let mut images = Vec::new();
    let mut warnings = Vec::new();
    for (i, source) in sources.iter().enumerate() {
        if let Some(limit) = limit.filter(|l| images.len() >= *l) {
            warn!("Using the first {} usable of {} images", limit, sources.len());
            warnings.push(PlanWarning::SlideCountClamped {
                requested: sources.len(),
                kept: limit,
            });
            break;
        }
        match stage_one(dir.path(), i, source) {
            Ok(image) => images.push(image),
            Err(e) => {
                warn!("Dropping slide {}: {}", source.display(), e);
                warnings.push(PlanWarning::SlideDropped {
                    path: source.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!("Staged {}/{} images", images.len(), sources.len());
    Ok(StagingSession {
        dir,
        images,
        warnings,
    })
}

fn stage_one(dir: &Path, index: usize, source: &Path) -> CoreResult<StagedImage> {
    let source = validate_local_input_path(source, "image")
        .map_err(|reason| CoreError::invalid_media(source, reason))?;

    let (width, height) =
        image::image_dimensions(&source).map_err(|e| CoreError::invalid_media(&source, e))?;
    if width == 0 || height == 0 {
        return Err(CoreError::invalid_media(&source, "zero pixel dimension"));
    }

    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "img".to_string());
    let staged = dir.join(format!("slide_{}_{}.{}", index, uuid::Uuid::new_v4().simple(), ext));
    std::fs::copy(&source, &staged).map_err(|e| CoreError::invalid_media(&source, e))?;

    Ok(StagedImage {
        source_index: index,
        source,
        path: staged,
        size: Size2D::new(width, height),
    })
}
