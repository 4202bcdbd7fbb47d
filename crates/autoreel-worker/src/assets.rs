//! Background video selection.

use rand::seq::IndexedRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use autoreel_models::BackgroundAsset;

use crate::error::WorkerResult;

/// The input directory of background clips.
///
/// Scanned again on every pick, so files added or removed while a batch
/// runs are seen by the next iteration.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    dir: PathBuf,
}

impl AssetLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All supported videos in the directory, sorted by path.
    ///
    /// A missing directory is an empty library.
    pub fn scan(&self) -> WorkerResult<Vec<BackgroundAsset>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assets = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(asset) = BackgroundAsset::from_path(&path) {
                assets.push(asset);
            }
        }
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(assets)
    }

    /// Pick one asset uniformly at random; `None` when there is none.
    pub fn pick_random(&self) -> Option<BackgroundAsset> {
        let assets = match self.scan() {
            Ok(assets) => assets,
            Err(e) => {
                warn!("Failed to scan {}: {}", self.dir.display(), e);
                return None;
            }
        };
        let picked = assets.choose(&mut rand::rng()).cloned();
        if let Some(asset) = &picked {
            debug!("Picked background {} of {}", asset.path.display(), assets.len());
        }
        picked
    }
}
