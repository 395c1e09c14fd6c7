//! World Persistence
//!
//! Saves and loads the full [`World`] aggregate as a self-describing JSON
//! document. Writes go to a temporary file first and are renamed into
//! place, so a crash mid-write can never leave a truncated save behind.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::game::world::World;

/// Save format version, bumped on incompatible layout changes.
pub const SAVE_VERSION: u32 = 1;

/// The on-disk document wrapping a world.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedWorld {
    /// Save format version.
    pub version: u32,
    /// When the save was written.
    pub saved_at: DateTime<Utc>,
    /// The world itself.
    pub world: World,
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The save was written by an incompatible version.
    #[error("unsupported save version {0} (expected {SAVE_VERSION})")]
    UnsupportedVersion(u32),
}

/// Save a world to `path`, swapping the file in atomically on success.
pub fn save_world(world: &World, path: &Path) -> Result<(), StoreError> {
    let document = SavedWorld {
        version: SAVE_VERSION,
        saved_at: Utc::now(),
        world: world.clone(),
    };
    let json = serde_json::to_string(&document)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), tiles = world.tiles.len(), "world saved");
    Ok(())
}

/// Load a world from `path`. Returns `Ok(None)` when no save exists;
/// any other failure is an error so a corrupt save is never silently
/// replaced by a fresh world.
pub fn load_world(path: &Path) -> Result<Option<World>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let document: SavedWorld = serde_json::from_str(&json)?;
    if document.version != SAVE_VERSION {
        return Err(StoreError::UnsupportedVersion(document.version));
    }

    info!(
        path = %path.display(),
        saved_at = %document.saved_at,
        "world loaded"
    );
    Ok(Some(document.world))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::worldgen::{generate, GenConfig};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hexhold-store-test-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = temp_path("roundtrip");
        let world = generate(&GenConfig {
            seed: "persist".into(),
            radius: 3,
            ..Default::default()
        });

        save_world(&world, &path).unwrap();
        let loaded = load_world(&path).unwrap().unwrap();

        assert_eq!(loaded.seed, world.seed);
        assert_eq!(loaded.tiles.len(), world.tiles.len());
        for (hex, tile) in &world.tiles {
            assert_eq!(loaded.tiles[hex].biome, tile.biome);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_save_is_none() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        assert!(load_world(&path).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_save_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_world(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let path = temp_path("version");
        let world = generate(&GenConfig {
            seed: "persist".into(),
            radius: 1,
            ..Default::default()
        });
        let document = SavedWorld {
            version: SAVE_VERSION + 1,
            saved_at: Utc::now(),
            world,
        };
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        assert!(matches!(
            load_world(&path),
            Err(StoreError::UnsupportedVersion(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
