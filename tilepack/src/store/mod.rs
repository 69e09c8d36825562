//! On-disk tile artifact store.
//!
//! Tiles are stored as `{root}/{z}/{x}/{y}.png`. A tile's presence on disk is
//! the unit of "already done" state: the fetcher skips any coordinate whose
//! artifact exists, which is what makes an interrupted run resumable.
//!
//! Writes go to a `.part` temp file in the destination directory and are
//! renamed into place, so a crash mid-write can never leave a partial file
//! that a later run would mistake for a complete tile.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::coord::TileCoord;

/// Errors from persisting a tile artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create the tile's parent directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the temp file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move the temp file into place.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Filesystem store for downloaded tiles.
#[derive(Debug)]
pub struct TileStore {
    root: PathBuf,
    // Distinguishes temp files when duplicate coordinates race.
    temp_seq: AtomicU64,
}

impl TileStore {
    /// Creates a store rooted at `root`. The directory itself is created
    /// lazily when the first tile underneath it is written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_seq: AtomicU64::new(0),
        }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The artifact path for a tile, derived deterministically from its
    /// coordinate.
    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        self.root
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.png", tile.y))
    }

    /// True if the tile's artifact already exists.
    ///
    /// Existence alone marks the tile as satisfied; file contents are not
    /// inspected.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        self.tile_path(tile).exists()
    }

    /// Persists a tile's bytes atomically.
    ///
    /// Creates missing parent directories, writes to a uniquely named
    /// `.part` file, then renames it over the final path. An artifact that
    /// already exists is replaced with identical-by-contract content, so a
    /// race between duplicate coordinates is harmless.
    pub async fn write(&self, tile: &TileCoord, bytes: &[u8]) -> Result<(), StoreError> {
        let dest = self.tile_path(tile);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let temp = dest.with_extension(format!("png.part{}", seq));

        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: temp.clone(),
                source,
            })?;

        tokio::fs::rename(&temp, &dest)
            .await
            .map_err(|source| StoreError::Rename {
                from: temp,
                to: dest,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tile() -> TileCoord {
        TileCoord::new(11, 1604, 886)
    }

    #[test]
    fn test_tile_path_layout() {
        let store = TileStore::new("/data/tiles");
        let path = store.tile_path(&sample_tile());
        assert_eq!(path, PathBuf::from("/data/tiles/11/1604/886.png"));
    }

    #[test]
    fn test_contains_missing_tile() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileStore::new(dir.path());
        assert!(!store.contains(&sample_tile()));
    }

    #[tokio::test]
    async fn test_write_then_contains() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileStore::new(dir.path());
        let tile = sample_tile();

        store.write(&tile, b"png bytes").await.unwrap();

        assert!(store.contains(&tile));
        let on_disk = tokio::fs::read(store.tile_path(&tile)).await.unwrap();
        assert_eq!(on_disk, b"png bytes");
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileStore::new(dir.path().join("nested").join("tiles"));

        store.write(&sample_tile(), b"x").await.unwrap();

        assert!(store.contains(&sample_tile()));
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TileStore::new(dir.path());
        let tile = sample_tile();

        store.write(&tile, b"x").await.unwrap();

        let tile_dir = store.tile_path(&tile).parent().unwrap().to_path_buf();
        let mut entries = tokio::fs::read_dir(&tile_dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["886.png".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_tile() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(TileStore::new(dir.path()));
        let tile = sample_tile();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.write(&tile, b"same").await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let on_disk = tokio::fs::read(store.tile_path(&tile)).await.unwrap();
        assert_eq!(on_disk, b"same");
    }
}
