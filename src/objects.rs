//! Raw HTML blob store.
//!
//! Fetched pages are archived to disk for audit and debugging. File names
//! combine the publication id, a slug of the article title, and a random
//! suffix, so repeated snapshots of the same article never collide.
//!
//! Archival is strictly best-effort: a failed write is logged and the
//! snapshot is recorded without a raw-HTML reference.

use std::path::PathBuf;

use rand::Rng;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::HarvestError;

/// Longest title-slug portion of an archive file name.
const MAX_SLUG_LEN: usize = 80;

/// Disk-backed store for raw fetched HTML.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base: PathBuf,
}

impl BlobStore {
    /// Open (and create if needed) the blob directory.
    pub async fn open(dir: &str) -> Result<Self, HarvestError> {
        fs::create_dir_all(dir).await?;
        Ok(Self {
            base: PathBuf::from(dir),
        })
    }

    /// Archive one page's raw HTML, returning a stable reference string.
    ///
    /// Returns `None` when the write fails; the caller records the snapshot
    /// without a reference rather than failing the link.
    pub async fn save_raw_html(&self, pub_id: &str, slug: &str, html: &str) -> Option<String> {
        let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
        let suffix: u128 = rand::rng().random();
        let path = self.base.join(format!("{pub_id}-{slug}-{suffix:032x}.html"));

        match fs::write(&path, html).await {
            Ok(()) => {
                let reference = path.to_string_lossy().into_owned();
                debug!(bytes = html.len(), path = %reference, "Archived raw HTML");
                Some(reference)
            }
            Err(e) => {
                warn!(%pub_id, %slug, error = %e, "Failed to archive raw HTML");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_returns_readable_reference() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path().to_str().unwrap()).await.unwrap();

        let reference = blobs
            .save_raw_html("example-times", "some-story", "<html>hi</html>")
            .await
            .expect("write should succeed");

        assert!(reference.contains("example-times-some-story-"));
        let body = std::fs::read_to_string(&reference).unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_repeated_saves_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path().to_str().unwrap()).await.unwrap();

        let a = blobs.save_raw_html("p", "slug", "one").await.unwrap();
        let b = blobs.save_raw_html("p", "slug", "two").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_long_slug_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path().to_str().unwrap()).await.unwrap();

        let slug = "x".repeat(500);
        let reference = blobs.save_raw_html("p", &slug, "body").await.unwrap();
        assert!(reference.contains(&"x".repeat(80)));
        assert!(!reference.contains(&"x".repeat(81)));
    }
}
