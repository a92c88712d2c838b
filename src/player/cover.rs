//! Cover artwork storage.
//!
//! Extensions may push artwork as a binary WebSocket message or as a
//! `data:image/...;base64,` value in `COVER`. Either way the image is decoded,
//! re-encoded as PNG and written to `wnp-cover-<id>.png` in the configured
//! directory. The player's `cover` then points at the file.
//!
//! # Example
//!
//! ```ignore
//! let store = CoverStore::new(std::env::temp_dir());
//! let url = store.store_bytes(player_id, &png_bytes)?;
//! assert!(url.starts_with("file://"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::io::{Cursor, Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::identifiers::PlayerId;

// ============================================================================
// Constants
// ============================================================================

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

// ============================================================================
// CoverStore
// ============================================================================

/// Writes per-player cover files into one directory.
#[derive(Debug, Clone)]
pub struct CoverStore {
    dir: PathBuf,
}

impl CoverStore {
    /// Creates a store rooted at `dir`.
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory covers are written to.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cover path for a player.
    #[must_use]
    pub fn path_for(&self, id: PlayerId) -> PathBuf {
        self.dir.join(format!("wnp-cover-{id}.png"))
    }

    /// Decodes raw image bytes and stores them as PNG.
    ///
    /// Returns the `file://` URL of the written file.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Image`] if the bytes are not a supported image
    /// - [`crate::Error::Io`] if the file cannot be written
    pub fn store_bytes(&self, id: PlayerId, bytes: &[u8]) -> Result<String> {
        let image = image::load_from_memory(bytes)?;

        let mut output = Cursor::new(Vec::new());
        image.write_to(&mut output, image::ImageFormat::Png)?;

        let path = self.path_for(id);
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, output.into_inner())?;

        debug!(player_id = %id, path = %path.display(), "Cover stored");
        file_url(&path)
    }

    /// Stores a `data:image/...;base64,` cover value.
    ///
    /// Returns `Ok(None)` when `value` is not an inline image, leaving it for
    /// the caller to keep as-is.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Base64`] if the payload is not valid base64
    /// - Any error of [`CoverStore::store_bytes`]
    pub fn store_data_url(&self, id: PlayerId, value: &str) -> Result<Option<String>> {
        let Some(encoded) = inline_payload(value) else {
            return Ok(None);
        };

        let bytes = Base64Standard.decode(encoded.trim())?;
        self.store_bytes(id, &bytes).map(Some)
    }

    /// Removes a player's cover file, if any.
    pub fn remove(&self, id: PlayerId) {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(player_id = %id, "Cover removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(player_id = %id, error = %e, "Failed to remove cover"),
        }
    }
}

impl Default for CoverStore {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

/// Returns the base64 part of an inline image URL.
fn inline_payload(value: &str) -> Option<&str> {
    let rest = value.strip_prefix(DATA_URL_PREFIX)?;
    let (_, encoded) = rest.split_once(BASE64_MARKER)?;
    Some(encoded)
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("cannot express {} as a file URL", absolute.display()),
            )
            .into()
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    fn tiny_png() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
        let mut output = Cursor::new(Vec::new());
        image
            .write_to(&mut output, image::ImageFormat::Png)
            .expect("encode png");
        output.into_inner()
    }

    #[test]
    fn test_store_bytes_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CoverStore::new(dir.path());
        let id = PlayerId::next();

        let url = store.store_bytes(id, &tiny_png()).expect("store");
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(&format!("wnp-cover-{id}.png")));
        assert!(store.path_for(id).exists());

        store.remove(id);
        assert!(!store.path_for(id).exists());
    }

    #[test]
    fn test_store_data_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CoverStore::new(dir.path());
        let id = PlayerId::next();

        let value = format!("data:image/png;base64,{}", Base64Standard.encode(tiny_png()));
        let url = store.store_data_url(id, &value).expect("store");
        assert!(url.is_some());
    }

    #[test]
    fn test_plain_url_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CoverStore::new(dir.path());

        let result = store
            .store_data_url(PlayerId::next(), "https://i.ytimg.com/vi/x/hq.jpg")
            .expect("store");
        assert_eq!(result, None);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CoverStore::new(dir.path());

        let err = store
            .store_bytes(PlayerId::next(), b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_remove_missing_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir");
        CoverStore::new(dir.path()).remove(PlayerId::next());
    }
}
