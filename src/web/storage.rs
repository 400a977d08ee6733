use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::fs::File;
use tracing::{error, warn};
use uuid::Uuid;

use crate::web::AppState;

pub const MEDIA_URL_PREFIX: &str = "/media/";

/// Object storage on the local filesystem. Keys look like
/// `{uploader_id}/{timestamp}_{name}` and are public under `/media/`.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to ensure media root at {}", self.root.display()))
    }

    pub fn object_key(uploader: Uuid, original_name: &str) -> String {
        let mut name = sanitize_filename::sanitize(original_name).replace(' ', "_");
        if name.is_empty() {
            name = "upload.bin".to_string();
        }
        format!("{uploader}/{}_{name}", Utc::now().timestamp_millis())
    }

    pub fn public_url(key: &str) -> String {
        format!("{MEDIA_URL_PREFIX}{key}")
    }

    pub fn key_from_url(url: &str) -> Option<&str> {
        url.strip_prefix(MEDIA_URL_PREFIX)
    }

    /// Filesystem path for a key, or `None` if the key escapes the root.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub async fn create(&self, key: &str) -> Result<File> {
        let path = self
            .path_for(key)
            .with_context(|| format!("invalid object key {key}"))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        File::create(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))
    }

    /// Best-effort removal; a missing object is not an error.
    pub async fn remove(&self, key: &str) {
        let Some(path) = self.path_for(key) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(?err, file = %path.display(), "failed to remove media object"),
        }
    }

    pub async fn remove_url(&self, url: &str) {
        if let Some(key) = Self::key_from_url(url) {
            self.remove(key).await;
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

pub async fn serve_media(
    State(state): State<AppState>,
    UrlPath(key): UrlPath<String>,
) -> Result<Response, StatusCode> {
    let path = state.media().path_for(&key).ok_or(StatusCode::NOT_FOUND)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatusCode::NOT_FOUND);
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read media object");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&path))),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            ),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[test]
    fn keys_are_namespaced_by_uploader() {
        let uploader = Uuid::new_v4();
        let key = MediaStore::object_key(uploader, "../Tari Kecak.jpg");
        let (owner, name) = key.split_once('/').unwrap();
        assert_eq!(owner, uploader.to_string());
        let (timestamp, file) = name.split_once('_').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        assert!(!file.contains('/'));
        assert!(file.ends_with("Kecak.jpg"));
        assert_eq!(MediaStore::key_from_url(&MediaStore::public_url(&key)), Some(key.as_str()));
    }

    #[test]
    fn traversal_keys_are_refused() {
        let store = MediaStore::new("/srv/media");
        assert!(store.path_for("../etc/passwd").is_none());
        assert!(store.path_for("/etc/passwd").is_none());
        assert!(store.path_for("a/./b.jpg").is_some());
        assert!(store.path_for("").is_none());
        assert_eq!(
            store.path_for("u/1_a.jpg").unwrap(),
            PathBuf::from("/srv/media/u/1_a.jpg")
        );
    }

    #[tokio::test]
    async fn create_and_remove_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let key = MediaStore::object_key(Uuid::new_v4(), "gong.mp3");

        let mut file = store.create(&key).await.unwrap();
        file.write_all(b"ID3").await.unwrap();
        file.flush().await.unwrap();
        let path = store.path_for(&key).unwrap();
        assert!(path.exists());
        assert_eq!(content_type_for(&path), "audio/mpeg");

        store.remove_url(&MediaStore::public_url(&key)).await;
        assert!(!path.exists());
        store.remove(&key).await;
    }
}
