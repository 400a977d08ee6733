use std::collections::HashMap;

use axum::extract::Multipart;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::{
    contributions::{IntakeError, UploadPolicy, intake::UploadedObject},
    web::storage::MediaStore,
};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("malformed multipart body: {0}")]
    Malformed(String),
    #[error("unexpected file field `{0}`")]
    UnexpectedField(String),
    #[error("more than one file sent for `{0}`")]
    DuplicateField(String),
    #[error(transparent)]
    Rejected(#[from] IntakeError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl UploadError {
    pub fn flash_code(&self) -> String {
        match self {
            UploadError::Rejected(err) => err.flash_code(),
            UploadError::Storage(_) => "unknown".to_string(),
            _ => "upload_failed".to_string(),
        }
    }
}

/// Metadata describing a stored upload.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub field_name: String,
    pub original_name: String,
    pub key: String,
    pub content_type: String,
    pub size: u64,
}

impl SavedFile {
    pub fn to_object(&self) -> UploadedObject {
        UploadedObject {
            url: MediaStore::public_url(&self.key),
            content_type: self.content_type.clone(),
            size: self.size,
        }
    }
}

/// Aggregated output of the shared upload processor.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn first_file_for(&self, field_name: &str) -> Option<&SavedFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    pub fn object_for(&self, field_name: &str) -> Option<UploadedObject> {
        self.first_file_for(field_name).map(SavedFile::to_object)
    }

    pub fn text_values(&self, field_name: &str) -> Option<&[String]> {
        self.text_fields
            .get(field_name)
            .map(|values| values.as_slice())
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_values(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }

    /// Owned copy of a text field, empty when absent.
    pub fn text(&self, field_name: &str) -> String {
        self.first_text(field_name).unwrap_or_default().to_string()
    }

    /// Deletes every stored file, used when the submission is refused.
    pub async fn discard(&self, media: &MediaStore) {
        for file in &self.files {
            media.remove(&file.key).await;
        }
    }
}

/// Parses multipart form data, streaming each file into media storage under
/// the uploader's namespace. Type and size limits are enforced while the
/// body is read; on any error the files written so far are removed.
pub async fn process_upload_form(
    multipart: Multipart,
    media: &MediaStore,
    uploader: Uuid,
    policies: &[UploadPolicy],
) -> UploadResult<UploadOutcome> {
    let mut outcome = UploadOutcome::default();
    match read_fields(multipart, media, uploader, policies, &mut outcome).await {
        Ok(()) => Ok(outcome),
        Err(err) => {
            outcome.discard(media).await;
            Err(err)
        }
    }
}

async fn read_fields(
    mut multipart: Multipart,
    media: &MediaStore,
    uploader: Uuid,
    policies: &[UploadPolicy],
    outcome: &mut UploadOutcome,
) -> UploadResult<()> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Malformed(err.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|err| UploadError::Malformed(err.to_string()))?;
            outcome
                .text_fields
                .entry(field_name)
                .or_default()
                .push(value);
            continue;
        };

        // Browsers send an empty part for file inputs left blank.
        if file_name.is_empty() {
            while field
                .chunk()
                .await
                .map_err(|err| UploadError::Malformed(err.to_string()))?
                .is_some()
            {}
            continue;
        }

        let Some(policy) = policies.iter().find(|policy| policy.field == field_name) else {
            return Err(UploadError::UnexpectedField(field_name));
        };
        if outcome.first_file_for(policy.field).is_some() {
            return Err(UploadError::DuplicateField(field_name));
        }

        let content_type = normalize_content_type(field.content_type());
        if !policy.accepts_type(&content_type) {
            return Err(IntakeError::UnsupportedMediaType {
                field: policy.field,
                content_type,
            }
            .into());
        }

        let key = MediaStore::object_key(uploader, &file_name);
        let mut file = media.create(&key).await?;
        // Tracked before the first write so a failure below still cleans up.
        outcome.files.push(SavedFile {
            field_name: policy.field.to_string(),
            original_name: file_name,
            key,
            content_type,
            size: 0,
        });
        let Some(saved) = outcome.files.last_mut() else {
            continue;
        };

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::Malformed(err.to_string()))?
        {
            saved.size += chunk.len() as u64;
            if saved.size > policy.max_bytes {
                return Err(IntakeError::FileTooLarge {
                    field: policy.field,
                    max_bytes: policy.max_bytes,
                }
                .into());
            }
            file.write_all(&chunk)
                .await
                .map_err(|err| UploadError::Storage(err.into()))?;
        }
        file.flush()
            .await
            .map_err(|err| UploadError::Storage(err.into()))?;
        debug!(
            field = %saved.field_name,
            original = %saved.original_name,
            key = %saved.key,
            size = saved.size,
            "upload stored"
        );
    }

    Ok(())
}

fn normalize_content_type(raw: Option<&str>) -> String {
    raw.and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|parsed| parsed.essence_str().to_ascii_lowercase())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}
