use thiserror::Error;
use uuid::Uuid;

use super::{ContributionKind, ContributionPayload, ContributionStore};
use crate::quiz::{Difficulty, OPTION_COUNT};

pub const LOGIN_REDIRECT: &str = "/login?status=login_required";

const MIB: u64 = 1024 * 1024;

/// Size and type limits for one multipart file field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub field: &'static str,
    pub mime_prefix: &'static str,
    pub max_bytes: u64,
}

impl UploadPolicy {
    pub const GALLERY_IMAGE: UploadPolicy = UploadPolicy {
        field: "image",
        mime_prefix: "image/",
        max_bytes: 5 * MIB,
    };
    pub const AUDIO_TRACK: UploadPolicy = UploadPolicy {
        field: "audio",
        mime_prefix: "audio/",
        max_bytes: 20 * MIB,
    };
    pub const AUDIO_COVER: UploadPolicy = UploadPolicy {
        field: "cover",
        mime_prefix: "image/",
        max_bytes: 5 * MIB,
    };
    pub const CULTURE_IMAGE: UploadPolicy = UploadPolicy {
        field: "image",
        mime_prefix: "image/",
        max_bytes: 10 * MIB,
    };

    pub fn accepts_type(&self, content_type: &str) -> bool {
        content_type
            .to_ascii_lowercase()
            .starts_with(self.mime_prefix)
    }

    pub fn check(&self, content_type: &str, size: u64) -> Result<(), IntakeError> {
        if !self.accepts_type(content_type) {
            return Err(IntakeError::UnsupportedMediaType {
                field: self.field,
                content_type: content_type.to_string(),
            });
        }
        if size > self.max_bytes {
            return Err(IntakeError::FileTooLarge {
                field: self.field,
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// A file already written to media storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub url: String,
    pub content_type: String,
    pub size: u64,
}

/// Submission form state, one variant per contribution kind.
#[derive(Debug, Clone)]
pub enum ContributionDraft {
    General {
        title: String,
        description: String,
        region: Option<String>,
        category: Option<String>,
    },
    Gallery {
        title: String,
        description: String,
        region: Option<String>,
        image: Option<UploadedObject>,
    },
    Audio {
        title: String,
        performer: String,
        region: Option<String>,
        audio: Option<UploadedObject>,
        cover: Option<UploadedObject>,
    },
    Quiz {
        prompt: String,
        options: Vec<String>,
        correct_index: Option<usize>,
        explanation: String,
        category: String,
        difficulty: String,
    },
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("login required")]
    LoginRequired,
    #[error("unknown contribution kind `{0}`")]
    UnknownKind(String),
    #[error("field `{0}` is required")]
    MissingField(&'static str),
    #[error("field `{0}` is invalid")]
    InvalidField(&'static str),
    #[error("`{field}` exceeds {max_bytes} bytes")]
    FileTooLarge { field: &'static str, max_bytes: u64 },
    #[error("`{field}` does not accept `{content_type}`")]
    UnsupportedMediaType {
        field: &'static str,
        content_type: String,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl IntakeError {
    /// Query-string code rendered as a flash message on the contribute page.
    pub fn flash_code(&self) -> String {
        match self {
            IntakeError::LoginRequired => "login_required".to_string(),
            IntakeError::UnknownKind(_) => "unknown_kind".to_string(),
            IntakeError::MissingField(field) => format!("missing_{field}"),
            IntakeError::InvalidField(field) => format!("invalid_{field}"),
            IntakeError::FileTooLarge { field, .. } => format!("too_large_{field}"),
            IntakeError::UnsupportedMediaType { field, .. } => format!("bad_type_{field}"),
            IntakeError::Backend(_) => "unknown".to_string(),
        }
    }
}

impl ContributionDraft {
    pub fn kind(&self) -> ContributionKind {
        match self {
            ContributionDraft::General { .. } => ContributionKind::General,
            ContributionDraft::Gallery { .. } => ContributionKind::Gallery,
            ContributionDraft::Audio { .. } => ContributionKind::Audio,
            ContributionDraft::Quiz { .. } => ContributionKind::Quiz,
        }
    }

    /// Files attached to the draft, so a rejected submission can clean up.
    pub fn uploads(&self) -> Vec<&UploadedObject> {
        match self {
            ContributionDraft::Gallery { image, .. } => image.iter().collect(),
            ContributionDraft::Audio { audio, cover, .. } => audio.iter().chain(cover.iter()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn validate(self) -> Result<ContributionPayload, IntakeError> {
        match self {
            ContributionDraft::General {
                title,
                description,
                region,
                category,
            } => Ok(ContributionPayload::General {
                title: required(title, "title")?,
                description: required(description, "description")?,
                region: normalize_region(region),
                category: optional(category),
            }),
            ContributionDraft::Gallery {
                title,
                description,
                region,
                image,
            } => {
                let title = required(title, "title")?;
                let description = required(description, "description")?;
                let image = image.ok_or(IntakeError::MissingField("image"))?;
                UploadPolicy::GALLERY_IMAGE.check(&image.content_type, image.size)?;
                Ok(ContributionPayload::Gallery {
                    title,
                    description,
                    region: normalize_region(region),
                    image_url: image.url,
                })
            }
            ContributionDraft::Audio {
                title,
                performer,
                region,
                audio,
                cover,
            } => {
                let title = required(title, "title")?;
                let performer = required(performer, "performer")?;
                let audio = audio.ok_or(IntakeError::MissingField("audio"))?;
                UploadPolicy::AUDIO_TRACK.check(&audio.content_type, audio.size)?;
                if let Some(cover) = &cover {
                    UploadPolicy::AUDIO_COVER.check(&cover.content_type, cover.size)?;
                }
                Ok(ContributionPayload::Audio {
                    title,
                    performer,
                    region: normalize_region(region),
                    audio_url: audio.url,
                    cover_url: cover.map(|cover| cover.url),
                })
            }
            ContributionDraft::Quiz {
                prompt,
                options,
                correct_index,
                explanation,
                category,
                difficulty,
            } => {
                let prompt = required(prompt, "prompt")?;
                if options.len() != OPTION_COUNT {
                    return Err(IntakeError::InvalidField("options"));
                }
                let options = options
                    .into_iter()
                    .map(|option| required(option, "options"))
                    .collect::<Result<Vec<_>, _>>()?;
                let correct_index = correct_index
                    .filter(|index| *index < OPTION_COUNT)
                    .ok_or(IntakeError::InvalidField("correct_index"))?;
                let difficulty: Difficulty = difficulty
                    .parse()
                    .map_err(|_| IntakeError::InvalidField("difficulty"))?;
                Ok(ContributionPayload::Quiz {
                    prompt,
                    options,
                    correct_index,
                    explanation: required(explanation, "explanation")?,
                    category: required(category, "category")?.to_ascii_lowercase(),
                    difficulty,
                })
            }
        }
    }
}

/// Validates the draft and writes a pending record for `contributor`.
///
/// An anonymous caller is refused before anything is validated or written.
pub async fn submit<S: ContributionStore>(
    store: &S,
    contributor: Option<Uuid>,
    draft: ContributionDraft,
) -> Result<Uuid, IntakeError> {
    let contributor = contributor.ok_or(IntakeError::LoginRequired)?;
    let payload = draft.validate()?;
    let id = store.insert_pending(contributor, &payload).await?;
    Ok(id)
}

fn required(value: String, field: &'static str) -> Result<String, IntakeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IntakeError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_region(region: Option<String>) -> Option<String> {
    optional(region).map(|slug| slug.to_ascii_lowercase())
}
