pub mod intake;
pub mod moderation;
pub mod store;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quiz::Difficulty;

pub use intake::{ContributionDraft, IntakeError, UploadPolicy};
pub use moderation::{ModerationError, ReviewDecision};
pub use store::{ContributionStore, PgContributionStore, ReviewOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    General,
    Gallery,
    Audio,
    Quiz,
}

impl ContributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionKind::General => "general",
            ContributionKind::Gallery => "gallery",
            ContributionKind::Audio => "audio",
            ContributionKind::Quiz => "quiz",
        }
    }

    /// Whether approval creates a row in a published table.
    pub fn publishes(&self) -> bool {
        !matches!(self, ContributionKind::General)
    }
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Approved => "approved",
            ContributionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContributionStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ContributionStatus::Pending),
            "approved" => Ok(ContributionStatus::Approved),
            "rejected" => Ok(ContributionStatus::Rejected),
            other => Err(anyhow::anyhow!("unknown contribution status `{other}`")),
        }
    }
}

/// Stored form of a submission, one variant per kind. Serialized into the
/// `payload` column; the field names are what `approve_contribution` reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionPayload {
    General {
        title: String,
        description: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },
    Gallery {
        title: String,
        description: String,
        #[serde(default)]
        region: Option<String>,
        image_url: String,
    },
    Audio {
        title: String,
        performer: String,
        #[serde(default)]
        region: Option<String>,
        audio_url: String,
        #[serde(default)]
        cover_url: Option<String>,
    },
    Quiz {
        prompt: String,
        options: Vec<String>,
        correct_index: usize,
        explanation: String,
        category: String,
        difficulty: Difficulty,
    },
}

impl ContributionPayload {
    pub fn kind(&self) -> ContributionKind {
        match self {
            ContributionPayload::General { .. } => ContributionKind::General,
            ContributionPayload::Gallery { .. } => ContributionKind::Gallery,
            ContributionPayload::Audio { .. } => ContributionKind::Audio,
            ContributionPayload::Quiz { .. } => ContributionKind::Quiz,
        }
    }

    /// Short label for the moderation queue.
    pub fn headline(&self) -> &str {
        match self {
            ContributionPayload::General { title, .. }
            | ContributionPayload::Gallery { title, .. }
            | ContributionPayload::Audio { title, .. } => title,
            ContributionPayload::Quiz { prompt, .. } => prompt,
        }
    }

    /// Media objects referenced by this payload, as public URLs.
    pub fn media_urls(&self) -> Vec<&str> {
        match self {
            ContributionPayload::Gallery { image_url, .. } => vec![image_url.as_str()],
            ContributionPayload::Audio {
                audio_url,
                cover_url,
                ..
            } => std::iter::once(audio_url.as_str())
                .chain(cover_url.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingContribution {
    pub id: Uuid,
    pub payload: ContributionPayload,
    pub contributor_id: Option<Uuid>,
    pub contributor_name: Option<String>,
    pub status: ContributionStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingContribution {
    pub fn kind(&self) -> ContributionKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_carries_the_fields_the_approval_function_reads() {
        let payload = ContributionPayload::Audio {
            title: "Gending Sriwijaya".into(),
            performer: "Palembang ensemble".into(),
            region: Some("sumatra".into()),
            audio_url: "/media/u/1_track.mp3".into(),
            cover_url: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "audio");
        assert_eq!(value["performer"], "Palembang ensemble");
        assert_eq!(value["region"], "sumatra");
        assert_eq!(value["audio_url"], "/media/u/1_track.mp3");

        let back: ContributionPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), ContributionKind::Audio);
        assert_eq!(back.media_urls(), vec!["/media/u/1_track.mp3"]);
    }

    #[test]
    fn quiz_payload_stores_lowercase_difficulty() {
        let payload = ContributionPayload::Quiz {
            prompt: "Which instrument leads a gamelan?".into(),
            options: vec!["Kendang".into(), "Sasando".into(), "Angklung".into(), "Tifa".into()],
            correct_index: 0,
            explanation: "The kendang drummer sets tempo.".into(),
            category: "music".into(),
            difficulty: Difficulty::Hard,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["difficulty"], "hard");
        assert_eq!(value["correct_index"], 0);
        assert!(payload.kind().publishes());
        assert!(payload.media_urls().is_empty());
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(
            "rejected".parse::<ContributionStatus>().unwrap(),
            ContributionStatus::Rejected
        );
        assert!("archived".parse::<ContributionStatus>().is_err());
    }
}
