use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::{ContributionStatus, ContributionStore, PendingContribution, ReviewOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target(&self) -> ContributionStatus {
        match self {
            ReviewDecision::Approve => ContributionStatus::Approved,
            ReviewDecision::Reject => ContributionStatus::Rejected,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("contribution not found")]
    NotFound,
    #[error("contribution was already {0}")]
    AlreadyReviewed(ContributionStatus),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl ModerationError {
    pub fn flash_code(&self) -> &'static str {
        match self {
            ModerationError::NotFound => "contribution_missing",
            ModerationError::AlreadyReviewed(_) => "already_reviewed",
            ModerationError::Backend(_) => "unknown",
        }
    }
}

/// Moves a pending contribution to approved or rejected.
///
/// Approval publishes and flips the status in one store call, so an error
/// leaves the record pending with nothing published. Returns the id of the
/// published row when one was created.
pub async fn set_status<S: ContributionStore>(
    store: &S,
    id: Uuid,
    decision: ReviewDecision,
    moderator: Uuid,
) -> Result<Option<Uuid>, ModerationError> {
    let outcome = match decision {
        ReviewDecision::Approve => store.approve(id, moderator).await,
        ReviewDecision::Reject => store.reject(id, moderator).await,
    }
    .inspect_err(|err| error!(?err, %id, ?decision, "failed to review contribution"))?;

    match outcome {
        ReviewOutcome::Applied { published_id } => {
            info!(%id, status = %decision.target(), ?published_id, "contribution reviewed");
            Ok(published_id)
        }
        ReviewOutcome::NotFound => Err(ModerationError::NotFound),
        ReviewOutcome::AlreadyReviewed(status) => Err(ModerationError::AlreadyReviewed(status)),
    }
}

/// Removes a contribution whatever its status. A missing id is reported as
/// `NotFound` and changes nothing.
pub async fn delete<S: ContributionStore>(store: &S, id: Uuid) -> Result<(), ModerationError> {
    let removed = store
        .delete(id)
        .await
        .inspect_err(|err| error!(?err, %id, "failed to delete contribution"))?;
    if removed {
        info!(%id, "contribution deleted");
        Ok(())
    } else {
        Err(ModerationError::NotFound)
    }
}

pub async fn list<S: ContributionStore>(
    store: &S,
    filter: Option<ContributionStatus>,
) -> Result<Vec<PendingContribution>, ModerationError> {
    store
        .list(filter)
        .await
        .inspect_err(|err| error!(?err, "failed to list contributions"))
        .map_err(ModerationError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contributions::{ContributionKind, ContributionPayload, store::memory::MemoryContributionStore},
        quiz::Difficulty,
    };

    fn gallery() -> ContributionPayload {
        ContributionPayload::Gallery {
            title: "Tongkonan at dusk".into(),
            description: "Toraja ancestral house".into(),
            region: Some("sulawesi".into()),
            image_url: "/media/u/1_tongkonan.jpg".into(),
        }
    }

    async fn seeded(payload: ContributionPayload) -> (MemoryContributionStore, Uuid) {
        let store = MemoryContributionStore::default();
        let id = store.insert_pending(Uuid::new_v4(), &payload).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn approval_publishes_exactly_once() {
        let (store, id) = seeded(gallery()).await;
        let moderator = Uuid::new_v4();

        let published = set_status(&store, id, ReviewDecision::Approve, moderator)
            .await
            .unwrap();
        assert!(published.is_some());
        assert_eq!(store.status_of(id), Some(ContributionStatus::Approved));

        let err = set_status(&store, id, ReviewDecision::Approve, moderator)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::AlreadyReviewed(ContributionStatus::Approved)));

        let published = store.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].source_contribution_id, id);
        assert_eq!(published[0].kind, ContributionKind::Gallery);
    }

    #[tokio::test]
    async fn failed_promotion_leaves_the_record_pending_and_retry_publishes_once() {
        let (store, id) = seeded(gallery()).await;
        let moderator = Uuid::new_v4();

        store.fail_next_approve();
        let err = set_status(&store, id, ReviewDecision::Approve, moderator)
            .await
            .unwrap_err();
        assert_eq!(err.flash_code(), "unknown");
        assert_eq!(store.status_of(id), Some(ContributionStatus::Pending));
        assert!(store.published().is_empty());

        set_status(&store, id, ReviewDecision::Approve, moderator)
            .await
            .unwrap();
        assert_eq!(store.status_of(id), Some(ContributionStatus::Approved));
        assert_eq!(store.published().len(), 1);
    }

    #[tokio::test]
    async fn rejection_never_publishes_and_is_final() {
        let (store, id) = seeded(gallery()).await;
        let moderator = Uuid::new_v4();

        let published = set_status(&store, id, ReviewDecision::Reject, moderator)
            .await
            .unwrap();
        assert_eq!(published, None);
        assert_eq!(store.status_of(id), Some(ContributionStatus::Rejected));

        let err = set_status(&store, id, ReviewDecision::Approve, moderator)
            .await
            .unwrap_err();
        assert_eq!(err.flash_code(), "already_reviewed");
        assert!(store.published().is_empty());
    }

    #[tokio::test]
    async fn general_contributions_are_approved_without_publishing() {
        let (store, id) = seeded(ContributionPayload::General {
            title: "Pasola festival".into(),
            description: "Mounted spear-throwing ritual in Sumba".into(),
            region: None,
            category: Some("tradition".into()),
        })
        .await;

        let published = set_status(&store, id, ReviewDecision::Approve, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(published, None);
        assert_eq!(store.status_of(id), Some(ContributionStatus::Approved));
        assert!(store.published().is_empty());
    }

    #[tokio::test]
    async fn quiz_suggestions_publish_into_the_bank() {
        let (store, id) = seeded(ContributionPayload::Quiz {
            prompt: "Which dance uses a chorus of chanting men?".into(),
            options: vec!["Kecak".into(), "Saman".into(), "Jaipong".into(), "Serimpi".into()],
            correct_index: 0,
            explanation: "Kecak is performed by a circle of chanting men.".into(),
            category: "dance".into(),
            difficulty: Difficulty::Easy,
        })
        .await;

        set_status(&store, id, ReviewDecision::Approve, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(store.published()[0].kind, ContributionKind::Quiz);
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found_the_second_time() {
        let (store, id) = seeded(gallery()).await;

        delete(&store, id).await.unwrap();
        let err = delete(&store, id).await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound));
        assert_eq!(store.len(), 0);
        assert!(store.published().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_reported_not_found() {
        let store = MemoryContributionStore::default();
        let err = set_status(&store, Uuid::new_v4(), ReviewDecision::Reject, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.flash_code(), "contribution_missing");
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (store, first) = seeded(gallery()).await;
        store.insert_pending(Uuid::new_v4(), &gallery()).await.unwrap();
        set_status(&store, first, ReviewDecision::Reject, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(list(&store, None).await.unwrap().len(), 2);
        let pending = list(&store, Some(ContributionStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, first);
    }
}
