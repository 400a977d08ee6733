use std::future::Future;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::{ContributionPayload, ContributionStatus, PendingContribution};

/// Result of a review attempt against a single contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The transition happened; `published_id` is set when approval
    /// created a published row.
    Applied { published_id: Option<Uuid> },
    NotFound,
    AlreadyReviewed(ContributionStatus),
}

/// Persistence seam for pending contributions.
pub trait ContributionStore {
    fn insert_pending(
        &self,
        contributor_id: Uuid,
        payload: &ContributionPayload,
    ) -> impl Future<Output = Result<Uuid>> + Send;

    fn list(
        &self,
        status: Option<ContributionStatus>,
    ) -> impl Future<Output = Result<Vec<PendingContribution>>> + Send;

    fn fetch(&self, id: Uuid) -> impl Future<Output = Result<Option<PendingContribution>>> + Send;

    /// Promotes and marks approved in a single transaction.
    fn approve(&self, id: Uuid, moderator: Uuid) -> impl Future<Output = Result<ReviewOutcome>> + Send;

    fn reject(&self, id: Uuid, moderator: Uuid) -> impl Future<Output = Result<ReviewOutcome>> + Send;

    /// Returns whether a row was removed.
    fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
}

#[derive(Clone)]
pub struct PgContributionStore {
    pool: PgPool,
}

impl PgContributionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    id: Uuid,
    payload: Json<ContributionPayload>,
    contributor_id: Option<Uuid>,
    contributor_name: Option<String>,
    status: String,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingContribution {
    type Error = anyhow::Error;

    fn try_from(row: PendingRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            payload: row.payload.0,
            contributor_id: row.contributor_id,
            contributor_name: row.contributor_name,
            status: row.status.parse()?,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    outcome: String,
    published_id: Option<Uuid>,
    prior_status: Option<String>,
}

const PENDING_SELECT: &str = "SELECT pc.id, pc.payload, pc.contributor_id, u.username AS contributor_name, \
     pc.status, pc.reviewed_by, pc.reviewed_at, pc.created_at \
     FROM pending_contributions pc LEFT JOIN users u ON u.id = pc.contributor_id";

impl ContributionStore for PgContributionStore {
    async fn insert_pending(&self, contributor_id: Uuid, payload: &ContributionPayload) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO pending_contributions (id, kind, payload, contributor_id, status)
             VALUES ($1, $2, $3, $4, 'pending')",
        )
        .bind(id)
        .bind(payload.kind().as_str())
        .bind(Json(payload))
        .bind(contributor_id)
        .execute(&self.pool)
        .await
        .context("failed to insert pending contribution")?;
        Ok(id)
    }

    async fn list(&self, status: Option<ContributionStatus>) -> Result<Vec<PendingContribution>> {
        let rows = sqlx::query_as::<_, PendingRow>(&format!(
            "{PENDING_SELECT} WHERE ($1::TEXT IS NULL OR pc.status = $1) ORDER BY pc.created_at DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("failed to list contributions")?;

        rows.into_iter().map(PendingContribution::try_from).collect()
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<PendingContribution>> {
        let row = sqlx::query_as::<_, PendingRow>(&format!("{PENDING_SELECT} WHERE pc.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch contribution")?;

        row.map(PendingContribution::try_from).transpose()
    }

    async fn approve(&self, id: Uuid, moderator: Uuid) -> Result<ReviewOutcome> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT outcome, published_id, prior_status FROM approve_contribution($1, $2)",
        )
        .bind(id)
        .bind(moderator)
        .fetch_one(&self.pool)
        .await
        .context("approve_contribution failed")?;

        match row.outcome.as_str() {
            "approved" => Ok(ReviewOutcome::Applied {
                published_id: row.published_id,
            }),
            "not_found" => Ok(ReviewOutcome::NotFound),
            "not_pending" => {
                let prior = row
                    .prior_status
                    .as_deref()
                    .ok_or_else(|| anyhow!("approve_contribution omitted prior status"))?
                    .parse()?;
                Ok(ReviewOutcome::AlreadyReviewed(prior))
            }
            other => Err(anyhow!("unexpected approve_contribution outcome `{other}`")),
        }
    }

    async fn reject(&self, id: Uuid, moderator: Uuid) -> Result<ReviewOutcome> {
        let result = sqlx::query(
            "UPDATE pending_contributions
             SET status = 'rejected', reviewed_by = $2, reviewed_at = NOW()
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(moderator)
        .execute(&self.pool)
        .await
        .context("failed to reject contribution")?;

        if result.rows_affected() > 0 {
            return Ok(ReviewOutcome::Applied { published_id: None });
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM pending_contributions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to read contribution status")?;

        match current {
            Some(status) => Ok(ReviewOutcome::AlreadyReviewed(status.parse()?)),
            None => Ok(ReviewOutcome::NotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_contributions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete contribution")?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use anyhow::bail;

    use super::*;
    use crate::contributions::ContributionKind;

    #[derive(Debug, Clone)]
    pub struct PublishedRecord {
        pub id: Uuid,
        pub kind: ContributionKind,
        pub source_contribution_id: Uuid,
    }

    #[derive(Default)]
    struct State {
        records: Vec<PendingContribution>,
        published: Vec<PublishedRecord>,
        fail_next_approve: bool,
    }

    /// In-memory store that mirrors the transactional approval of the
    /// database function, with a switch to fail the next promotion.
    #[derive(Default)]
    pub struct MemoryContributionStore {
        state: Mutex<State>,
    }

    impl MemoryContributionStore {
        pub fn fail_next_approve(&self) {
            self.state.lock().unwrap().fail_next_approve = true;
        }

        pub fn published(&self) -> Vec<PublishedRecord> {
            self.state.lock().unwrap().published.clone()
        }

        pub fn status_of(&self, id: Uuid) -> Option<ContributionStatus> {
            self.state
                .lock()
                .unwrap()
                .records
                .iter()
                .find(|record| record.id == id)
                .map(|record| record.status)
        }

        pub fn len(&self) -> usize {
            self.state.lock().unwrap().records.len()
        }
    }

    impl ContributionStore for MemoryContributionStore {
        async fn insert_pending(&self, contributor_id: Uuid, payload: &ContributionPayload) -> Result<Uuid> {
            let id = Uuid::new_v4();
            self.state.lock().unwrap().records.push(PendingContribution {
                id,
                payload: payload.clone(),
                contributor_id: Some(contributor_id),
                contributor_name: None,
                status: ContributionStatus::Pending,
                reviewed_by: None,
                reviewed_at: None,
                created_at: Utc::now(),
            });
            Ok(id)
        }

        async fn list(&self, status: Option<ContributionStatus>) -> Result<Vec<PendingContribution>> {
            let state = self.state.lock().unwrap();
            let mut records: Vec<_> = state
                .records
                .iter()
                .filter(|record| status.is_none_or(|s| record.status == s))
                .cloned()
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        }

        async fn fetch(&self, id: Uuid) -> Result<Option<PendingContribution>> {
            let state = self.state.lock().unwrap();
            Ok(state.records.iter().find(|record| record.id == id).cloned())
        }

        async fn approve(&self, id: Uuid, moderator: Uuid) -> Result<ReviewOutcome> {
            let mut state = self.state.lock().unwrap();
            let Some(index) = state.records.iter().position(|record| record.id == id) else {
                return Ok(ReviewOutcome::NotFound);
            };
            let record = &state.records[index];
            if record.status != ContributionStatus::Pending {
                return Ok(ReviewOutcome::AlreadyReviewed(record.status));
            }

            // Staged like the transaction body; discarded if the promotion fails.
            let kind = record.kind();
            let staged = kind.publishes().then(|| PublishedRecord {
                id: Uuid::new_v4(),
                kind,
                source_contribution_id: id,
            });
            if std::mem::take(&mut state.fail_next_approve) {
                bail!("injected failure while promoting {id}");
            }

            let published_id = staged.as_ref().map(|p| p.id);
            if let Some(published) = staged {
                state.published.push(published);
            }
            let record = &mut state.records[index];
            record.status = ContributionStatus::Approved;
            record.reviewed_by = Some(moderator);
            record.reviewed_at = Some(Utc::now());
            Ok(ReviewOutcome::Applied { published_id })
        }

        async fn reject(&self, id: Uuid, moderator: Uuid) -> Result<ReviewOutcome> {
            let mut state = self.state.lock().unwrap();
            let Some(record) = state.records.iter_mut().find(|record| record.id == id) else {
                return Ok(ReviewOutcome::NotFound);
            };
            if record.status != ContributionStatus::Pending {
                return Ok(ReviewOutcome::AlreadyReviewed(record.status));
            }
            record.status = ContributionStatus::Rejected;
            record.reviewed_by = Some(moderator);
            record.reviewed_at = Some(Utc::now());
            Ok(ReviewOutcome::Applied { published_id: None })
        }

        async fn delete(&self, id: Uuid) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            let before = state.records.len();
            state.records.retain(|record| record.id != id);
            Ok(state.records.len() != before)
        }
    }
}
