use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    contributions::{
        ContributionKind, ContributionPayload, ContributionStatus, ContributionStore,
        PendingContribution, ReviewDecision, moderation,
    },
    web::{
        AppState, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
    },
};

use super::{auth::require_admin_user, dashboard::render_admin_nav, types::ModerationQuery};

const QUEUE_PATH: &str = "/dashboard/moderation";

#[derive(Deserialize)]
pub(crate) struct ReviewForm {
    id: Uuid,
}

pub async fn moderation_queue(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ModerationQuery>,
) -> Result<Html<String>, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let filter = params
        .filter
        .as_deref()
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<ContributionStatus>().ok());

    let mut flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let items = match moderation::list(state.contributions(), filter).await {
        Ok(items) => items,
        Err(err) => {
            flash = compose_flash_message(None, Some(err.flash_code()));
            Vec::new()
        }
    };

    let body = render_queue(&items, filter);
    Ok(Html(render_page(
        PageLayout::new("Moderation", Some(&admin), body).with_flash(flash),
    )))
}

pub async fn approve_contribution(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, Redirect> {
    review(state, jar, form.id, ReviewDecision::Approve).await
}

pub async fn reject_contribution(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, Redirect> {
    review(state, jar, form.id, ReviewDecision::Reject).await
}

async fn review(
    state: AppState,
    jar: CookieJar,
    id: Uuid,
    decision: ReviewDecision,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    // Only quiz approvals change the fallback bank.
    let kind = match state.contributions().fetch(id).await {
        Ok(Some(item)) => Some(item.kind()),
        Ok(None) => None,
        Err(err) => {
            error!(?err, %id, "failed to load contribution before review");
            return Ok(queue_redirect("error", "unknown"));
        }
    };

    match moderation::set_status(state.contributions(), id, decision, admin.id).await {
        Ok(published_id) => {
            if decision == ReviewDecision::Approve
                && kind.is_some_and(|kind| kind.publishes())
                && published_id.is_none()
            {
                warn!(%id, "approved contribution produced no published row");
            }
            if decision == ReviewDecision::Approve && kind == Some(ContributionKind::Quiz) {
                if let Err(err) = state.reload_bank().await {
                    error!(?err, "failed to refresh quiz bank after approval");
                }
            }
            Ok(queue_redirect("status", decision.target().as_str()))
        }
        Err(err) => Ok(queue_redirect("error", err.flash_code())),
    }
}

/// Removes the record whatever its status. Uploaded media is removed too
/// unless the contribution was approved, since published rows point at it.
pub async fn delete_contribution(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, Redirect> {
    let _admin = require_admin_user(&state, &jar).await?;

    let existing = match state.contributions().fetch(form.id).await {
        Ok(existing) => existing,
        Err(err) => {
            error!(?err, id = %form.id, "failed to load contribution before delete");
            return Ok(queue_redirect("error", "unknown"));
        }
    };

    match moderation::delete(state.contributions(), form.id).await {
        Ok(()) => {
            if let Some(item) = existing.filter(|item| item.status != ContributionStatus::Approved) {
                for url in item.payload.media_urls() {
                    state.media().remove_url(url).await;
                }
            }
            Ok(queue_redirect("status", "deleted"))
        }
        Err(err) => {
            warn!(%err, id = %form.id, "contribution delete refused");
            Ok(queue_redirect("error", err.flash_code()))
        }
    }
}

fn queue_redirect(key: &str, code: &str) -> Redirect {
    Redirect::to(&format!("{QUEUE_PATH}?{key}={code}"))
}

fn render_queue(items: &[PendingContribution], filter: Option<ContributionStatus>) -> String {
    let filters = [
        None,
        Some(ContributionStatus::Pending),
        Some(ContributionStatus::Approved),
        Some(ContributionStatus::Rejected),
    ]
    .iter()
    .map(|candidate| {
        let (value, label) = match candidate {
            Some(status) => (status.as_str(), status.as_str()),
            None => ("", "all"),
        };
        let selected = if *candidate == filter { " selected" } else { "" };
        format!(r#"<option value="{value}"{selected}>{label}</option>"#)
    })
    .collect::<String>();

    let rows = if items.is_empty() {
        "<tr><td colspan=\"5\">Nothing to review.</td></tr>".to_string()
    } else {
        items.iter().map(render_row).collect::<String>()
    };

    format!(
        r#"{nav}
<section class="panel">
    <h2>Contributions</h2>
    <form method="get" action="{QUEUE_PATH}">
        <label for="filter">Status</label>
        <select id="filter" name="filter" onchange="this.form.submit()">{filters}</select>
    </form>
</section>
<section>
    <table>
        <thead><tr><th>Kind</th><th>Submission</th><th>Contributor</th><th>Status</th><th></th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>"#,
        nav = render_admin_nav(QUEUE_PATH),
    )
}

fn render_row(item: &PendingContribution) -> String {
    let status = item.status.as_str();
    let mut actions = String::new();
    if item.status == ContributionStatus::Pending {
        actions.push_str(&action_form("approve", item.id, "Approve", ""));
        actions.push_str(&action_form("reject", item.id, "Reject", "secondary"));
    }
    actions.push_str(&action_form("delete", item.id, "Delete", "danger"));

    format!(
        r#"<tr><td>{kind}</td><td><strong>{headline}</strong>{details}</td><td>{contributor}<br><span class="note">{submitted}</span></td><td><span class="status-tag {status}">{status}</span></td><td>{actions}</td></tr>"#,
        kind = item.kind(),
        headline = escape_html(item.payload.headline()),
        details = render_details(&item.payload),
        contributor = escape_html(item.contributor_name.as_deref().unwrap_or("deleted user")),
        submitted = item.created_at.format("%Y-%m-%d %H:%M"),
    )
}

fn action_form(action: &str, id: Uuid, label: &str, class: &str) -> String {
    format!(
        r#"<form method="post" action="{QUEUE_PATH}/{action}" class="inline-form"><input type="hidden" name="id" value="{id}"><button type="submit" class="{class}">{label}</button></form> "#
    )
}

fn render_details(payload: &ContributionPayload) -> String {
    match payload {
        ContributionPayload::General {
            description,
            region,
            category,
            ..
        } => format!(
            r#"<p>{}</p><p class="note">{} · {}</p>"#,
            escape_html(description),
            escape_html(category.as_deref().unwrap_or("uncategorized")),
            escape_html(region.as_deref().unwrap_or("no region")),
        ),
        ContributionPayload::Gallery {
            description,
            image_url,
            ..
        } => format!(
            r#"<p>{}</p><a href="{url}">view image</a>"#,
            escape_html(description),
            url = escape_html(image_url),
        ),
        ContributionPayload::Audio {
            performer,
            audio_url,
            ..
        } => format!(
            r#"<p class="note">{}</p><audio controls preload="none" src="{}"></audio>"#,
            escape_html(performer),
            escape_html(audio_url),
        ),
        ContributionPayload::Quiz {
            options,
            correct_index,
            explanation,
            difficulty,
            ..
        } => {
            let list = options
                .iter()
                .enumerate()
                .map(|(index, option)| {
                    let mark = if index == *correct_index { " ✓" } else { "" };
                    format!("<li>{}{mark}</li>", escape_html(option))
                })
                .collect::<String>();
            format!(
                r#"<ol type="A">{list}</ol><p class="note">{difficulty} · {}</p>"#,
                escape_html(explanation),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::quiz::Difficulty;

    fn item(status: ContributionStatus, payload: ContributionPayload) -> PendingContribution {
        PendingContribution {
            id: Uuid::new_v4(),
            payload,
            contributor_id: None,
            contributor_name: Some("Made".into()),
            status,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_pending_rows_offer_review_actions() {
        let general = ContributionPayload::General {
            title: "Reog Ponorogo".into(),
            description: "Masked dance from East Java".into(),
            region: Some("java".into()),
            category: Some("dance".into()),
        };
        let pending = render_row(&item(ContributionStatus::Pending, general.clone()));
        assert!(pending.contains("/dashboard/moderation/approve"));
        assert!(pending.contains("/dashboard/moderation/reject"));

        let approved = render_row(&item(ContributionStatus::Approved, general));
        assert!(!approved.contains("/dashboard/moderation/approve"));
        assert!(approved.contains("/dashboard/moderation/delete"));
    }

    #[test]
    fn quiz_details_mark_the_correct_option() {
        let payload = ContributionPayload::Quiz {
            prompt: "Which island is home to the kecak dance?".into(),
            options: vec!["Bali".into(), "Java".into(), "Lombok".into(), "Flores".into()],
            correct_index: 0,
            explanation: "Kecak was developed in Bali in the 1930s.".into(),
            category: "dance".into(),
            difficulty: Difficulty::Easy,
        };
        let html = render_details(&payload);
        assert!(html.contains("<li>Bali ✓</li>"));
        assert!(html.contains("<li>Java</li>"));
    }

    #[test]
    fn queue_keeps_the_active_filter() {
        let html = render_queue(&[], Some(ContributionStatus::Rejected));
        assert!(html.contains(r#"<option value="rejected" selected>"#));
        assert!(html.contains("Nothing to review."));
    }
}
