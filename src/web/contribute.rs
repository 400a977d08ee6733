use axum::{
    extract::{Multipart, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    catalog::{self, Region},
    contributions::{
        ContributionDraft, IntakeError, UploadPolicy,
        intake::{self, LOGIN_REDIRECT},
    },
    web::{
        AppState, CurrentUser, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
        uploads::{UploadOutcome, process_upload_form},
    },
};

const CONTRIBUTION_POLICIES: [UploadPolicy; 3] = [
    UploadPolicy::GALLERY_IMAGE,
    UploadPolicy::AUDIO_TRACK,
    UploadPolicy::AUDIO_COVER,
];

#[derive(Default, Deserialize)]
pub struct ContributeQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

pub async fn contribute_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ContributeQuery>,
) -> Html<String> {
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());

    let body = if user.is_some() {
        let regions = catalog::list_regions(state.pool_ref())
            .await
            .unwrap_or_else(|err| {
                error!(?err, "failed to load regions for contribute form");
                Vec::new()
            });
        render_contribute_form(&regions)
    } else {
        r#"<section class="panel">
    <h2>Share a piece of heritage</h2>
    <p class="note">Contributions are reviewed by our editors before they appear in the atlas. Please <a href="/login?status=login_required">sign in</a> or <a href="/register">create an account</a> to submit.</p>
</section>"#
            .to_string()
    };

    Html(render_page(
        PageLayout::new("Contribute", user.as_ref(), body)
            .with_flash(flash)
            .with_script(CONTRIBUTE_SCRIPT),
    ))
}

pub async fn submit_contribution(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Redirect {
    // Nothing is parsed or stored for anonymous callers.
    let Some(user) = user else {
        return Redirect::to(LOGIN_REDIRECT);
    };

    let outcome = match process_upload_form(multipart, state.media(), user.id, &CONTRIBUTION_POLICIES).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(%err, user_id = %user.id, "contribution upload refused");
            return error_redirect(&err.flash_code());
        }
    };

    let draft = match draft_from_form(&outcome) {
        Ok(draft) => draft,
        Err(err) => {
            outcome.discard(state.media()).await;
            return error_redirect(&err.flash_code());
        }
    };
    let kind = draft.kind();
    let referenced: Vec<String> = draft.uploads().iter().map(|object| object.url.clone()).collect();

    match intake::submit(state.contributions(), Some(user.id), draft).await {
        Ok(id) => {
            // Files sent for another kind's fields are not kept.
            for file in &outcome.files {
                if !referenced.contains(&file.to_object().url) {
                    state.media().remove(&file.key).await;
                }
            }
            info!(%id, %kind, user_id = %user.id, "contribution submitted");
            Redirect::to("/contribute?status=submitted")
        }
        Err(err) => {
            if let IntakeError::Backend(source) = &err {
                error!(err = ?source, "failed to store contribution");
            }
            outcome.discard(state.media()).await;
            error_redirect(&err.flash_code())
        }
    }
}

fn error_redirect(code: &str) -> Redirect {
    Redirect::to(&format!("/contribute?error={code}"))
}

/// Builds the typed draft for the kind chosen on the form.
fn draft_from_form(form: &UploadOutcome) -> Result<ContributionDraft, IntakeError> {
    let optional = |name: &str| form.first_text(name).map(str::to_string);

    match form.first_text("kind").unwrap_or_default() {
        "general" => Ok(ContributionDraft::General {
            title: form.text("title"),
            description: form.text("description"),
            region: optional("region"),
            category: optional("category"),
        }),
        "gallery" => Ok(ContributionDraft::Gallery {
            title: form.text("title"),
            description: form.text("description"),
            region: optional("region"),
            image: form.object_for("image"),
        }),
        "audio" => Ok(ContributionDraft::Audio {
            title: form.text("title"),
            performer: form.text("performer"),
            region: optional("region"),
            audio: form.object_for("audio"),
            cover: form.object_for("cover"),
        }),
        "quiz" => Ok(ContributionDraft::Quiz {
            prompt: form.text("prompt"),
            options: form
                .text_values("options")
                .map(|values| values.to_vec())
                .unwrap_or_default(),
            correct_index: form
                .first_text("correct_index")
                .and_then(|value| value.trim().parse().ok()),
            explanation: form.text("explanation"),
            category: form.text("quiz_category"),
            difficulty: form.text("difficulty"),
        }),
        other => Err(IntakeError::UnknownKind(other.to_string())),
    }
}

fn render_contribute_form(regions: &[Region]) -> String {
    let region_options = regions
        .iter()
        .map(|region| {
            format!(
                r#"<option value="{slug}">{name}</option>"#,
                slug = escape_html(&region.slug),
                name = escape_html(&region.name),
            )
        })
        .collect::<String>();

    format!(
        r#"<section class="panel">
    <h2>Share a piece of heritage</h2>
    <p class="note">Every submission is reviewed by an editor before it is published. Images up to 5 MB, audio up to 20 MB.</p>
    <form method="post" action="/contribute" enctype="multipart/form-data">
        <label for="kind">What are you contributing?</label>
        <select id="kind" name="kind" required>
            <option value="general">Story or cultural element</option>
            <option value="gallery">Photo for the gallery</option>
            <option value="audio">Music or audio recording</option>
            <option value="quiz">Quiz question</option>
        </select>

        <div data-kinds="general gallery audio">
            <label for="title">Title</label>
            <input id="title" name="title">
            <label for="region">Region</label>
            <select id="region" name="region">
                <option value="">Not specific to one region</option>
                {region_options}
            </select>
        </div>
        <div data-kinds="general gallery">
            <label for="description">Description</label>
            <textarea id="description" name="description"></textarea>
        </div>
        <div data-kinds="general">
            <label for="category">Category</label>
            <input id="category" name="category" placeholder="dance, music, craft, cuisine…">
        </div>
        <div data-kinds="gallery">
            <label for="image">Image</label>
            <input id="image" type="file" name="image" accept="image/*">
        </div>
        <div data-kinds="audio">
            <label for="performer">Performer</label>
            <input id="performer" name="performer">
            <label for="audio">Audio file</label>
            <input id="audio" type="file" name="audio" accept="audio/*">
            <label for="cover">Cover image (optional)</label>
            <input id="cover" type="file" name="cover" accept="image/*">
        </div>
        <div data-kinds="quiz">
            <label for="prompt">Question</label>
            <textarea id="prompt" name="prompt"></textarea>
            <label>Options (mark the correct one)</label>
            <div><input type="radio" name="correct_index" value="0" checked><input name="options" placeholder="Option A"></div>
            <div><input type="radio" name="correct_index" value="1"><input name="options" placeholder="Option B"></div>
            <div><input type="radio" name="correct_index" value="2"><input name="options" placeholder="Option C"></div>
            <div><input type="radio" name="correct_index" value="3"><input name="options" placeholder="Option D"></div>
            <label for="explanation">Explanation</label>
            <textarea id="explanation" name="explanation"></textarea>
            <label for="quiz_category">Category</label>
            <input id="quiz_category" name="quiz_category" placeholder="music">
            <label for="difficulty">Difficulty</label>
            <select id="difficulty" name="difficulty">
                <option value="easy">Easy</option>
                <option value="medium" selected>Medium</option>
                <option value="hard">Hard</option>
            </select>
        </div>
        <p><button type="submit">Submit for review</button></p>
    </form>
</section>"#
    )
}

const CONTRIBUTE_SCRIPT: &str = r#"
(function () {
    const kind = document.getElementById('kind');
    if (!kind) { return; }
    const sections = document.querySelectorAll('[data-kinds]');
    function sync() {
        sections.forEach(function (section) {
            const visible = section.dataset.kinds.split(' ').includes(kind.value);
            section.style.display = visible ? '' : 'none';
            section.querySelectorAll('input, textarea, select').forEach(function (input) {
                input.disabled = !visible;
            });
        });
    }
    kind.addEventListener('change', sync);
    sync();
})();
"#;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::contributions::ContributionKind;

    fn form(fields: &[(&str, &str)]) -> UploadOutcome {
        let mut text_fields: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in fields {
            text_fields
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        UploadOutcome {
            files: Vec::new(),
            text_fields,
        }
    }

    #[test]
    fn quiz_form_collects_repeated_options() {
        let outcome = form(&[
            ("kind", "quiz"),
            ("prompt", "Which city is home to the Kraton?"),
            ("options", "Yogyakarta"),
            ("options", "Medan"),
            ("options", "Makassar"),
            ("options", "Ambon"),
            ("correct_index", "0"),
            ("explanation", "The Kraton is the sultan's palace in Yogyakarta."),
            ("quiz_category", "architecture"),
            ("difficulty", "medium"),
        ]);
        let draft = draft_from_form(&outcome).unwrap();
        assert_eq!(draft.kind(), ContributionKind::Quiz);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn gallery_form_without_a_file_fails_validation() {
        let outcome = form(&[("kind", "gallery"), ("title", "Ulos"), ("description", "Batak cloth")]);
        let err = draft_from_form(&outcome).unwrap().validate().unwrap_err();
        assert_eq!(err.flash_code(), "missing_image");
    }

    #[test]
    fn unknown_kind_is_refused() {
        let err = draft_from_form(&form(&[("kind", "recipe")])).unwrap_err();
        assert_eq!(err.flash_code(), "unknown_kind");
        let err = draft_from_form(&form(&[])).unwrap_err();
        assert!(matches!(err, IntakeError::UnknownKind(ref kind) if kind.is_empty()));
    }
}
