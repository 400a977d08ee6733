use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    config::{self, QuizModels, QuizPrompts, QuizSettings},
    llm,
    quiz::{Difficulty, QuestionBank},
    web::{
        AppState, escape_html,
        flash::compose_flash_message,
        templates::{PageLayout, render_page},
    },
};

use super::{auth::require_admin_user, dashboard::render_admin_nav, types::DashboardQuery};

const SETTINGS_PATH: &str = "/dashboard/quiz";

#[derive(Deserialize)]
pub(crate) struct ModelsForm {
    generation_model: String,
}

#[derive(Deserialize)]
pub(crate) struct PromptsForm {
    generation: String,
}

pub async fn quiz_settings_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<DashboardQuery>,
) -> Result<Html<String>, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let settings = state.quiz_settings().await.unwrap_or_default();
    let bank = state.question_bank().await;
    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    let body = render_settings_body(&settings, &bank, state.quizzes().active_countdowns());

    Ok(Html(render_page(
        PageLayout::new("Quiz settings", Some(&admin), body).with_flash(flash),
    )))
}

pub async fn update_models(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ModelsForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let generation_model = form.generation_model.trim();
    if !llm::is_supported_model(generation_model) {
        return Ok(settings_redirect("error", "quiz_invalid_models"));
    }

    let models = QuizModels {
        generation_model: generation_model.to_string(),
    };
    if let Err(err) = config::update_quiz_models(state.pool_ref(), &models).await {
        error!(?err, "failed to update quiz models");
        return Ok(settings_redirect("error", "unknown"));
    }
    if let Err(err) = state.reload_settings().await {
        error!(?err, "failed to reload settings after quiz model update");
        return Ok(settings_redirect("error", "unknown"));
    }

    info!(model = %models.generation_model, admin = %admin.username, "quiz model updated");
    Ok(settings_redirect("status", "quiz_models_saved"))
}

pub async fn update_prompts(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<PromptsForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    let generation = form.generation.trim();
    if !prompt_has_placeholders(generation) {
        return Ok(settings_redirect("error", "quiz_invalid_prompts"));
    }

    let prompts = QuizPrompts {
        generation: generation.to_string(),
    };
    if let Err(err) = config::update_quiz_prompts(state.pool_ref(), &prompts).await {
        error!(?err, "failed to update quiz prompts");
        return Ok(settings_redirect("error", "unknown"));
    }
    if let Err(err) = state.reload_settings().await {
        error!(?err, "failed to reload settings after quiz prompt update");
        return Ok(settings_redirect("error", "unknown"));
    }

    info!(admin = %admin.username, "quiz prompt updated");
    Ok(settings_redirect("status", "quiz_prompts_saved"))
}

fn prompt_has_placeholders(prompt: &str) -> bool {
    prompt.contains("{{COUNT}}") && prompt.contains("{{DIFFICULTY}}")
}

fn settings_redirect(key: &str, code: &str) -> Redirect {
    Redirect::to(&format!("{SETTINGS_PATH}?{key}={code}"))
}

fn render_settings_body(settings: &QuizSettings, bank: &QuestionBank, active_timers: usize) -> String {
    let bank_counts = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
        .iter()
        .map(|difficulty| format!("{difficulty}: {}", bank.count_for(*difficulty)))
        .collect::<Vec<_>>()
        .join(" · ");

    format!(
        r#"{nav}
<section class="panel">
    <h2>Fallback bank</h2>
    <p class="note">{total} questions ({bank_counts}). {active_timers} question timer(s) running.</p>
</section>
<section class="panel">
    <h2>Generation model</h2>
    <form method="post" action="{SETTINGS_PATH}/models">
        <label for="generation-model">Model (with provider prefix, e.g. openrouter/openai/gpt-4o-mini)</label>
        <input id="generation-model" name="generation_model" value="{model}" required>
        <p><button type="submit">Save model</button></p>
    </form>
</section>
<section class="panel">
    <h2>Generation prompt</h2>
    <p class="note">Use {{{{COUNT}}}} and {{{{DIFFICULTY}}}} where the question count and difficulty belong.</p>
    <form method="post" action="{SETTINGS_PATH}/prompts">
        <textarea name="generation" rows="14" required>{prompt}</textarea>
        <p><button type="submit">Save prompt</button></p>
    </form>
</section>"#,
        nav = render_admin_nav(SETTINGS_PATH),
        total = bank.len(),
        model = escape_html(&settings.models.generation_model),
        prompt = escape_html(&settings.prompts.generation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_must_keep_both_placeholders() {
        assert!(prompt_has_placeholders(&QuizPrompts::default().generation));
        assert!(!prompt_has_placeholders("Write {{COUNT}} questions."));
        assert!(!prompt_has_placeholders("Write questions at {{DIFFICULTY}}."));
    }

    #[test]
    fn settings_page_escapes_the_prompt() {
        let mut settings = QuizSettings::default();
        settings.prompts.generation = "<b>{{COUNT}}</b> {{DIFFICULTY}}".into();
        let html = render_settings_body(&settings, &QuestionBank::default(), 0);
        assert!(html.contains("&lt;b&gt;{{COUNT}}&lt;/b&gt;"));
        assert!(html.contains("Use {{COUNT}} and {{DIFFICULTY}}"));
        assert!(html.contains("0 questions"));
    }
}
