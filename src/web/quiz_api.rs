use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    quiz::{
        DEFAULT_QUESTION_COUNT, Difficulty, LlmQuestionSource, MAX_QUESTION_COUNT, QuizError,
        QuizQuestion, SessionView, build_question_set,
    },
    web::{
        AppState,
        responses::{ApiError, json_error},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub option: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: Uuid,
    #[serde(flatten)]
    pub view: SessionView,
}

fn quiz_error(err: QuizError) -> ApiError {
    let status = match err {
        QuizError::SessionNotFound => StatusCode::NOT_FOUND,
        QuizError::UnknownDifficulty(_) | QuizError::InvalidOption(_) => StatusCode::BAD_REQUEST,
        QuizError::WrongPhase { .. } | QuizError::AlreadySubmitted | QuizError::NotSubmitted => {
            StatusCode::CONFLICT
        }
        QuizError::EmptyQuestionSet => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(status, err.to_string())
}

fn parse_start(request: &StartRequest) -> Result<(usize, Difficulty), ApiError> {
    let count = request.count.unwrap_or(DEFAULT_QUESTION_COUNT);
    if !(1..=MAX_QUESTION_COUNT).contains(&count) {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            format!("count must be between 1 and {MAX_QUESTION_COUNT}"),
        ));
    }
    let difficulty = match request.difficulty.as_deref() {
        Some(value) => value.parse().map_err(quiz_error)?,
        None => Difficulty::default(),
    };
    Ok((count, difficulty))
}

async fn issue_questions(state: &AppState, count: usize, difficulty: Difficulty) -> Vec<QuizQuestion> {
    let settings = state.quiz_settings().await.unwrap_or_default();
    let source = LlmQuestionSource::new(state.llm_client(), settings);
    let bank = state.question_bank().await;
    let mut rng = StdRng::from_os_rng();

    let set = build_question_set(&source, &bank, count, difficulty, &mut rng).await;
    info!(
        origin = ?set.origin,
        issued = set.questions.len(),
        requested = set.requested,
        %difficulty,
        "quiz questions issued"
    );
    set.questions
}

pub async fn create_session(
    State(state): State<AppState>,
    request: Option<Json<StartRequest>>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let (count, difficulty) = parse_start(&request)?;

    let questions = issue_questions(&state, count, difficulty).await;
    let (id, live) = state.quizzes().create().await;
    match live.begin(questions).await {
        Ok(view) => Ok((StatusCode::CREATED, Json(SessionCreated { id, view }))),
        Err(err) => {
            warn!(%id, %err, "quiz session could not start");
            let _ = state.quizzes().remove(id).await;
            Err(quiz_error(err))
        }
    }
}

/// Begins a new round on an existing session after a restart.
pub async fn start_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<StartRequest>>,
) -> Result<Json<SessionView>, ApiError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let (count, difficulty) = parse_start(&request)?;
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;

    let questions = issue_questions(&state, count, difficulty).await;
    live.begin(questions).await.map(Json).map_err(quiz_error)
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;
    Ok(Json(live.view().await))
}

pub async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;
    live.select(request.option).await.map(Json).map_err(quiz_error)
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;
    live.submit().await.map(Json).map_err(quiz_error)
}

pub async fn next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;
    live.advance().await.map(Json).map_err(quiz_error)
}

pub async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let live = state.quizzes().get(id).await.map_err(quiz_error)?;
    Ok(Json(live.restart().await))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.quizzes().remove(id).await.map_err(quiz_error)?;
    Ok(StatusCode::NO_CONTENT)
}
