use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    Form, Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::generator::{Action, Generator, Outcome};
use crate::metrics::MetricsCollector;
use crate::page::{render_page, PageContext};
use crate::session::{SessionState, SessionStore};
use crate::validation::{SelectionForm, StyleForm};

/// Shared application state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub sessions: SessionStore,
    pub generator: Generator,
}

impl AppState {
    pub fn new(generator: Generator) -> Self {
        Self {
            sessions: SessionStore::new(),
            generator,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        self.generator.metrics()
    }

    /// Run one action against a session, holding the session for its whole
    /// duration.
    async fn apply(&self, id: Uuid, action: Action) -> ApiResult<(Outcome, SessionState)> {
        let mut state = self
            .sessions
            .lock(&id)
            .await
            .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))?;

        tracing::info!(session = %id, kind = ?action.kind(), "Applying action");
        let outcome = self.generator.apply(&mut state, action).await;
        tracing::info!(session = %id, phase = ?outcome.phase, n_requests = state.n_requests, "Action finished");

        Ok((outcome, state.clone()))
    }
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub session_id: Uuid,
    pub remaining_requests: u32,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub outcome: Outcome,
    pub state: SessionState,
}

fn page_redirect(id: Uuid, outcome: &Outcome) -> Redirect {
    Redirect::to(&format!("/sessions/{}#{}", id, outcome.render.anchor()))
}

/// Start a new session and send the browser to its page
pub async fn new_session(State(state): State<SharedState>) -> impl IntoResponse {
    let id = state.sessions.create().await;
    Redirect::to(&format!("/sessions/{}", id))
}

/// Render the page for a session
pub async fn show_page(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Html<String>> {
    let session = state
        .sessions
        .snapshot(&id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))?;

    let catalog = state.generator.catalog();
    let topics = catalog.topics().await?;
    let styles = catalog.styles().await?;

    let ctx = PageContext {
        session_id: id,
        topics: &topics,
        styles: &styles,
    };
    Ok(Html(render_page(&ctx, &session)))
}

/// Session state as JSON
pub async fn get_state(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StateResponse>> {
    let session = state
        .sessions
        .snapshot(&id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))?;

    Ok(Json(StateResponse {
        session_id: id,
        remaining_requests: state.generator.gate().remaining(&session),
        state: session,
    }))
}

/// Apply an action given as JSON and return the outcome with the new state
pub async fn post_action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(action): Json<Action>,
) -> ApiResult<Json<ActionResponse>> {
    let action = match action {
        Action::AddStyle { style } => Action::AddStyle {
            style: StyleForm { style }.into_validated()?,
        },
        other => other,
    };
    let (outcome, session) = state.apply(id, action).await?;
    Ok(Json(ActionResponse { outcome, state: session }))
}

pub async fn generate_text(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Form(form): Form<SelectionForm>,
) -> ApiResult<Redirect> {
    let action = Action::GenerateText {
        topic: form.topic,
        style: form.style,
    };
    let (outcome, _) = state.apply(id, action).await?;
    Ok(page_redirect(id, &outcome))
}

pub async fn regenerate_text(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Form(form): Form<SelectionForm>,
) -> ApiResult<Redirect> {
    let action = Action::RegenerateText {
        topic: form.topic,
        style: form.style,
    };
    let (outcome, _) = state.apply(id, action).await?;
    Ok(page_redirect(id, &outcome))
}

pub async fn generate_image(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Redirect> {
    let (outcome, _) = state.apply(id, Action::GenerateImage).await?;
    Ok(page_redirect(id, &outcome))
}

pub async fn add_style(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Form(form): Form<StyleForm>,
) -> ApiResult<Redirect> {
    let style = form.into_validated()?;
    let (outcome, _) = state.apply(id, Action::AddStyle { style }).await?;
    Ok(page_redirect(id, &outcome))
}

pub async fn remove_style(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Form(form): Form<StyleForm>,
) -> ApiResult<Redirect> {
    let style = form.style.trim().to_string();
    let (outcome, _) = state.apply(id, Action::RemoveStyle { style }).await?;
    Ok(page_redirect(id, &outcome))
}

pub async fn reset_styles(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Redirect> {
    let (outcome, _) = state.apply(id, Action::ResetStyles).await?;
    Ok(page_redirect(id, &outcome))
}
