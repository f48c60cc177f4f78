//! HTTP endpoint handlers. These are thin wrappers that forward to the course
//! pipeline or the chat proxy.
//! Each handler is instrumented and logs its inputs and outcome.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument, warn};

use crate::chat::{run_chat, ChatRequest};
use crate::domain::MiniCourse;
use crate::error::CourseError;
use crate::pipeline::{generate_course, CourseRequest};
use crate::protocol::*;
use crate::state::AppState;
use crate::telemetry::targets;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthOut { ok: true, model_configured: state.gemini.is_some() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_learn(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CourseRequestIn>, JsonRejection>,
) -> Result<Json<MiniCourse>, CourseError> {
    let Json(input) = body.map_err(|e| CourseError::BadBody(e.body_text()))?;
    let req = CourseRequest::from_input(input)?;

    match generate_course(&state, &req).await {
        Ok(course) => {
            info!(target: targets::COURSE, topic = %req.topic, level = %req.level, resources = course.resources.len(), "HTTP course served");
            Ok(Json(course))
        }
        Err(e) => {
            warn!(target: targets::COURSE, topic = %req.topic, kind = e.kind(), status = %e.status(), error = %e, "HTTP course failed");
            Err(e)
        }
    }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequestIn>, JsonRejection>,
) -> Result<Json<ChatOut>, CourseError> {
    let Json(input) = body.map_err(|e| CourseError::BadBody(e.body_text()))?;
    let req = ChatRequest::from_input(input)?;

    run_chat(&state, &req).await.map(Json).map_err(|e| {
        warn!(target: targets::CHAT, turns = req.turns.len(), kind = e.kind(), status = %e.status(), error = %e, "HTTP chat failed");
        e
    })
}
