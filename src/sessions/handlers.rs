use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateSessionRequest, SessionResponse};
use super::repo::Session;
use crate::analysis::IMAGE_FIELD;
use crate::error::ApiError;
use crate::state::AppState;
use crate::workflow::{
    ImageAsset, Surface, TransitionRejected, ValidationError, Workflow, WorkflowView,
};

// --- public routers ---

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/analyze", post(analyze))
        .route("/sessions/:id/recommendations", post(recommend_exercise))
        .route("/sessions/:id/cancel", post(cancel))
        .route("/sessions/:id/retry", post(retry))
        .route("/sessions/:id/clear", post(clear))
}

pub fn upload_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/image", post(select_image))
        .layer(DefaultBodyLimit::max(body_limit))
}

// --- handlers ---

#[instrument(skip(state, body))]
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, HeaderMap, Json<SessionResponse>), ApiError> {
    let surface = body.map(|Json(b)| b.surface).unwrap_or(Surface::Web);
    let workflow = Workflow::new(
        state.analysis.clone(),
        state.config.uploads.rules_for(surface),
        state.config.analysis.timeout,
    );
    let session = state.sessions.create(surface, workflow).await;
    info!(session_id = %session.id, ?surface, "session created");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        HeaderValue::from_str(&format!("/api/v1/sessions/{}", session.id))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    let view = session.workflow.view().await;
    Ok((StatusCode::CREATED, headers, Json(respond(&session, view))))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = session.workflow.view().await;
    Ok(Json(respond(&session, view)))
}

/// The screen is gone: abandon any in-flight call and drop the image.
#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state
        .sessions
        .remove(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    session.workflow.clear().await;
    info!(session_id = %id, "session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/:id/image (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn select_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;

    let view = match read_image(&mut mp).await {
        Ok(Some(asset)) => session.workflow.select_image(asset).await?,
        Ok(None) => return Err(ApiError::BadUpload(format!("{IMAGE_FIELD} field is required"))),
        // the body limit cut the upload short: same outcome as an oversize pick
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let uploads = &state.config.uploads;
            let max = uploads
                .rules_for(session.surface)
                .max_bytes
                .unwrap_or(uploads.body_limit() as u64);
            session
                .workflow
                .reject_image(ValidationError::ExceedsLimit { max })
                .await?
        }
        Err(e) => return Err(ApiError::BadUpload(e.body_text())),
    };
    if let Some(err) = &view.error {
        warn!(session_id = %id, kind = err.kind, message = %err.message, "image rejected");
    }
    Ok(Json(respond(&session, view)))
}

async fn read_image(mp: &mut Multipart) -> Result<Option<ImageAsset>, MultipartError> {
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let file_name = field.file_name().map(|s| s.to_string());
        let asset = ImageAsset::new(field.bytes().await?, content_type);
        return Ok(Some(match file_name {
            Some(name) => asset.with_file_name(name),
            None => asset,
        }));
    }
    Ok(None)
}

#[instrument(skip(state))]
pub async fn analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = drive(&session, |wf| async move { wf.analyze().await }).await?;
    Ok(Json(respond(&session, view)))
}

#[instrument(skip(state))]
pub async fn recommend_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = drive(&session, |wf| async move { wf.recommend_exercise().await }).await?;
    Ok(Json(respond(&session, view)))
}

#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = session.workflow.cancel().await?;
    Ok(Json(respond(&session, view)))
}

#[instrument(skip(state))]
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = session.workflow.retry().await?;
    Ok(Json(respond(&session, view)))
}

#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = find(&state, id).await?;
    let view = session.workflow.clear().await;
    Ok(Json(respond(&session, view)))
}

async fn find(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

/// Runs a remote-calling action on its own task so a dropped connection
/// does not leave the workflow stuck mid-call.
async fn drive<F, Fut>(session: &Session, action: F) -> Result<WorkflowView, ApiError>
where
    F: FnOnce(Arc<Workflow>) -> Fut,
    Fut: Future<Output = Result<WorkflowView, TransitionRejected>> + Send + 'static,
{
    tokio::spawn(action(session.workflow.clone()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn respond(session: &Session, workflow: WorkflowView) -> SessionResponse {
    SessionResponse {
        id: session.id,
        surface: session.surface,
        created_at: session.created_at,
        workflow,
    }
}
