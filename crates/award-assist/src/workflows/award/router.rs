use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::collaborators::AssistantResponder;
use super::domain::{AwardTier, AwardeeInfo, Session, SessionId};
use super::export::ExportFormat;
use super::repository::{RepositoryError, SessionRepository};
use super::service::{AwardWorkflowService, SessionUpsert, WorkflowError, MAX_UPLOAD_BYTES};

pub const SESSION_HEADER: &str = "x-session-id";

/// Router builder exposing the drafting workflow over HTTP.
pub fn award_router<R, A>(service: Arc<AwardWorkflowService<R, A>>) -> Router
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    Router::new()
        .route(
            "/api/session",
            get(current_session_handler::<R, A>).post(upsert_session_handler::<R, A>),
        )
        .route("/api/session/clear", post(clear_handler::<R, A>))
        .route("/api/session/:session_id", get(load_session_handler::<R, A>))
        .route("/api/chat", post(chat_handler::<R, A>))
        .route("/api/recommend", post(recommend_handler::<R, A>))
        .route("/api/refresh", post(refresh_handler::<R, A>))
        .route("/api/improve", post(improve_handler::<R, A>))
        .route("/api/finalize", post(finalize_handler::<R, A>))
        .route("/api/export", post(export_handler::<R, A>))
        .route(
            "/api/upload",
            post(upload_handler::<R, A>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .with_state(service)
}

type SharedService<R, A> = State<Arc<AwardWorkflowService<R, A>>>;

/// Successful payloads carry `success: true` beside the flattened body.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            body,
        }),
    )
        .into_response()
}

fn with_session_header(session: &Session, response: Response) -> Response {
    let header = HeaderName::from_static(SESSION_HEADER);
    ([(header, session.id.to_string())], response).into_response()
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::State(_) => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WorkflowError::Repository(err) => {
                tracing::error!(error = %err, "session repository failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let payload = json!({
            "success": false,
            "error": self.to_string(),
            "type": self.kind(),
        });
        (status, Json(payload)).into_response()
    }
}

fn header_session(headers: &HeaderMap) -> Result<Option<SessionId>, WorkflowError> {
    let Some(raw) = headers.get(SESSION_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(SessionId::parse)
        .map(Some)
        .ok_or_else(|| WorkflowError::Validation(format!("invalid {SESSION_HEADER} header")))
}

fn required_session(headers: &HeaderMap) -> Result<SessionId, WorkflowError> {
    header_session(headers)?
        .ok_or_else(|| WorkflowError::Validation(format!("missing {SESSION_HEADER} header")))
}

fn parse_award(raw: Option<String>) -> Result<Option<AwardTier>, WorkflowError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => AwardTier::from_label(label)
            .map(Some)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown award '{label}'"))),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, WorkflowError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| WorkflowError::Validation(rejection.body_text()))
}

/// An absent or blank body means "no options"; anything else must parse.
fn optional_json<T>(body: &Bytes) -> Result<T, WorkflowError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| WorkflowError::Validation(format!("invalid request body: {err}")))
}

/// Runs a service call on the blocking pool; repositories may touch the filesystem.
async fn blocking<R, A, T, F>(
    service: Arc<AwardWorkflowService<R, A>>,
    call: F,
) -> Result<T, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
    T: Send + 'static,
    F: FnOnce(&AwardWorkflowService<R, A>) -> Result<T, WorkflowError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| {
            WorkflowError::Repository(RepositoryError::Unavailable(format!(
                "blocking task failed: {err}"
            )))
        })?
}

#[derive(Debug, Serialize)]
struct SessionBody {
    session: Session,
}

pub(crate) async fn current_session_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    // an unparseable header is treated like a missing one
    let id = header_session(&headers).unwrap_or(None);
    let session = blocking(service, move |service| service.current_session(id)).await?;
    let response = ok(SessionBody {
        session: session.clone(),
    });
    Ok(with_session_header(&session, response))
}

pub(crate) async fn upsert_session_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Result<Json<SessionUpsert>, JsonRejection>,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let mut request = json_body(body)?;
    if request.session_id.is_none() {
        request.session_id = header_session(&headers)?;
    }
    let session = blocking(service, move |service| service.upsert(request)).await?;
    let response = ok(json!({
        "session_id": session.id,
        "session_name": session.name,
    }));
    Ok(with_session_header(&session, response))
}

pub(crate) async fn clear_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let session = blocking(service, move |service| service.clear(&id)).await?;
    Ok(ok(json!({
        "session_id": session.id,
        "message": "Session cleared",
    })))
}

pub(crate) async fn load_session_handler<R, A>(
    State(service): SharedService<R, A>,
    Path(session_id): Path<String>,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = SessionId::parse(&session_id)
        .ok_or_else(|| WorkflowError::Validation(format!("invalid session id '{session_id}'")))?;
    let session = blocking(service, move |service| service.load(&id)).await?;
    Ok(ok(SessionBody { session }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    message: String,
}

pub(crate) async fn chat_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request = json_body(body)?;
    let turn = blocking(service, move |service| service.chat(&id, &request.message)).await?;
    Ok(ok(json!({
        "response": turn.reply.content,
        "timestamp": turn.reply.timestamp,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AwardeeRequest {
    #[serde(default)]
    awardee_info: Option<AwardeeInfo>,
}

pub(crate) async fn recommend_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request: AwardeeRequest = optional_json(&body)?;
    let recommendation =
        blocking(service, move |service| service.recommend(&id, request.awardee_info)).await?;
    Ok(ok(recommendation))
}

pub(crate) async fn refresh_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request: AwardeeRequest = optional_json(&body)?;
    let recommendation =
        blocking(service, move |service| service.refresh(&id, request.awardee_info)).await?;
    Ok(ok(recommendation))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImproveRequest {
    #[serde(default)]
    current_award: Option<String>,
}

pub(crate) async fn improve_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request: ImproveRequest = optional_json(&body)?;
    let current_award = parse_award(request.current_award)?;
    let advice = blocking(service, move |service| service.improve(&id, current_award)).await?;
    Ok(ok(advice))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FinalizeRequest {
    #[serde(default)]
    award: Option<String>,
    #[serde(default)]
    awardee_info: Option<AwardeeInfo>,
}

pub(crate) async fn finalize_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request: FinalizeRequest = optional_json(&body)?;
    let award = parse_award(request.award)?;
    let finalized = blocking(service, move |service| {
        service.finalize(&id, award, request.awardee_info)
    })
    .await?;
    Ok(ok(finalized))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportRequest {
    format: String,
    #[serde(default)]
    awardee_info: Option<AwardeeInfo>,
}

pub(crate) async fn export_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let request = json_body(body)?;
    let format = match request.format.trim().to_ascii_lowercase().as_str() {
        "txt" => ExportFormat::Txt,
        "json" => ExportFormat::Json,
        other => {
            return Err(WorkflowError::Validation(format!(
                "unsupported export format: {other}"
            )))
        }
    };
    let document = blocking(service, move |service| {
        service.export(&id, format, request.awardee_info)
    })
    .await?;
    Ok(ok(document))
}

pub(crate) async fn upload_handler<R, A>(
    State(service): SharedService<R, A>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, WorkflowError>
where
    R: SessionRepository + 'static,
    A: AssistantResponder + 'static,
{
    let id = required_session(&headers)?;
    let malformed = |err: axum::extract::multipart::MultipartError| {
        WorkflowError::Validation(format!("malformed upload: {err}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| WorkflowError::Validation("no file selected".into()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(malformed)?;

        let outcome = blocking(service.clone(), move |service| {
            service.upload(&id, &filename, content_type.as_deref(), &bytes)
        })
        .await?;
        let message = format!("Successfully analyzed {}", outcome.filename);
        return Ok(ok(json!({
            "message": message,
            "filename": outcome.filename,
            "kind": outcome.kind,
            "extracted_text": outcome.extracted_text,
            "truncated": outcome.truncated,
        })));
    }

    Err(WorkflowError::Validation("no file provided".into()))
}
