//! HTTP/JSON boundary. Thin handlers over [`RoomRegistry`]: every route
//! validates its payload, delegates to the engine, and returns either the
//! documented body or `{ok:false, message}` with the mapped status.

use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::error::BattleError;
use crate::problems::answers_from_value;
use crate::registry::{AnswerReply, QuickJoinOutcome, RoomRegistry};
use crate::view::GameView;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: BattleError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            ok: false,
            message: err.to_string(),
        }),
    )
}

/// A body axum could not turn into the request struct still gets the shared
/// error shape: 413 for an oversized body, 400 for everything else
/// (invalid JSON, wrong types, missing fields).
fn payload_error(rejection: JsonRejection) -> ApiError {
    let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Json(ErrorResponse {
            ok: false,
            message: "Invalid JSON payload.".to_string(),
        }),
    )
}

/// Builds the API router. The binary mounts this and adds static file
/// serving on top; tests drive it directly.
pub fn router(registry: RoomRegistry) -> Router {
    Router::new()
        .route("/api/battle/rooms/join", post(join_room))
        .route("/api/battle/rooms/quick", post(quick_join))
        .route("/api/battle/rooms/{room_id}/config", post(set_config))
        .route("/api/battle/rooms/{room_id}/start", post(start_game))
        .route("/api/battle/rooms/{room_id}/answer", post(submit_answer))
        .route("/api/battle/rooms/{room_id}/leave", post(leave_room))
        .route("/api/battle/rooms/{room_id}/state", get(room_state))
        .route("/api/check", post(check_answer))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(registry)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    name: Option<String>,
    room_id: Option<String>,
    token: Option<String>,
}

async fn join_room(
    State(registry): State<RoomRegistry>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    let outcome = registry
        .join(
            request.room_id.as_deref(),
            request.name.as_deref(),
            request.token.as_deref(),
        )
        .map_err(error_response)?;
    let game = registry
        .get_view(&outcome.room_id, Some(&outcome.token))
        .map_err(error_response)?;
    Ok(Json(json!({
        "roomId": outcome.room_id,
        "playerToken": outcome.token,
        "rejoined": outcome.rejoined,
        "game": game,
    })))
}

async fn quick_join(
    State(registry): State<RoomRegistry>,
) -> Result<Json<QuickJoinOutcome>, ApiError> {
    registry.quick_join().map(Json).map_err(error_response)
}

#[derive(Debug, Deserialize)]
struct ConfigRequest {
    token: String,
    config: Value,
}

async fn set_config(
    State(registry): State<RoomRegistry>,
    Path(room_id): Path<String>,
    payload: Result<Json<ConfigRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    let config = registry
        .set_config(&room_id, &request.token, &request.config)
        .map_err(error_response)?;
    let game = registry
        .get_view(&room_id, Some(&request.token))
        .map_err(error_response)?;
    Ok(Json(json!({ "config": config, "game": game })))
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    token: String,
}

async fn start_game(
    State(registry): State<RoomRegistry>,
    Path(room_id): Path<String>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    registry
        .start(&room_id, &request.token)
        .map_err(error_response)?;
    let game = registry
        .get_view(&room_id, Some(&request.token))
        .map_err(error_response)?;
    Ok(Json(json!({ "game": game })))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    token: String,
    answers: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
    #[serde(flatten)]
    reply: AnswerReply,
    game: GameView,
}

async fn submit_answer(
    State(registry): State<RoomRegistry>,
    Path(room_id): Path<String>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    let reply = registry
        .submit_answer(&room_id, &request.token, request.answers.as_ref())
        .map_err(error_response)?;
    let game = registry
        .get_view(&room_id, Some(&request.token))
        .map_err(error_response)?;
    Ok(Json(AnswerResponse { reply, game }))
}

async fn leave_room(
    State(registry): State<RoomRegistry>,
    Path(room_id): Path<String>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    registry
        .leave(&room_id, &request.token)
        .map_err(error_response)?;
    // the departing player gets the anonymous view of what they left
    let game = registry.get_view(&room_id, None).map_err(error_response)?;
    Ok(Json(json!({ "game": game })))
}

#[derive(Debug, Deserialize)]
struct StateQuery {
    token: Option<String>,
}

async fn room_state(
    State(registry): State<RoomRegistry>,
    Path(room_id): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Json<Value>, ApiError> {
    let token = query.token.as_deref().filter(|t| !t.is_empty());
    let game = registry
        .get_view(&room_id, token)
        .map_err(error_response)?;
    Ok(Json(json!({ "roomId": game.id.clone(), "game": game })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    problem_id: Option<Value>,
    answers: Option<Value>,
}

/// Single-player answer check, independent of any room.
async fn check_answer(
    State(registry): State<RoomRegistry>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(payload_error)?;
    let problem_id = match &request.problem_id {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => {
            return Err(error_response(BattleError::InvalidInput(
                "Missing problemId.".to_string(),
            )))
        }
    };
    let problem = registry
        .catalog()
        .get(&problem_id)
        .ok_or_else(|| error_response(BattleError::ProblemNotFound))?;
    let answers = answers_from_value(request.answers.as_ref());
    // unlike battle rounds, a panicking predicate surfaces here as a 500
    match catch_unwind(AssertUnwindSafe(|| (problem.check)(&answers))) {
        Ok(result) => Ok(Json(json!({ "ok": result.ok, "message": result.message }))),
        Err(_) => Err(error_response(BattleError::Internal(
            "failed to evaluate the answer".to_string(),
        ))),
    }
}
