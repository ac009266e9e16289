//! Request handlers for the two JSON endpoints plus the health probe.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::language;
use crate::models::{CommentOutcome, TranscriptPayload};
use crate::state::AppState;
use crate::strategy::FetchFlags;
use crate::video_id::{extract_video_id, VideoId};

/// Successful transcripts are cacheable for an hour downstream.
const SUCCESS_CACHE_CONTROL: &str = "public, max-age=3600";

/// Unavailability is cacheable only briefly.
const NEGATIVE_CACHE_CONTROL: &str = "public, max-age=600";

/// Boundary errors: bad input is a 400, nothing else surfaces here.
#[derive(Debug)]
pub enum ApiError {
    MissingVideoId,
    InvalidVideoId,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::MissingVideoId => "videoId parameter is missing",
            ApiError::InvalidVideoId => "Invalid videoId format or URL",
        };
        (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
    }
}

fn require_video_id(raw: Option<&str>) -> Result<VideoId, ApiError> {
    let raw = raw.filter(|v| !v.is_empty()).ok_or(ApiError::MissingVideoId)?;
    extract_video_id(raw).ok_or_else(|| {
        warn!(raw, "failed to extract a valid video id");
        ApiError::InvalidVideoId
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptQuery {
    video_id: Option<String>,
    languages: Option<String>,
    prefer_original: Option<bool>,
    strict_languages: Option<bool>,
    allow_translate: Option<bool>,
}

#[derive(Serialize)]
struct TranscriptResponse {
    video_id: String,
    #[serde(flatten)]
    payload: TranscriptPayload,
}

/// `GET /transcript?videoId=<id|url>[&languages=csv][&preferOriginal=..]
/// [&strictLanguages=..][&allowTranslate=..]`
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscriptQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let video_id = require_video_id(query.video_id.as_deref())?;

    let caller_codes: Option<Vec<String>> = query.languages.as_deref().map(|csv| {
        csv.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    });
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());

    let prefs = language::resolve_preferences(
        caller_codes.as_deref(),
        accept_language,
        &state.default_langs,
    );

    let flags = FetchFlags {
        prefer_original: query.prefer_original.unwrap_or(true),
        strict_languages: query.strict_languages.unwrap_or(false),
        allow_translate: query.allow_translate.unwrap_or(false),
    };

    match state.transcripts.get(&video_id, &prefs, flags).await {
        Ok(payload) => Ok((
            StatusCode::OK,
            [(header::CACHE_CONTROL, SUCCESS_CACHE_CONTROL)],
            Json(TranscriptResponse {
                video_id: video_id.to_string(),
                payload,
            }),
        )
            .into_response()),
        Err(_) => Ok((
            StatusCode::NOT_FOUND,
            [(header::CACHE_CONTROL, NEGATIVE_CACHE_CONTROL)],
            Json(json!({ "error": "Transcript not available" })),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    video_id: Option<String>,
}

#[derive(Serialize)]
struct CommentsResponse {
    video_id: String,
    #[serde(flatten)]
    outcome: CommentOutcome,
}

/// `GET /comments?videoId=<id|url>`
pub async fn get_comments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CommentsQuery>,
) -> Result<Response, ApiError> {
    let video_id = require_video_id(query.video_id.as_deref())?;

    let outcome = state.comments.get(&video_id).await;
    Ok((
        StatusCode::OK,
        Json(CommentsResponse {
            video_id: video_id.to_string(),
            outcome,
        }),
    )
        .into_response())
}

/// `GET /healthz`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "uptime_secs": state.uptime_secs() })),
    )
        .into_response()
}
