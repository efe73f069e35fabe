//! HTTP entry points for the promptdeck card gallery
//!
//! Maps the wire contract onto [`CardRepository`] operations: a list
//! endpoint, a single action-dispatch endpoint (save/delete/like), and the
//! image upload/fetch pair. Everything else (rendering, the browser client)
//! lives outside this crate and talks to these routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use promptdeck_repo::{BlobStore, Card, CardError, CardErrorKind, CardRepository};

/// Key namespace for uploaded images
const IMAGE_PREFIX: &str = "images/";

/// Shared state behind every handler
///
/// The card repository and the image store are both views over the same
/// injected [`BlobStore`]; handlers never reach for an ambient global.
pub struct AppState<S: BlobStore> {
    /// Card repository, namespace `cards/`
    pub cards: CardRepository<S>,
    /// Raw store handle for image blobs, namespace `images/`
    pub images: Arc<S>,
}

impl<S: BlobStore + Sync + 'static> AppState<S> {
    /// Build state over a single shared store
    pub fn new(store: Arc<S>) -> Self {
        Self {
            cards: CardRepository::new(Arc::clone(&store)),
            images: store,
        }
    }
}

/// Build the application router
pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: BlobStore + Sync + 'static,
{
    Router::new()
        .route("/api/cards", get(list_cards::<S>).post(dispatch_action::<S>))
        .route("/api/images", post(upload_image::<S>))
        .route("/images/{name}", get(fetch_image::<S>))
        .with_state(state)
}

/// Error response: a status code plus `{ "error": message }` JSON body
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<CardError> for ApiError {
    fn from(err: CardError) -> Self {
        let status = match err.kind() {
            CardErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            CardErrorKind::NotFound => StatusCode::NOT_FOUND,
            CardErrorKind::Conflict => StatusCode::CONFLICT,
            CardErrorKind::Storage | CardErrorKind::Serialization | CardErrorKind::Io => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(%err, "request failed against the store");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Body of `POST /api/cards`
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionRequest {
    /// Create a new card or merge-update an existing one
    Save {
        /// The card to store
        card: Card,
    },
    /// Remove a card (idempotent)
    Delete {
        /// Id of the card to remove
        id: String,
    },
    /// Increment a card's like counter
    Like {
        /// Id of the card to like
        id: String,
    },
}

/// Success body for action dispatch
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    success: bool,
    /// The committed card, so the client can resynchronize its view
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Card>,
}

impl ActionResponse {
    fn ok() -> Self {
        Self {
            success: true,
            data: None,
        }
    }

    fn with_data(card: Card) -> Self {
        Self {
            success: true,
            data: Some(card),
        }
    }
}

/// Success body for the list endpoint
#[derive(Debug, Serialize)]
pub struct CardListResponse {
    /// All cards, newest first
    pub data: Vec<Card>,
}

async fn list_cards<S: BlobStore + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CardListResponse>, ApiError> {
    let mut cards = state.cards.list_all().await?;
    cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(CardListResponse { data: cards }))
}

async fn dispatch_action<S: BlobStore + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    match request {
        ActionRequest::Save { card } => {
            let committed = state.cards.save(card).await?;
            Ok(Json(ActionResponse::with_data(committed)))
        }
        ActionRequest::Delete { id } => {
            state.cards.delete(&id).await?;
            Ok(Json(ActionResponse::ok()))
        }
        ActionRequest::Like { id } => {
            let committed = state.cards.like(&id).await?;
            Ok(Json(ActionResponse::with_data(committed)))
        }
    }
}

/// Success body for image upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    success: bool,
    /// Stored name, unique per upload
    pub filename: String,
    /// Fetch path for the stored image
    pub url: String,
}

fn valid_image_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

async fn upload_image<S: BlobStore + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // keep only the final path component of whatever the browser sent
        let base = field
            .file_name()
            .and_then(|name| name.rsplit(['/', '\\']).next())
            .filter(|name| valid_image_name(name))
            .unwrap_or("upload.bin")
            .to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?;

        let filename = format!("{}-{}", chrono::Utc::now().timestamp_millis(), base);
        state
            .images
            .put(&format!("{}{}", IMAGE_PREFIX, filename), data)
            .await?;

        let url = format!("/images/{}", filename);
        return Ok(Json(UploadResponse {
            success: true,
            filename,
            url,
        }));
    }

    Err(ApiError::bad_request("no file field in form data"))
}

async fn fetch_image<S: BlobStore + Sync + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if !valid_image_name(&name) {
        return Err(ApiError::bad_request("invalid image name"));
    }
    match state.images.get(&format!("{}{}", IMAGE_PREFIX, name)).await? {
        Some(data) => Ok(([(header::CONTENT_TYPE, content_type_for(&name))], data).into_response()),
        None => Err(ApiError::not_found(format!("no such image: {}", name))),
    }
}
