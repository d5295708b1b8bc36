use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::auth::{AuthOptions, authenticate_request, bearer_token};
use crate::backend::Backend;
use crate::models::{Pagination, RecipePage};

pub const ITEMS_PER_PAGE: u32 = 20;
const RANDOM_ATTEMPTS: usize = 5;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    /// `None` when backend credentials are missing.
    pub backend: Option<Arc<dyn Backend>>,
    pub edit_token: Option<String>,
    pub auth: AuthOptions,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    fn backend(&self) -> Result<&dyn Backend, ApiError> {
        self.backend
            .as_deref()
            .ok_or_else(|| ApiError::Internal("Database not configured".to_string()))
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RandomRecipeQuery {
    pub exclude: Option<String>,
}

#[derive(Deserialize)]
pub struct ListRecipesQuery {
    pub page: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/random-recipe", get(random_recipe))
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/likes", get(list_likes))
        .route("/api/recipes/{slug}", get(get_recipe).delete(delete_recipe))
        .route(
            "/api/recipes/{slug}/like",
            get(like_status).post(toggle_like).delete(unlike_recipe),
        )
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn random_recipe(
    State(state): State<SharedState>,
    Query(query): Query<RandomRecipeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let unavailable = || ApiError::Internal("Random recipe not available".to_string());
    let backend = state.backend().map_err(|_| unavailable())?;
    let exclude = query.exclude.as_deref();

    for _ in 0..RANDOM_ATTEMPTS {
        let slug = backend.random_recipe_slug().await.map_err(|e| {
            tracing::error!("Random recipe API failure: {}", e);
            unavailable()
        })?;
        if let Some(slug) = slug
            && Some(slug.as_str()) != exclude
        {
            return Ok(Json(serde_json::json!({ "slug": slug })));
        }
    }

    tracing::error!(?exclude, "Unable to find random recipe slug");
    Err(unavailable())
}

async fn list_recipes(
    State(state): State<SharedState>,
    Query(query): Query<ListRecipesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = match query.page.as_deref() {
        None => 1,
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|page| *page >= 1)
            .and_then(|page| u32::try_from(page).ok())
            .ok_or_else(|| ApiError::BadRequest("Page must be 1 or greater".to_string()))?,
    };
    let backend = state.backend()?;

    let (rows, total) = backend
        .list_recipes(page, ITEMS_PER_PAGE)
        .await
        .map_err(|e| {
            tracing::error!(page, "Recipes API failure: {}", e);
            ApiError::Internal("Failed to fetch recipes".to_string())
        })?;

    Ok(Json(RecipePage {
        recipes: rows.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, ITEMS_PER_PAGE, total),
    }))
}

async fn get_recipe(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let backend = state.backend()?;
    let row = backend.get_recipe(&slug).await.map_err(|e| {
        tracing::error!(%slug, "Failed to load recipe: {}", e);
        ApiError::Internal("Failed to fetch recipe".to_string())
    })?;
    match row {
        Some(row) => Ok(Json(row.into_full())),
        None => Err(ApiError::NotFound("Recipe not found".to_string())),
    }
}

async fn delete_recipe(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let authorized = match (state.edit_token.as_deref(), bearer_token(&headers)) {
        (Some(expected), Some(token)) => !expected.is_empty() && token == expected,
        _ => false,
    };
    if !authorized {
        tracing::warn!(%slug, "Rejected recipe deletion without a valid edit token");
        return Err(ApiError::Unauthorized("Unauthorized".to_string()));
    }

    let backend = state.backend()?;
    let deleted = backend.delete_recipe(&slug).await.map_err(|e| {
        tracing::error!(%slug, "Failed to delete recipe: {}", e);
        ApiError::Internal("Failed to delete recipe".to_string())
    })?;
    match deleted {
        true => {
            tracing::info!(%slug, "Deleted recipe");
            Ok(Json(serde_json::json!({
                "message": format!("Recipe '{}' deleted", slug)
            })))
        }
        false => Err(ApiError::NotFound("Recipe not found".to_string())),
    }
}

/// The signed-in user id for a request that needs a session.
async fn signed_in_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let outcome = authenticate_request(
        headers,
        &state.auth,
        state.edit_token.as_deref(),
        state.backend.as_deref(),
    )
    .await;
    let (user_id, _email) = outcome
        .require_user()
        .map_err(|reason| ApiError::Unauthorized(reason.to_string()))?;
    Ok(user_id)
}

async fn list_likes(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = signed_in_user(&state, &headers).await?;

    let backend = state.backend()?;
    let likes = backend.list_likes(&user_id).await.map_err(|e| {
        tracing::error!(%user_id, "Failed to fetch likes: {}", e);
        ApiError::Internal("Failed to fetch likes".to_string())
    })?;

    Ok(Json(serde_json::json!({ "likes": likes })))
}

/// Authenticate, then make sure the recipe exists.
async fn like_target<'a>(
    state: &'a AppState,
    headers: &HeaderMap,
    slug: &str,
) -> Result<(&'a dyn Backend, String), ApiError> {
    let user_id = signed_in_user(state, headers).await?;
    let backend = state.backend()?;
    let exists = backend.recipe_exists(slug).await.map_err(|e| {
        tracing::error!(%slug, "Failed to check recipe existence: {}", e);
        ApiError::Internal("Failed to check recipe".to_string())
    })?;
    if !exists {
        return Err(ApiError::NotFound("Recipe not found".to_string()));
    }
    Ok((backend, user_id))
}

fn like_body(slug: &str, liked: bool) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "liked": liked, "slug": slug }))
}

async fn like_status(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (backend, user_id) = like_target(&state, &headers, &slug).await?;
    let liked = backend.is_liked(&user_id, &slug).await.map_err(|e| {
        tracing::error!(%slug, %user_id, "Failed to check like status: {}", e);
        ApiError::Internal("Failed to check like status".to_string())
    })?;
    Ok(like_body(&slug, liked))
}

/// Like the recipe when it is not liked yet, otherwise unlike it.
async fn toggle_like(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (backend, user_id) = like_target(&state, &headers, &slug).await?;
    let liked = backend.is_liked(&user_id, &slug).await.map_err(|e| {
        tracing::error!(%slug, %user_id, "Failed to check existing like: {}", e);
        ApiError::Internal("Failed to check like status".to_string())
    })?;

    if liked {
        backend.unlike(&user_id, &slug).await.map_err(|e| {
            tracing::error!(%slug, %user_id, "Failed to unlike recipe: {}", e);
            ApiError::Internal("Failed to unlike recipe".to_string())
        })?;
    } else {
        backend.like(&user_id, &slug).await.map_err(|e| {
            tracing::error!(%slug, %user_id, "Failed to like recipe: {}", e);
            ApiError::Internal("Failed to like recipe".to_string())
        })?;
    }
    tracing::info!(%slug, %user_id, liked = !liked, "Toggled recipe like");
    Ok(like_body(&slug, !liked))
}

async fn unlike_recipe(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (backend, user_id) = like_target(&state, &headers, &slug).await?;
    backend.unlike(&user_id, &slug).await.map_err(|e| {
        tracing::error!(%slug, %user_id, "Failed to unlike recipe: {}", e);
        ApiError::Internal("Failed to unlike recipe".to_string())
    })?;
    Ok(like_body(&slug, false))
}
