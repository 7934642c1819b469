//! Profile Lookup Endpoint
//!
//! `GET /fetchdata/{key}/{action}?cache={true|false}` resolves the key through
//! the fetch-through cache and projects the result as raw JSON, a file
//! download or an HTML page.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use profcache_core::{Action, CacheKey, Resolved};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;

/// Response header reporting whether the entry was served from cache.
pub const X_CACHE: &str = "x-cache";

/// Query parameters for the lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchParams {
    pub cache: Option<String>,
}

impl FetchParams {
    /// Cache use defaults to on; only a case-insensitive `true` keeps it on.
    pub fn use_cache(&self) -> bool {
        self.cache
            .as_deref()
            .map_or(true, |v| v.eq_ignore_ascii_case("true"))
    }
}

/// GET /fetchdata/{key}/{action}
///
/// Extractor rejections are answered with the same error document as every
/// other failure.
pub async fn fetch_data(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<FetchParams>, QueryRejection>,
) -> Response {
    let Path((raw_key, raw_action)) = match path {
        Ok(path) => path,
        Err(rejection) => {
            return finish("invalid", ApiError::invalid_path(&rejection).into_response())
        }
    };

    let action = match raw_action.parse::<Action>() {
        Ok(action) => action,
        Err(e) => return finish("invalid", ApiError::from(e).into_response()),
    };

    let response = match query {
        Ok(Query(params)) => lookup(&state, &raw_key, action, params.use_cache())
            .await
            .unwrap_or_else(|e| e.into_response()),
        Err(rejection) => ApiError::invalid_query(&rejection).into_response(),
    };
    finish(action.as_str(), response)
}

fn finish(action_label: &str, response: Response) -> Response {
    if let Some(m) = metrics() {
        m.record_http_request(action_label, response.status().as_u16());
    }
    response
}

async fn lookup(
    state: &AppState,
    raw_key: &str,
    action: Action,
    use_cache: bool,
) -> ApiResult<Response> {
    let key = CacheKey::parse(raw_key)?;

    let resolved = match state.cache.resolve(&key, use_cache).await {
        Ok(resolved) => resolved,
        Err(e) => {
            if let Some(m) = metrics() {
                m.record_resolve("error");
            }
            tracing::warn!(key = %key, action = action.as_str(), error = %e, "Lookup failed");
            return Err(e.into());
        }
    };

    if let Some(m) = metrics() {
        m.record_resolve(resolved.source().as_str());
    }
    tracing::debug!(
        key = %key,
        action = action.as_str(),
        source = resolved.source().as_str(),
        "Lookup resolved"
    );

    project(state, &key, action, resolved).await
}

/// Turn a resolved entry into the response for `action`.
async fn project(
    state: &AppState,
    key: &CacheKey,
    action: Action,
    resolved: Resolved,
) -> ApiResult<Response> {
    let cache_header = cache_status(&resolved);

    let mut response = match action {
        Action::Raw => Json(resolved.into_entry().payload).into_response(),
        Action::WebView => Html(state.renderer.render(resolved.entry())).into_response(),
        Action::Download => {
            let artifact = state
                .cache
                .artifact(key)
                .await?
                .ok_or_else(|| ApiError::document_not_found(key))?;
            let disposition = HeaderValue::from_str(&format!(
                "attachment; filename=\"{}\"",
                artifact.file_name
            ))
            .map_err(|e| ApiError::internal_error(format!("Invalid file name: {}", e)))?;

            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static(artifact.content_type)),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes,
            )
                .into_response()
        }
    };

    response
        .headers_mut()
        .insert(HeaderName::from_static(X_CACHE), cache_header);
    Ok(response)
}

fn cache_status(resolved: &Resolved) -> HeaderValue {
    if resolved.was_cache_hit() {
        HeaderValue::from_static("HIT")
    } else {
        HeaderValue::from_static("MISS")
    }
}
