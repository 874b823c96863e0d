//! Request orchestration.
//!
//! Per request: apply redirect rules, resolve the owning mount, join the
//! remaining path under its base, canonicalize directory URLs, check the
//! operation's authorization against the live snapshot, then perform the
//! filesystem operation and render the response. The snapshot is loaded
//! once at the top; a concurrent reload cannot change a decision mid-chain.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::auth::{self, Operation};
use crate::config::Snapshot;
use crate::error::HostError;
use crate::listing;
use crate::resolve;
use crate::AppState;

/// Single entry point for every method on `/` and `/<path>`.
pub async fn serve(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let snapshot = state.store.current();
    let browser = auth::is_browser(&headers);

    let mut url_path = uri.path().to_string();
    if let Some(target) = snapshot.redirects().get(&url_path) {
        debug!(from = %url_path, to = %target, "redirect rule applied");
        url_path = target.clone();
    }

    match handle(&snapshot, &method, &url_path, &headers, &params, body, browser).await {
        Ok(response) => response,
        Err(err) => error_response(&err, browser),
    }
}

async fn handle(
    snapshot: &Snapshot,
    method: &Method,
    url_path: &str,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
    body: Bytes,
    browser: bool,
) -> Result<Response, HostError> {
    let Some(matched) = snapshot.mounts().resolve(url_path) else {
        debug!(path = %url_path, "no mount for path");
        return Err(HostError::MountNotFound(url_path.to_string()));
    };

    let target = resolve::resolve(&matched.mount.base, &matched.relative)?;
    let query_auth = params.get("auth").map(String::as_str);
    let metadata = fs::metadata(&target).await.ok();

    if metadata.as_ref().is_some_and(|m| m.is_dir()) {
        // Canonicalize before anything else so relative links in the
        // listing resolve; revealing "this is a directory" via the
        // redirect is not treated as a disclosure.
        if !url_path.ends_with('/') {
            let location = format!("{url_path}/");
            return Ok((
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
            )
                .into_response());
        }

        if *method != Method::GET {
            return Err(HostError::MethodNotAllowed);
        }
        if !auth::authorize(snapshot, Operation::Index, headers, query_auth) {
            return Ok(deny(browser));
        }

        let entries = listing::scan(&target, url_path).await?;
        let response = if browser {
            let show_parent = !resolve::segments(&matched.relative).is_empty();
            Html(listing::render_html(snapshot, url_path, &entries, show_parent)).into_response()
        } else {
            axum::Json(listing::render_json(url_path, entries)).into_response()
        };
        return Ok(response);
    }

    match *method {
        Method::GET => {
            if !metadata.as_ref().is_some_and(|m| m.is_file()) {
                return Err(HostError::NotFound(url_path.to_string()));
            }
            if !auth::authorize(snapshot, Operation::Get, headers, query_auth) {
                return Ok(deny(browser));
            }
            send_file(&target).await
        }
        Method::PUT => {
            if !snapshot.enable_put() {
                return Err(HostError::MethodNotAllowed);
            }
            if !auth::authorize(snapshot, Operation::Put, headers, query_auth) {
                return Ok(deny(browser));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            // Create-or-truncate; a disconnect mid-body can leave a
            // truncated file behind, accepted without rollback.
            fs::write(&target, &body).await?;
            info!(path = %target.display(), bytes = body.len(), "file uploaded");
            Ok(StatusCode::CREATED.into_response())
        }
        _ => Err(HostError::MethodNotAllowed),
    }
}

/// Stream a file's bytes with download headers, without buffering it.
async fn send_file(target: &std::path::Path) -> Result<Response, HostError> {
    let metadata = fs::metadata(target).await?;
    let file = fs::File::open(target).await?;
    let stream = ReaderStream::new(file);

    let mime = mime_guess::from_path(target)
        .first_or_octet_stream()
        .to_string();
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let safe_name = file_name.replace('"', "'");

    debug!(path = %target.display(), "sending file");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{safe_name}\""),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// 401 for a failed authorization. Browsers get the challenge header so the
/// native credential prompt appears; API clients get the bare status.
fn deny(browser: bool) -> Response {
    if browser {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"filehost\"")],
            Html(error_page(StatusCode::UNAUTHORIZED)),
        )
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn error_response(err: &HostError, browser: bool) -> Response {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    }
    if browser {
        (status, Html(error_page(status))).into_response()
    } else {
        status.into_response()
    }
}

fn error_page(status: StatusCode) -> String {
    format!(
        "<!DOCTYPE html><html><head></head><body><h1>{}</h1></body></html>",
        status.as_u16()
    )
}
