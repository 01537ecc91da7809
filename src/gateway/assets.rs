//! Embedded list UI, served for every unmatched GET.
//!
//! Known asset paths (`/app.js`, `/style.css`) come back with a guessed
//! content type; anything else gets `index.html`, since the UI is a single
//! page.

use axum::{
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use rust_embed::RustEmbed;

const INDEX: &str = "index.html";

#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Router fallback.
pub async fn handle_static(method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return not_found();
    }

    let path = uri.path().trim_start_matches('/');
    asset_response(path)
        .or_else(|| asset_response(INDEX))
        .unwrap_or_else(not_found)
}

fn asset_response(path: &str) -> Option<Response> {
    if path.is_empty() {
        return None;
    }
    let file = WebAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(
        (
            [(header::CONTENT_TYPE, mime.essence_str().to_owned())],
            file.data.into_owned(),
        )
            .into_response(),
    )
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found"})),
    )
        .into_response()
}
