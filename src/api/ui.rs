//! Browser UI

use std::path::PathBuf;

use axum::{Router, response::Html, routing::get};
use tower_http::services::{ServeDir, ServeFile};

/// Page served when no static directory is configured
const EMBEDDED_INDEX: &str = include_str!("../../assets/index.html");

/// Build the UI router
///
/// A configured static directory replaces the embedded page entirely.
pub fn router(static_dir: Option<&PathBuf>) -> Router {
    match static_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            tracing::info!(path = %dir.display(), "serving UI from static directory");
            Router::new().fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)))
        }
        None => Router::new().route("/", get(index)),
    }
}

async fn index() -> Html<&'static str> {
    Html(EMBEDDED_INDEX)
}
