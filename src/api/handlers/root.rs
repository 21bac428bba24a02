use axum::http::StatusCode;

// axum handler for "/"
pub async fn root() -> (StatusCode, &'static str) {
    (StatusCode::OK, concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")))
}
