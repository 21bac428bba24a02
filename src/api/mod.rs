use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request, StatusCode,
    },
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthService, GoogleConfig, GoogleIdentityProvider, TokenConfig, TokenIssuer};
use crate::storage::postgres::{self, PgStore};

pub mod envelope;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

use envelope::Reply;
use handlers::{adopters, auth, health, root, shelters};

pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found, check if the URL is correct";

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: &str, tokens: TokenConfig, google: GoogleConfig) -> Result<()> {
    let pool = postgres::connect(dsn).await?;
    let store = Arc::new(PgStore::new(pool));

    let identity =
        GoogleIdentityProvider::new(google).context("Failed to build Google HTTP client")?;
    let issuer = TokenIssuer::new(tokens, store.clone());
    let auth = Arc::new(AuthService::new(store, issuer, Arc::new(identity)));

    let app = router(auth);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Every route, layer and the 404 fallback, wired to `auth`.
pub fn router(auth: Arc<AuthService>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any);

    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .nest("/api/v1", api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth)),
        )
}

fn api_routes() -> Router {
    Router::new()
        .route("/auth/login", post(auth::login::login))
        .route("/auth/google", post(auth::login::google))
        .route("/auth/profile", get(auth::profile::profile))
        .route("/auth/logout", post(auth::session::logout))
        .route(
            "/auth/verify",
            get(auth::session::verify).post(auth::session::verify_fields),
        )
        .route("/adopter", get(adopters::list).post(adopters::create))
        .route(
            "/adopter/:id",
            get(adopters::get)
                .put(adopters::update)
                .delete(adopters::delete),
        )
        .route("/shelter", get(shelters::list).post(shelters::create))
        .route(
            "/shelter/:id",
            get(shelters::get)
                .put(shelters::update)
                .delete(shelters::delete),
        )
}

async fn not_found() -> Reply {
    Reply::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
