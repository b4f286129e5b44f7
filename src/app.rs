use std::net::SocketAddr;

use axum::{extract::State, response::Html, routing::get, Router};
use minijinja::context;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::AppError, pages, state::AppState, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(home).fallback(|| users::handlers::method_not_allowed("GET, HEAD")),
        )
        .route(
            "/health",
            get(|| async { "ok" })
                .fallback(|| users::handlers::method_not_allowed("GET, HEAD")),
        )
        .merge(users::router())
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(state.pages.render(pages::INDEX, context! {}).await?)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".into())
}
