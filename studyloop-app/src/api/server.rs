use axum::routing::{get, post};
use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use studyloop_core::SessionInitializer;

use crate::api::routes::{
    answer, continue_session, delete_session, get_session, navigate, start_session, AppState,
    Registry,
};

pub fn build_app(init: SessionInitializer) -> Router {
    let state = Arc::new(AppState {
        init,
        sessions: tokio::sync::Mutex::new(Registry::default()),
    });
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/answer", post(answer))
        .route("/sessions/:id/navigate", post(navigate))
        .route("/sessions/:id/continue", post(continue_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(init: SessionInitializer, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_app(init);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
