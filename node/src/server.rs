use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use capture_node_camera::FrameSource;
use capture_node_storage::PersistentStore;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::handler::{CaptureHandler, CaptureResponse};

/// The handler is locked for a whole capture, so captures never overlap.
type SharedHandler<S, P> = Arc<Mutex<CaptureHandler<S, P>>>;

pub fn router<S, P>(handler: CaptureHandler<S, P>) -> Router
where
    S: FrameSource + 'static,
    P: PersistentStore + 'static,
{
    Router::new()
        .route("/capture", get(capture::<S, P>))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(Mutex::new(handler)))
}

/// GET /capture
async fn capture<S, P>(State(handler): State<SharedHandler<S, P>>) -> CaptureResponse
where
    S: FrameSource + 'static,
    P: PersistentStore + 'static,
{
    handler.lock().await.handle_capture_request().await
}
