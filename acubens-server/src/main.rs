use std::net::SocketAddr;

use acubens_common::prelude::*;
use acubens_common::{AcquireRequest, LockEvent, ReleaseRequest, RenewRequest};
use acubens_core::{LockCoordinator, Properties};
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let properties = Properties::from_env();
    let addr: SocketAddr = properties
        .bind_addr
        .parse()
        .expect("ACU_BIND_ADDR must be a socket address");
    let coordinator = Arc::new(LockCoordinator::new(&properties));

    let app = Router::new()
        .route("/api/lock/status", get(lock_status))
        .route("/api/lock/acquire", post(lock_acquire))
        .route("/api/lock/renew", post(lock_renew))
        .route("/api/lock/release", post(lock_release))
        .route("/api/lock/events", get(lock_events))
        .layer(Extension(coordinator));

    info!("lock coordinator listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .expect("server failed");
}

async fn lock_status(Extension(coordinator): Extension<Arc<LockCoordinator>>) -> Response {
    Json(coordinator.status()).into_response()
}

async fn lock_acquire(
    Extension(coordinator): Extension<Arc<LockCoordinator>>,
    request: Result<Json<AcquireRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return bad_request(rejection.to_string()),
    };
    match coordinator.acquire(request) {
        Ok(reply) => {
            // a denial is reported as 423 Locked with the owner attached
            let status = if reply.granted {
                StatusCode::OK
            } else {
                StatusCode::LOCKED
            };
            (status, Json(reply)).into_response()
        }
        Err(e) => bad_request(e.message()),
    }
}

async fn lock_renew(
    Extension(coordinator): Extension<Arc<LockCoordinator>>,
    request: Result<Json<RenewRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return bad_request(rejection.to_string()),
    };
    match coordinator.renew(request) {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => bad_request(e.message()),
    }
}

async fn lock_release(
    Extension(coordinator): Extension<Arc<LockCoordinator>>,
    request: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return bad_request(rejection.to_string()),
    };
    match coordinator.release(request) {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => bad_request(e.message()),
    }
}

async fn lock_events(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    Extension(coordinator): Extension<Arc<LockCoordinator>>,
) -> Response {
    let holder_id: Option<InlineStr> = params.get("holder_id").map(|s| s.as_str().into());
    ws.on_upgrade(move |socket| observer_session(socket, coordinator, holder_id))
}

/// One connected observer. A full snapshot goes out first so the observer
/// starts from the complete table (and heals any events missed while
/// disconnected); every broadcast event follows as a JSON text frame. When
/// the socket closes, leases of the presented holder are swept.
async fn observer_session(
    mut socket: WebSocket,
    coordinator: Arc<LockCoordinator>,
    holder_id: Option<InlineStr>,
) {
    let mut events = coordinator.subscribe();

    if send_event(&mut socket, &coordinator.full_snapshot())
        .await
        .is_err()
    {
        sweep_on_disconnect(&coordinator, holder_id);
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("observer lagged {} events, resynchronizing", missed);
                    if send_event(&mut socket, &coordinator.full_snapshot())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            frame = socket.recv() => match frame {
                Some(Ok(_)) => {} // observers only listen
                Some(Err(_)) | None => break,
            },
        }
    }

    sweep_on_disconnect(&coordinator, holder_id);
}

fn sweep_on_disconnect(coordinator: &LockCoordinator, holder_id: Option<InlineStr>) {
    if let Some(holder_id) = holder_id {
        let released = coordinator.release_all_by_holder(&holder_id);
        if !released.is_empty() {
            info!(
                "released {} leases on observer disconnect, holder: {}",
                released.len(),
                holder_id
            );
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &LockEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => socket.send(Message::Text(text)).await,
        Err(e) => {
            error!("lock event serialization failed: {}", e);
            Ok(())
        }
    }
}

fn bad_request(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error": error })),
    )
        .into_response()
}
