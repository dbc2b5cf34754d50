use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const CALLBACK_PATH: &str = "/key";

#[derive(Clone)]
struct CallbackState {
    keys: mpsc::Sender<String>,
    success_url: String,
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

/// Running callback server for one login attempt.
pub struct CallbackHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

pub async fn start(
    port: u16,
    success_url: impl Into<String>,
    keys: mpsc::Sender<String>,
) -> Result<CallbackHandle> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .map_err(|err| {
            Error::connectivity_with(format!("failed to bind login callback on port {port}"), err)
        })?;
    let local_addr = listener.local_addr().map_err(|err| {
        Error::connectivity_with("failed to read login callback address", err)
    })?;

    let state = CallbackState {
        keys,
        success_url: success_url.into(),
    };
    let app = Router::new()
        .route(CALLBACK_PATH, get(receive_key))
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await;
        if let Err(err) = served {
            warn!(error = %err, "login callback server stopped with error");
        }
    });
    debug!(%local_addr, "login callback listening");

    Ok(CallbackHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

impl CallbackHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn redirect_url(&self) -> String {
        format!("http://127.0.0.1:{}{CALLBACK_PATH}", self.local_addr.port())
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "login callback task failed");
        }
        debug!(local_addr = %self.local_addr, "login callback stopped");
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn receive_key(State(state): State<CallbackState>, Query(query): Query<KeyQuery>) -> Response {
    let Some(key) = query.key.filter(|key| !key.trim().is_empty()) else {
        warn!("login callback received a request without a key");
        return (StatusCode::BAD_REQUEST, "missing key").into_response();
    };

    if let Err(err) = state.keys.try_send(key) {
        debug!(error = %err, "login callback key not delivered");
    }
    Redirect::to(&state.success_url).into_response()
}
