//! Background worker serving an image engine on the local socket.
//!
//! # Responsibilities
//! - Bind the Unix socket (replacing a stale socket file)
//! - Accept connections and serve them with the engine's router
//! - Exit cooperatively when its cancellation token fires
//!
//! # Design Decisions
//! - Cancellation is checked at the accept loop and per connection; in-flight
//!   responses are allowed to finish via graceful shutdown
//! - The socket is bound inside `spawn_worker`, so binds happen in launch
//!   order and an older worker can never unlink the socket of its replacement
//! - A cancelled worker never removes the socket file

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::ImageEngine;

/// Handle to a running worker task.
#[derive(Debug)]
pub struct WorkerHandle {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Launch a worker; returns immediately without waiting for readiness.
pub fn spawn_worker(
    engine: Arc<dyn ImageEngine>,
    socket_path: PathBuf,
    generation: u64,
) -> WorkerHandle {
    let token = CancellationToken::new();
    let listener = bind(&socket_path);
    let task = tokio::spawn(run_worker(engine, listener, socket_path, generation, token.clone()));
    WorkerHandle {
        generation,
        token,
        task,
    }
}

fn bind(socket_path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => tracing::debug!(socket = %socket_path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(socket_path)
}

async fn run_worker(
    engine: Arc<dyn ImageEngine>,
    listener: io::Result<UnixListener>,
    socket_path: PathBuf,
    generation: u64,
    token: CancellationToken,
) {
    let listener = match listener {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(socket = %socket_path.display(), generation, error = %e, "Image worker failed to bind");
            return;
        }
    };
    if token.is_cancelled() {
        tracing::debug!(generation, "Image worker cancelled before serving");
        return;
    }
    let router = engine.router();
    tracing::info!(socket = %socket_path.display(), generation, "Image worker listening");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!(generation, "Image worker received stop signal, exiting loop");
                break;
            }
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!(generation, error = %e, "Image worker accept failed");
                        continue;
                    }
                };
                let service = TowerToHyperService::new(router.clone());
                let token = token.clone();
                tokio::spawn(async move {
                    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    tokio::pin!(connection);
                    tokio::select! {
                        result = connection.as_mut() => {
                            if let Err(e) = result {
                                tracing::debug!(error = %e, "Image worker connection error");
                            }
                        }
                        _ = token.cancelled() => {
                            connection.as_mut().graceful_shutdown();
                            let _ = connection.await;
                        }
                    }
                });
            }
        }
    }
}
