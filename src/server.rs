//! HTTP server lifecycle.
//!
//! Binds the web API router to a TCP listener and serves it on a spawned
//! task until the handle's cancellation token fires.

use crate::config::ServerSettings;
use crate::db;
use crate::error::AppError;
use crate::webapi::{self, AppState};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to control the running server.
pub struct ServerHandle {
    cancel_token: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) {
        log::info!("[server] Stopping server on {}", self.local_addr);
        self.cancel_token.cancel();

        if let Err(e) = self.task.await {
            log::error!("[server] Server task failed: {}", e);
        }
    }
}

/// Open the database and start serving.
pub async fn start(settings: ServerSettings) -> Result<ServerHandle, AppError> {
    let pool = db::initialize(&settings.database_path).await?;
    let state = AppState::new(pool, settings)?;
    start_with_state(state).await
}

/// Start serving an already built state.
///
/// Port 0 picks a free port; see `ServerHandle::local_addr`.
pub async fn start_with_state(state: AppState) -> Result<ServerHandle, AppError> {
    let addr = state.settings.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::internal(format!("Failed to read bound address: {}", e)))?;

    let cancel_token = CancellationToken::new();
    let cancel_clone = cancel_token.clone();
    let app = webapi::router(state);

    log::info!("[server] Listening on http://{}", local_addr);

    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        });

        if let Err(e) = server.await {
            log::error!("[server] Server error: {}", e);
        }

        log::info!("[server] Server stopped");
    });

    Ok(ServerHandle {
        cancel_token,
        local_addr,
        task,
    })
}

/// Serve until Ctrl-C.
pub async fn run(settings: ServerSettings) -> Result<(), AppError> {
    let handle = start(settings).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {}", e)))?;

    handle.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_start_serves_and_stops() {
        let dir = tempdir().unwrap();
        let settings = ServerSettings {
            port: 0,
            database_path: dir.path().join("server.db"),
            ..Default::default()
        };

        let handle = start(settings).await.unwrap();
        let addr = handle.local_addr();
        assert_ne!(addr.port(), 0);

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/nowhere/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(response.contains("\"code\":100"));

        handle.stop().await;
    }
}
