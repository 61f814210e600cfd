// Query server: exposes the engine handle over TCP

mod client;
mod protocol;

pub use client::QueryClient;
pub use protocol::{
    read_frame, write_frame, AskRequest, AskResponse, ServerRequest, ServerResponse,
    MAX_MESSAGE_SIZE,
};

use crate::config::ServerConfig;
use crate::error::{Result, RerankError};
use crate::retrieval::EngineHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task;

/// Pause after a failed accept before polling the listener again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and answers framed requests from the shared engine
pub struct QueryServer {
    listener: TcpListener,
    handle: Arc<EngineHandle>,
    default_top_k: usize,
    connections: Arc<Semaphore>,
}

impl QueryServer {
    /// Bind the listener; the engine may be installed before or after
    pub async fn bind(
        config: &ServerConfig,
        handle: Arc<EngineHandle>,
        default_top_k: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind)
            .await
            .map_err(|e| RerankError::Io {
                source: e,
                context: format!("Failed to bind to {}", config.bind),
            })?;

        let server = Self {
            listener,
            handle,
            default_top_k,
            connections: Arc::new(Semaphore::new(config.max_connections.max(1))),
        };

        tracing::info!("Query server listening on {}", server.local_addr()?);
        Ok(server)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| RerankError::Io {
            source: e,
            context: "Failed to read listener address".to_string(),
        })
    }

    /// Serve until `shutdown` resolves
    ///
    /// Failed accepts are logged and the listener keeps serving.
    pub async fn run_until<F: Future>(self, shutdown: F) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Query server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    self.on_accept(accepted).await;
                }
            }
        }
    }

    async fn on_accept(&self, accepted: std::io::Result<(TcpStream, SocketAddr)>) {
        match accepted {
            Ok((stream, peer)) => self.spawn_connection(stream, peer),
            Err(e) => {
                // Usually transient (fd exhaustion, aborted handshake)
                tracing::warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
            tracing::warn!("Rejecting connection from {}: connection limit reached", peer);
            return;
        };

        let handle = Arc::clone(&self.handle);
        let default_top_k = self.default_top_k;

        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, handle, default_top_k).await {
                tracing::debug!("Connection from {} ended with error: {}", peer, e);
            }
            drop(permit);
        });
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    handle: Arc<EngineHandle>,
    default_top_k: usize,
) -> Result<()> {
    loop {
        let request = match read_frame::<ServerRequest, _>(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            // The frame was consumed whole, so the stream is still in sync
            Err(RerankError::Json { source, .. }) => {
                write_frame(
                    &mut stream,
                    &ServerResponse::error(format!("Malformed request: {}", source)),
                )
                .await?;
                continue;
            }
            Err(e) => {
                let _ = write_frame(&mut stream, &ServerResponse::error(e.to_string())).await;
                return Err(e);
            }
        };

        let response = handle_request(&handle, default_top_k, request).await;
        write_frame(&mut stream, &response).await?;
    }
}

/// Answer one request; failures become error responses
pub async fn handle_request(
    handle: &Arc<EngineHandle>,
    default_top_k: usize,
    request: ServerRequest,
) -> ServerResponse {
    match request {
        ServerRequest::Ask(ask) => {
            let top_k = ask.top_k.unwrap_or(default_top_k);
            let handle = Arc::clone(handle);

            // Embedding and scoring are CPU-bound
            let outcome = task::spawn_blocking(move || handle.query(&ask.query, top_k)).await;

            match outcome {
                Ok(Ok(results)) => ServerResponse::Results(AskResponse { results }),
                Ok(Err(e)) => {
                    tracing::debug!("Query failed: {}", e);
                    ServerResponse::error(e.to_string())
                }
                Err(e) => ServerResponse::error(format!("Query task failed: {}", e)),
            }
        }
        ServerRequest::Health => match handle.current() {
            Ok(engine) => ServerResponse::Status {
                status: "ok".to_string(),
                generation: Some(engine.generation().id),
                rows: engine.len(),
            },
            Err(_) => ServerResponse::Status {
                status: "not_ready".to_string(),
                generation: None,
                rows: 0,
            },
        },
    }
}
