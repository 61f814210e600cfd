// Client side of the query protocol

use super::protocol::{read_frame, write_frame, AskRequest, ServerRequest, ServerResponse};
use crate::error::{Result, RerankError};
use crate::retrieval::RankedResult;
use tokio::net::TcpStream;

/// Sends one request per connection to a running query server
pub struct QueryClient {
    addr: String,
}

impl QueryClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Connect, send a request, and return the response
    pub async fn send(&self, request: &ServerRequest) -> Result<ServerResponse> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RerankError::Io {
                source: e,
                context: format!("Failed to connect to query server at {}", self.addr),
            })?;

        write_frame(&mut stream, request).await?;

        read_frame(&mut stream)
            .await?
            .ok_or_else(|| RerankError::Server("Connection closed before response".to_string()))
    }

    /// Ask for ranked results; server-side failures become [`RerankError::Server`]
    pub async fn ask(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RankedResult>> {
        let request = ServerRequest::Ask(AskRequest {
            query: query.to_string(),
            top_k,
        });

        match self.send(&request).await? {
            ServerResponse::Results(response) => Ok(response.results),
            ServerResponse::Error { message } => Err(RerankError::Server(message)),
            other => Err(RerankError::Server(format!(
                "Unexpected response: {:?}",
                other
            ))),
        }
    }
}
