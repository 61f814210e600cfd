// Length-prefixed JSON framing shared by the query server and client

use crate::error::{Result, RerankError};
use crate::retrieval::RankedResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// Maximum frame size (10MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Body of an `ask` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
    /// Falls back to the server's configured default (5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// Body of a successful `ask` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub results: Vec<RankedResult>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerRequest {
    /// Rank passages for a query
    Ask(AskRequest),
    /// Report readiness and the serving generation
    Health,
}

/// Messages sent from server back to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerResponse {
    Results(AskResponse),
    Status {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        generation: Option<Uuid>,
        rows: usize,
    },
    Error {
        message: String,
    },
}

impl ServerResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Read one frame; `None` when the peer closed the stream between frames
pub async fn read_frame<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let length = match reader.read_u32().await {
        Ok(length) => length,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(RerankError::Io {
                source: e,
                context: "Failed to read message length".to_string(),
            })
        }
    };

    if length > MAX_MESSAGE_SIZE {
        return Err(RerankError::Server(format!(
            "Message too large: {} bytes (max: {})",
            length, MAX_MESSAGE_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    reader
        .read_exact(&mut buffer)
        .await
        .map_err(|e| RerankError::Io {
            source: e,
            context: "Failed to read message payload".to_string(),
        })?;

    let message = serde_json::from_slice(&buffer).map_err(|e| RerankError::Json {
        source: e,
        context: "Failed to deserialize message".to_string(),
    })?;

    Ok(Some(message))
}

/// Write one frame: 4-byte big-endian length, then the JSON payload
pub async fn write_frame<T, W>(writer: &mut W, message: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(message).map_err(|e| RerankError::Json {
        source: e,
        context: "Failed to serialize message".to_string(),
    })?;

    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(RerankError::Server(format!(
            "Message too large: {} bytes (max: {})",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    writer
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| RerankError::Io {
            source: e,
            context: "Failed to write message length".to_string(),
        })?;

    writer
        .write_all(&payload)
        .await
        .map_err(|e| RerankError::Io {
            source: e,
            context: "Failed to write message payload".to_string(),
        })?;

    writer.flush().await.map_err(|e| RerankError::Io {
        source: e,
        context: "Failed to flush message".to_string(),
    })?;

    Ok(())
}
