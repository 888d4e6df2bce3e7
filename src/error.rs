//! Error taxonomy shared by every stage of the client.
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The aggregator could not be reached. No exchange is possible afterwards.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Write/read failure or unexpected disconnect mid-exchange.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Response does not parse as `ACTION::PAYLOAD` or ended short of its declared length.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Outgoing payload does not fit the 4-byte length field.
    #[error("frame of {0} bytes exceeds the u32 length field")]
    FrameTooLarge(usize),

    /// Well-formed response carrying an action the current state does not accept.
    #[error("unexpected response {action}::{payload}")]
    ProtocolError { action: String, payload: String },

    /// Server answered a `BET` or `FINISH` with something other than `OK`.
    #[error("server rejected {request}: got {action}")]
    BatchRejected { request: String, action: String },

    #[error("reading bets failed: {0}")]
    SourceIo(#[source] io::Error),

    #[error("invalid bet record at line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("winner still pending after {0} queries")]
    RetriesExhausted(u32),

    /// The shutdown coordinator fired before or during the exchange.
    #[error("exchange cancelled by shutdown")]
    Cancelled,
}

impl ClientError {
    /// Whether the whole client must abort, as opposed to just the current pipeline stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::ConnectFailed { .. })
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
