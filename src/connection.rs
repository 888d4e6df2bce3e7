//! One-shot request/response exchanges with the aggregator.
//!
//! Every exchange opens a fresh TCP connection, writes one frame, reads one
//! frame back and closes. Nothing is pooled or reused.
use crate::error::{ClientError, Result};
use crate::frame::{self, Message};
use crate::shutdown::ShutdownCoordinator;
use std::net::{Shutdown, TcpStream};
use tracing::{debug, trace};

/// A single request/response round trip.
pub trait Exchange {
    fn send_and_receive(&mut self, request: &Message) -> Result<Message>;
}

pub struct ConnectionManager {
    addr: String,
    shutdown: ShutdownCoordinator,
}

impl ConnectionManager {
    pub fn new(addr: impl Into<String>, shutdown: ShutdownCoordinator) -> Self {
        Self { addr: addr.into(), shutdown }
    }

    /// Connect to the aggregator. An unreachable address is fatal for the client.
    pub fn open(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).map_err(|source| ClientError::ConnectFailed {
            addr: self.addr.clone(),
            source,
        })?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    fn round_trip(stream: &mut TcpStream, request: &Message) -> Result<Message> {
        frame::write_message(stream, request)?;
        frame::decode(stream)
    }
}

impl Exchange for ConnectionManager {
    fn send_and_receive(&mut self, request: &Message) -> Result<Message> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let mut stream = self.open()?;
        let active = self.shutdown.register(&stream)?;
        trace!(addr = %self.addr, action = %request.action, bytes = request.payload.len(), "exchange start");

        let result = Self::round_trip(&mut stream, request);

        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!(addr = %self.addr, error = %e, "close after exchange");
        }
        drop(active);

        match result {
            // A failure caused by the coordinator closing the socket is not a transport fault.
            Err(ClientError::Transport(_) | ClientError::MalformedFrame(_)) if self.shutdown.is_cancelled() => {
                Err(ClientError::Cancelled)
            }
            other => other,
        }
    }
}
