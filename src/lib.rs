//! Lottery bet client library.
//!
//! This crate provides the protocol engine used by the `bet_client` binary:
//!
//! - `bet`: bet records and the batched CSV source
//! - `frame`: length-prefixed `ACTION::PAYLOAD` framing
//! - `connection`: one fresh TCP connection per request/response exchange
//! - `submit`: `BET` batches followed by the `FINISH` notice
//! - `winner`: `WINNER` polling with server-directed `WINNERWAIT` backoff
//! - `shutdown`: signal-driven emergency close of the active connection
//! - `client`: the end-to-end run tying the stages together
pub mod bet;
pub mod client;
pub mod connection;
pub mod error;
pub mod frame;
pub mod pace;
pub mod shutdown;
pub mod submit;
pub mod winner;

pub use error::{ClientError, Result};
