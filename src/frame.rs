//! Length-prefixed wire framing.
//!
//! Every unit on the wire is `[u32 length, big-endian][ACTION::PAYLOAD]`, where
//! the length counts the bytes of `ACTION::PAYLOAD`. The payload is split on the
//! first `::` only, so payload data may itself carry `:`-separated fields.
use crate::error::{ClientError, Result};
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

/// Width of the length prefix.
pub const LEN_BYTES: usize = 4;
/// Separator between the action token and its payload.
pub const DELIMITER: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Bet,
    Finish,
    Winner,
    Ok,
    WinnerWait,
    /// Any token this client does not know; kept verbatim for logging.
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Bet => "BET",
            Action::Finish => "FINISH",
            Action::Winner => "WINNER",
            Action::Ok => "OK",
            Action::WinnerWait => "WINNERWAIT",
            Action::Other(s) => s,
        }
    }

    pub fn parse(token: &str) -> Self {
        match token {
            "BET" => Action::Bet,
            "FINISH" => Action::Finish,
            "WINNER" => Action::Winner,
            "OK" => Action::Ok,
            "WINNERWAIT" => Action::WinnerWait,
            other => Action::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub action: Action,
    pub payload: String,
}

impl Message {
    pub fn new(action: Action, payload: impl Into<String>) -> Self {
        Self { action, payload: payload.into() }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.action, DELIMITER, self.payload)
    }
}

/// Encode a message into a complete frame, length prefix included.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let body = msg.to_string().into_bytes();
    let len = u32::try_from(body.len()).map_err(|_| ClientError::FrameTooLarge(body.len()))?;
    let mut out = Vec::with_capacity(LEN_BYTES + body.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse the bytes that followed a length prefix.
pub fn parse_body(body: Vec<u8>) -> Result<Message> {
    let text = String::from_utf8(body)
        .map_err(|e| ClientError::MalformedFrame(format!("payload is not utf-8: {e}")))?;
    let Some((action, payload)) = text.split_once(DELIMITER) else {
        return Err(ClientError::MalformedFrame(format!("missing '{DELIMITER}' in {text:?}")));
    };
    if action.is_empty() {
        return Err(ClientError::MalformedFrame(format!("empty action in {text:?}")));
    }
    Ok(Message::new(Action::parse(action), payload))
}

/// Read until `buf` is full or the stream ends; returns the number of bytes filled.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read exactly one frame from `r`.
///
/// Partial reads are retried until the declared length is satisfied. A stream
/// that closes before sending anything is a transport failure; one that closes
/// partway through a frame is a malformed frame.
pub fn decode<R: Read>(r: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; LEN_BYTES];
    match read_full(r, &mut len_buf)? {
        0 => {
            return Err(ClientError::Transport(io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed before a response was received",
            )));
        }
        LEN_BYTES => {}
        n => {
            return Err(ClientError::MalformedFrame(format!(
                "stream closed after {n} of {LEN_BYTES} length bytes"
            )));
        }
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut body = vec![0u8; len];
    let got = read_full(r, &mut body)?;
    if got < len {
        return Err(ClientError::MalformedFrame(format!(
            "stream closed after {got} of {len} payload bytes"
        )));
    }
    parse_body(body)
}

/// Encode `msg` and write the whole frame, looping over partial writes.
pub fn write_message<W: Write>(w: &mut W, msg: &Message) -> Result<()> {
    let frame = encode(msg)?;
    w.write_all(&frame)?;
    w.flush()?;
    Ok(())
}
