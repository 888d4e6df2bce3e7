//! Winner polling after a successful `FINISH`.
//!
//! The poller sends `WINNER::clientId` until the server answers with the final
//! `WINNER` list. A `WINNERWAIT::secs` answer means "not yet": the poller waits
//! the directed number of seconds and sends the identical query again. Any
//! other answer ends polling in [`PollState::Failed`].
use crate::connection::Exchange;
use crate::error::{ClientError, Result};
use crate::frame::{Action, Message};
use crate::pace::{Sleeper, ThreadSleeper};
use std::time::Duration;
use tracing::{error, info};

/// Final winner list for this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerReport {
    /// Winning numbers as sent by the server.
    pub winners: Vec<String>,
    /// Number of `WINNER` queries it took.
    pub queries: u32,
}

impl WinnerReport {
    pub fn count(&self) -> usize {
        self.winners.len()
    }
}

#[derive(Debug)]
pub enum PollState {
    Querying,
    Done(WinnerReport),
    Failed(ClientError),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Querying)
    }
}

pub struct WinnerPoller<S = ThreadSleeper> {
    client_id: String,
    max_queries: Option<u32>,
    sleeper: S,
    state: PollState,
    queries: u32,
}

impl WinnerPoller {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            max_queries: None,
            sleeper: ThreadSleeper,
            state: PollState::Querying,
            queries: 0,
        }
    }
}

impl<S: Sleeper> WinnerPoller<S> {
    /// Give up with [`ClientError::RetriesExhausted`] once `max` queries were all told to wait.
    pub fn with_max_queries(mut self, max: Option<u32>) -> Self {
        self.max_queries = max;
        self
    }

    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> WinnerPoller<T> {
        WinnerPoller {
            client_id: self.client_id,
            max_queries: self.max_queries,
            sleeper,
            state: self.state,
            queries: self.queries,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Issue one query if still polling, waiting first if the server asked for it.
    pub fn step<E: Exchange + ?Sized>(&mut self, exchange: &mut E) -> &PollState {
        if self.state.is_terminal() {
            return &self.state;
        }
        let request = Message::new(Action::Winner, self.client_id.clone());
        self.queries += 1;
        self.state = match exchange.send_and_receive(&request) {
            Ok(resp) => self.on_response(resp),
            Err(e) => PollState::Failed(e),
        };
        match &self.state {
            PollState::Done(report) => info!(
                action = "winner_query",
                result = "success",
                client_id = %self.client_id,
                winners = report.count(),
                queries = report.queries,
            ),
            PollState::Failed(e) => error!(
                action = "winner_query",
                result = "fail",
                client_id = %self.client_id,
                queries = self.queries,
                error = %e,
            ),
            PollState::Querying => {}
        }
        &self.state
    }

    fn on_response(&mut self, resp: Message) -> PollState {
        match resp.action {
            Action::Winner => PollState::Done(WinnerReport {
                winners: parse_winners(&resp.payload),
                queries: self.queries,
            }),
            Action::WinnerWait => {
                let Ok(wait) = resp.payload.trim().parse::<f64>().map_err(|_| ()).and_then(|secs| {
                    Duration::try_from_secs_f64(secs).map_err(|_| ())
                }) else {
                    return PollState::Failed(ClientError::ProtocolError {
                        action: Action::WinnerWait.to_string(),
                        payload: resp.payload,
                    });
                };
                if self.max_queries.is_some_and(|max| self.queries >= max) {
                    return PollState::Failed(ClientError::RetriesExhausted(self.queries));
                }
                info!(
                    action = "winner_query",
                    result = "in_progress",
                    client_id = %self.client_id,
                    wait_secs = wait.as_secs_f64(),
                );
                self.sleeper.sleep(wait);
                PollState::Querying
            }
            other => PollState::Failed(ClientError::ProtocolError {
                action: other.to_string(),
                payload: resp.payload,
            }),
        }
    }

    /// Poll until a terminal state is reached.
    pub fn run<E: Exchange + ?Sized>(mut self, exchange: &mut E) -> Result<WinnerReport> {
        while !self.step(exchange).is_terminal() {}
        match self.state {
            PollState::Done(report) => Ok(report),
            PollState::Failed(e) => Err(e),
            PollState::Querying => unreachable!("loop exits only on a terminal state"),
        }
    }
}

/// `7;42` -> `["7", "42"]`; an empty payload means no winners.
fn parse_winners(payload: &str) -> Vec<String> {
    payload
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
