//! Batched bet submission followed by the `FINISH` notice.
use crate::bet::{BetSource, encode_batch};
use crate::connection::Exchange;
use crate::error::{ClientError, Result};
use crate::frame::{Action, Message};
use crate::pace::{Sleeper, ThreadSleeper};
use std::time::Duration;
use tracing::{debug, error, info};

/// Totals for a submission run that reached an acknowledged `FINISH`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    pub batches: usize,
    pub bets: usize,
}

pub struct SubmissionEngine<S = ThreadSleeper> {
    client_id: String,
    batch_size: usize,
    loop_period: Duration,
    sleeper: S,
}

impl SubmissionEngine {
    pub fn new(client_id: impl Into<String>, batch_size: usize, loop_period: Duration) -> Self {
        Self {
            client_id: client_id.into(),
            batch_size: batch_size.max(1),
            loop_period,
            sleeper: ThreadSleeper,
        }
    }
}

impl<S: Sleeper> SubmissionEngine<S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> SubmissionEngine<T> {
        SubmissionEngine {
            client_id: self.client_id,
            batch_size: self.batch_size,
            loop_period: self.loop_period,
            sleeper,
        }
    }

    /// Send every batch of `source` in order, then `FINISH`.
    ///
    /// The first failed or rejected batch stops the run; later batches and
    /// `FINISH` are not sent.
    pub fn run<E, B>(&self, exchange: &mut E, source: &mut B) -> Result<SubmissionReport>
    where
        E: Exchange + ?Sized,
        B: BetSource + ?Sized,
    {
        let mut report = SubmissionReport::default();
        loop {
            let (bets, has_more) = source.next_batch(self.batch_size)?;
            if !bets.is_empty() {
                let request = Message::new(Action::Bet, encode_batch(&self.client_id, &bets));
                let outcome = exchange
                    .send_and_receive(&request)
                    .and_then(|resp| expect_ok("BET", resp));
                if let Err(e) = outcome {
                    error!(
                        action = "bet_batch",
                        result = "fail",
                        client_id = %self.client_id,
                        batch = report.batches + 1,
                        bets = bets.len(),
                        error = %e,
                    );
                    return Err(e);
                }
                report.batches += 1;
                report.bets += bets.len();
                info!(
                    action = "bet_batch",
                    result = "success",
                    client_id = %self.client_id,
                    batch = report.batches,
                    bets = bets.len(),
                );
                for bet in &bets {
                    debug!(action = "bet_sent", result = "success", document = %bet.document, number = %bet.number);
                }
            }
            if !has_more {
                break;
            }
            self.sleeper.sleep(self.loop_period);
        }

        self.finish(exchange)?;
        info!(
            action = "loop_finished",
            result = "success",
            client_id = %self.client_id,
            batches = report.batches,
            bets = report.bets,
        );
        Ok(report)
    }

    fn finish<E: Exchange + ?Sized>(&self, exchange: &mut E) -> Result<()> {
        let request = Message::new(Action::Finish, self.client_id.clone());
        match exchange.send_and_receive(&request).and_then(|resp| expect_ok("FINISH", resp)) {
            Ok(()) => {
                info!(action = "finish", result = "success", client_id = %self.client_id);
                Ok(())
            }
            Err(e) => {
                error!(action = "finish", result = "fail", client_id = %self.client_id, error = %e);
                Err(e)
            }
        }
    }
}

fn expect_ok(request: &str, resp: Message) -> Result<()> {
    match resp.action {
        Action::Ok => Ok(()),
        other => Err(ClientError::BatchRejected {
            request: request.to_string(),
            action: other.to_string(),
        }),
    }
}
