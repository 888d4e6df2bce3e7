//! End-to-end client run: submit every bet, then poll for winners.
use crate::bet::BetSource;
use crate::connection::{ConnectionManager, Exchange};
use crate::error::Result;
use crate::shutdown::ShutdownCoordinator;
use crate::submit::{SubmissionEngine, SubmissionReport};
use crate::winner::{WinnerPoller, WinnerReport};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client identity embedded in every outgoing payload.
    pub id: String,
    /// Aggregator `host:port`.
    pub server_address: String,
    /// Fixed pause between consecutive batches.
    pub loop_period: Duration,
    /// Maximum bets per `BET` frame.
    pub batch_size: usize,
    /// Optional cap on `WINNER` queries answered with `WINNERWAIT`.
    pub max_winner_queries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOutcome {
    pub submission: SubmissionReport,
    pub winners: WinnerReport,
}

pub struct Client {
    config: ClientConfig,
    shutdown: ShutdownCoordinator,
}

impl Client {
    pub fn new(config: ClientConfig, shutdown: ShutdownCoordinator) -> Self {
        Self { config, shutdown }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the whole pipeline against the configured aggregator.
    pub fn run<B: BetSource + ?Sized>(&self, source: &mut B) -> Result<ClientOutcome> {
        let mut conn = ConnectionManager::new(self.config.server_address.clone(), self.shutdown.clone());
        self.run_with(&mut conn, source)
    }

    /// Same as [`Client::run`] over an arbitrary exchange.
    pub fn run_with<E, B>(&self, exchange: &mut E, source: &mut B) -> Result<ClientOutcome>
    where
        E: Exchange + ?Sized,
        B: BetSource + ?Sized,
    {
        let cfg = &self.config;
        info!(
            action = "client_start",
            client_id = %cfg.id,
            server = %cfg.server_address,
            batch_size = cfg.batch_size,
            loop_period_ms = cfg.loop_period.as_millis() as u64,
        );
        let submission = SubmissionEngine::new(cfg.id.clone(), cfg.batch_size, cfg.loop_period)
            .run(exchange, source)?;
        let winners = WinnerPoller::new(cfg.id.clone())
            .with_max_queries(cfg.max_winner_queries)
            .run(exchange)?;
        Ok(ClientOutcome { submission, winners })
    }
}
