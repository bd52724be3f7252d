//! Composite transport that dials one of several candidates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::strategy::{strategy_for, Strategy};
use crate::config::StrategyKind;
use crate::core::{IoStream, Listener, Transport, TransportError, TRANSPORT_OPTIMIZER};

/// Transport that picks among candidate transports with a [`Strategy`].
///
/// Only the client role is supported; [`Transport::listen`] fails with
/// [`TransportError::Unsupported`].
pub struct Optimizer {
    candidates: Vec<Arc<dyn Transport>>,
    strategy: Box<dyn Strategy>,
    dial_timeout: Duration,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.candidates.iter().map(|c| c.name()).collect();
        f.debug_struct("Optimizer")
            .field("candidates", &names)
            .field("strategy", &self.strategy.kind())
            .field("dial_timeout", &self.dial_timeout)
            .finish()
    }
}

impl Optimizer {
    /// Optimizer over `candidates` using the named strategy.
    ///
    /// `dial_timeout` bounds each candidate attempt. A timed-out attempt
    /// counts as a failure and the plan moves on to the next candidate.
    /// It doubles as the latency penalty for failed attempts under
    /// `minimizeDialDuration`.
    pub fn new(
        candidates: Vec<Arc<dyn Transport>>,
        strategy: StrategyKind,
        dial_timeout: Duration,
    ) -> Self {
        let strategy = strategy_for(strategy, candidates.len(), dial_timeout);
        Self::with_strategy(candidates, strategy, dial_timeout)
    }

    /// Optimizer with a caller-supplied strategy.
    pub fn with_strategy(
        candidates: Vec<Arc<dyn Transport>>,
        strategy: Box<dyn Strategy>,
        dial_timeout: Duration,
    ) -> Self {
        Self {
            candidates,
            strategy,
            dial_timeout,
        }
    }

    /// Candidate transports in declaration order.
    pub fn candidates(&self) -> &[Arc<dyn Transport>] {
        &self.candidates
    }

    /// Active strategy.
    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    async fn dial_candidates(&self) -> Result<IoStream, TransportError> {
        let mut attempts = 0;
        let mut last = None;

        for index in self.strategy.plan() {
            let Some(candidate) = self.candidates.get(index) else {
                continue;
            };
            attempts += 1;
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.dial_timeout, candidate.dial())
                .await
                .unwrap_or(Err(TransportError::DialTimeout(self.dial_timeout)));
            let elapsed = started.elapsed();
            match outcome {
                Ok(stream) => {
                    self.strategy.record_outcome(index, true, elapsed);
                    tracing::debug!(
                        strategy = %self.strategy.kind(),
                        candidate = index,
                        transport = candidate.name(),
                        ?elapsed,
                        "optimizer dial succeeded"
                    );
                    return Ok(stream);
                }
                Err(err) => {
                    self.strategy.record_outcome(index, false, elapsed);
                    tracing::warn!(
                        strategy = %self.strategy.kind(),
                        candidate = index,
                        transport = candidate.name(),
                        error = %err,
                        "optimizer candidate failed"
                    );
                    last = Some(err);
                }
            }
        }

        match last {
            Some(last) => Err(TransportError::AllCandidatesFailed {
                attempts,
                last: Box::new(last),
            }),
            None => Err(TransportError::NoCandidates),
        }
    }
}

#[async_trait]
impl Transport for Optimizer {
    fn name(&self) -> &str {
        TRANSPORT_OPTIMIZER
    }

    async fn dial(&self) -> Result<IoStream, TransportError> {
        self.dial_candidates().await
    }

    async fn listen(&self, _address: &str) -> Result<Box<dyn Listener>, TransportError> {
        Err(TransportError::Unsupported {
            operation: "listen",
            transport: TRANSPORT_OPTIMIZER.to_string(),
        })
    }
}
