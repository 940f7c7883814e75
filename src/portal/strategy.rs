//! Ordered fallback chains.
//!
//! Each brittle UI step is a list of independent strategies sharing one
//! contract: attempt, confirm, or fall through to the next. A strategy runs
//! exactly once per chain; there is no retry of the same strategy.

use async_trait::async_trait;

use super::driver::{DriverError, PortalSession};
use crate::progress::{ProgressSink, RunEvent};

/// One way of performing a step.
///
/// `Ok(Some(_))` is a confirmed success, `Ok(None)` means the attempt ran but
/// could not confirm its effect, `Err` means it broke along the way. Both of
/// the latter fall through.
#[async_trait]
pub trait Strategy<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, session: &dyn PortalSession) -> Result<Option<T>, DriverError>;
}

/// The winning strategy's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSuccess<T> {
    pub value: T,
    pub strategy: String,
}

/// Run `strategies` in order until one confirms. `None` when all fail.
pub async fn run_chain<T: Send>(
    step: &str,
    session: &dyn PortalSession,
    strategies: &[Box<dyn Strategy<T> + '_>],
    progress: &dyn ProgressSink,
) -> Option<ChainSuccess<T>> {
    for strategy in strategies {
        let reason = match strategy.attempt(session).await {
            Ok(Some(value)) => {
                progress.report(RunEvent::StrategySucceeded {
                    step: step.to_string(),
                    strategy: strategy.name().to_string(),
                });
                return Some(ChainSuccess {
                    value,
                    strategy: strategy.name().to_string(),
                });
            }
            Ok(None) => "not confirmed".to_string(),
            Err(e) => e.to_string(),
        };
        progress.report(RunEvent::StrategyFailed {
            step: step.to_string(),
            strategy: strategy.name().to_string(),
            reason,
        });
    }
    None
}
