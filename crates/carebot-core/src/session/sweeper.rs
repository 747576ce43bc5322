//! Background purge of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::repository::SessionRepository;
use super::service::SessionService;

/// Periodic session cleanup task.
pub struct SessionSweeper;

impl SessionSweeper {
    /// Run `cleanup_expired` every `interval` until `shutdown` is cancelled.
    ///
    /// Failures are logged and the loop keeps going.
    pub fn spawn<R>(
        sessions: Arc<SessionService<R>>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()>
    where
        R: SessionRepository + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Session sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match sessions.cleanup_expired().await {
                            Ok(0) => {}
                            Ok(removed) => debug!(removed, "Swept expired sessions"),
                            Err(e) => warn!(error = %e, "Session sweep failed"),
                        }
                    }
                }
            }
        })
    }
}
