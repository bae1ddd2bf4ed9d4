//! Fixed-rate driver for [`Network::tick`].

use super::network::Network;
use crate::error::NetworkError;
use std::future::Future;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

impl Network {
    /// Starts the network, ticks at the configured rate until `shutdown`
    /// resolves, then stops it.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that completes when the network should stop
    ///
    /// # Returns
    ///
    /// The number of ticks run, or the error that prevented startup.
    pub async fn run<S>(mut self, shutdown: S) -> Result<u64, NetworkError>
    where
        S: Future<Output = ()>,
    {
        self.start()?;

        let period = self.config().tick_interval();
        let mut ticker = interval(period);
        // A slow tick is not made up for; the loop just falls back into step
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Ticking every {:?}", period);
        tokio::pin!(shutdown);

        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(tick);
                    tick += 1;
                }
                _ = &mut shutdown => {
                    debug!("Tick loop received shutdown signal after {} ticks", tick);
                    break;
                }
            }
        }

        self.stop().await;
        Ok(tick)
    }
}
