//! Reachability probe feeding the connectivity monitor.

use std::time::Duration;

use scrawl_core::connectivity::ConnectivityMonitor;
use scrawl_core::Connectivity;
use tokio::task::JoinHandle;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ReachabilityProbe {
    url: String,
    client: reqwest::Client,
}

impl ReachabilityProbe {
    pub fn new(api_base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            url: api_base_url.to_string(),
            client: reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?,
        })
    }

    /// Any HTTP response counts as online, whatever its status.
    pub async fn check(&self) -> Connectivity {
        match self.client.head(&self.url).send().await {
            Ok(_) => Connectivity::Online,
            Err(error) => {
                tracing::debug!("Reachability probe failed: {}", error);
                Connectivity::Offline
            }
        }
    }

    /// Probe every `interval` and record the result.
    pub fn spawn(self, monitor: ConnectivityMonitor, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.set(self.check().await);
            }
        })
    }
}
