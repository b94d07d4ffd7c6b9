//! Cached speaker discovery.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceControl;
use crate::error::AppError;

/// Caches the set of known speaker names. Discovery is slow (a network
/// scan), so the cached set is served until a caller forces a refresh. The
/// cached set is replaced wholesale — readers never observe a partial
/// replacement.
pub struct DiscoveryCache {
    device: Arc<dyn DeviceControl>,
    speakers: Mutex<Vec<String>>,
}

impl DiscoveryCache {
    pub fn new(device: Arc<dyn DeviceControl>) -> Self {
        Self {
            device,
            speakers: Mutex::new(Vec::new()),
        }
    }

    /// Return the known speaker names in discovery order.
    ///
    /// Without `force`, the cached set is returned when non-empty; an empty
    /// cache falls through to a scan. An empty scan result is valid, not an
    /// error.
    pub async fn discover(&self, force: bool) -> Result<Vec<String>, AppError> {
        if !force {
            let cached = self.speakers.lock().clone();
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let found = self.device.discover_speakers().await?;
        log::info!("discovered {} speaker(s): {}", found.len(), found.join(", "));
        *self.speakers.lock() = found.clone();
        Ok(found)
    }

    /// Cached names without touching the network.
    pub fn cached(&self) -> Vec<String> {
        self.speakers.lock().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::test_support::FakeDevice;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn empty_then_forced_then_cached() {
        let device = Arc::new(FakeDevice::with_discovery(vec![
            vec![],
            vec!["Kitchen".to_string(), "Office".to_string()],
        ]));
        let cache = DiscoveryCache::new(device.clone());

        // Empty network: empty result, no error
        assert_eq!(cache.discover(false).await.unwrap(), Vec::<String>::new());

        // Forced rediscovery replaces the cache, preserving order
        assert_eq!(
            cache.discover(true).await.unwrap(),
            vec!["Kitchen".to_string(), "Office".to_string()]
        );

        // Non-forced now serves the cache without another scan
        let before = device.discover_calls.load(Ordering::SeqCst);
        assert_eq!(
            cache.discover(false).await.unwrap(),
            vec!["Kitchen".to_string(), "Office".to_string()]
        );
        assert_eq!(device.discover_calls.load(Ordering::SeqCst), before);
        assert_eq!(cache.cached(), vec!["Kitchen", "Office"]);
    }
}
