//! Generation-tagged store pairs.

use std::sync::Arc;

use super::state::Shared;
use crate::error_handling::EventKind;
use crate::geoip::GeoStore;

/// City and ISP stores opened by the same reload.
///
/// The owner holds one `Arc<LoadedStores>` and every in-flight lookup holds a
/// clone, so a superseded pair is dropped only after the last lookup using it
/// finishes.
pub(crate) struct LoadedStores {
    pub(crate) generation: u64,
    pub(crate) city: Arc<dyn GeoStore>,
    pub(crate) isp: Arc<dyn GeoStore>,
    shared: Arc<Shared>,
}

impl LoadedStores {
    pub(crate) fn new(
        generation: u64,
        city: Arc<dyn GeoStore>,
        isp: Arc<dyn GeoStore>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            generation,
            city,
            isp,
            shared,
        }
    }
}

impl Drop for LoadedStores {
    fn drop(&mut self) {
        log::debug!("Released geo stores generation {}", self.generation);
        self.shared.stats.increment(EventKind::StoreReleased);
    }
}
