//! Pluggable external data providers.
//!
//! Anchor counting is synchronous (the index is an in-memory snapshot),
//! urban probing is async because it is backed by an HTTP API. Both have
//! no-op implementations so the pipeline runs with zero external services
//! configured.

use async_trait::async_trait;

use sitescout_core::UrbanSignals;

use crate::error::ProviderError;
use crate::geo::haversine_m;

pub mod mapbox;

pub use mapbox::MapboxClient;

/// Counts anchor points of interest (malls, transit hubs, big-box
/// retailers) near a candidate. `None` means no anchor data covers the
/// location, which is distinct from a covered location with zero anchors.
pub trait AnchorProvider: Send + Sync {
    fn anchor_count(&self, lat: f64, lng: f64) -> Option<u32>;
}

/// No anchor dataset configured; every candidate reports unknown.
pub struct NoAnchorData;

impl AnchorProvider for NoAnchorData {
    fn anchor_count(&self, _lat: f64, _lng: f64) -> Option<u32> {
        None
    }
}

/// In-memory anchor index over a fixed POI list.
pub struct StaticAnchorIndex {
    pois: Vec<(f64, f64)>,
    radius_m: f64,
}

impl StaticAnchorIndex {
    #[must_use]
    pub fn new(pois: Vec<(f64, f64)>, radius_m: f64) -> Self {
        StaticAnchorIndex { pois, radius_m }
    }
}

impl AnchorProvider for StaticAnchorIndex {
    fn anchor_count(&self, lat: f64, lng: f64) -> Option<u32> {
        let count = self
            .pois
            .iter()
            .filter(|(plat, plng)| haversine_m(lat, lng, *plat, *plng) <= self.radius_m)
            .count();
        #[allow(clippy::cast_possible_truncation)]
        let count = count as u32;
        Some(count)
    }
}

/// Probes urban suitability signals (road access, building fabric,
/// land use) for one location.
///
/// A provider failure is an `Err` the caller degrades on; a healthy
/// provider with no coverage returns `Ok(None)`.
#[async_trait]
pub trait UrbanProvider: Send + Sync {
    async fn probe(&self, lat: f64, lng: f64) -> Result<Option<UrbanSignals>, ProviderError>;

    /// Whether the provider is actually wired to a data source. Disabled
    /// providers skip urban filtering entirely.
    fn is_enabled(&self) -> bool;
}

/// Urban probing turned off (no token configured or toggle disabled).
pub struct UrbanDisabled;

#[async_trait]
impl UrbanProvider for UrbanDisabled {
    async fn probe(&self, _lat: f64, _lng: f64) -> Result<Option<UrbanSignals>, ProviderError> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_anchor_data_reports_unknown() {
        assert_eq!(NoAnchorData.anchor_count(52.52, 13.405), None);
    }

    #[test]
    fn static_index_counts_within_radius_only() {
        let index = StaticAnchorIndex::new(vec![(52.521, 13.406), (53.0, 14.0)], 500.0);
        assert_eq!(index.anchor_count(52.52, 13.405), Some(1));
    }

    #[test]
    fn static_index_distinguishes_zero_from_unknown() {
        let index = StaticAnchorIndex::new(vec![(53.0, 14.0)], 500.0);
        assert_eq!(index.anchor_count(52.52, 13.405), Some(0));
    }

    #[tokio::test]
    async fn disabled_provider_probes_nothing() {
        let provider = UrbanDisabled;
        assert!(!provider.is_enabled());
        assert!(provider.probe(52.52, 13.405).await.unwrap().is_none());
    }
}
