//! Mapbox Tilequery client for urban suitability signals.
//!
//! One tilequery call per candidate returns nearby features from the
//! `road`, `building` and `landuse` layers of the streets tileset. The
//! per-layer minimum distances and the nearest land-use class become the
//! candidate's [`UrbanSignals`].

use async_trait::async_trait;
use serde::Deserialize;

use sitescout_core::{EngineConfig, UrbanSignals};

use crate::error::ProviderError;
use crate::providers::UrbanProvider;

const TILESET: &str = "mapbox.mapbox-streets-v8";
const PROBE_RADIUS_M: u32 = 1_000;
const PROBE_LIMIT: u32 = 50;

pub struct MapboxClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TilequeryResponse {
    features: Vec<TilequeryFeature>,
}

#[derive(Debug, Deserialize)]
struct TilequeryFeature {
    properties: TilequeryProperties,
}

#[derive(Debug, Deserialize)]
struct TilequeryProperties {
    tilequery: TilequeryMeta,
    #[serde(default)]
    class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TilequeryMeta {
    distance: f64,
    layer: String,
}

impl MapboxClient {
    /// Builds a client from the engine configuration. Returns `None` when
    /// no access token is set; the caller falls back to a disabled
    /// provider.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        let token = config.mapbox_token.clone()?;
        Some(MapboxClient {
            http: reqwest::Client::new(),
            base_url: config.urban_base_url.clone(),
            token,
            timeout_ms: config.urban_timeout_ms,
        })
    }

    /// Overrides the API base URL. Used by tests to point at a mock
    /// server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn tilequery(&self, lat: f64, lng: f64) -> Result<TilequeryResponse, ProviderError> {
        let url = format!(
            "{}/v4/{TILESET}/tilequery/{lng},{lat}.json",
            self.base_url.trim_end_matches('/')
        );
        let request = self
            .http
            .get(&url)
            .query(&[
                ("radius", PROBE_RADIUS_M.to_string()),
                ("limit", PROBE_LIMIT.to_string()),
                ("layers", "road,building,landuse".to_owned()),
                ("access_token", self.token.clone()),
            ])
            .send();

        let response = tokio::time::timeout(
            std::time::Duration::from_millis(self.timeout_ms),
            request,
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.timeout_ms))??;

        let body = response.error_for_status()?.text().await?;
        serde_json::from_str(&body).map_err(|source| ProviderError::Deserialize {
            context: format!("tilequery at ({lat}, {lng})"),
            source,
        })
    }
}

#[async_trait]
impl UrbanProvider for MapboxClient {
    async fn probe(&self, lat: f64, lng: f64) -> Result<Option<UrbanSignals>, ProviderError> {
        let response = self.tilequery(lat, lng).await?;
        if response.features.is_empty() {
            return Ok(None);
        }

        let mut road_distance_m: Option<f64> = None;
        let mut building_distance_m: Option<f64> = None;
        let mut landuse: Option<(f64, String)> = None;

        for feature in response.features {
            let d = feature.properties.tilequery.distance;
            match feature.properties.tilequery.layer.as_str() {
                "road" => {
                    if road_distance_m.is_none_or(|best| d < best) {
                        road_distance_m = Some(d);
                    }
                }
                "building" => {
                    if building_distance_m.is_none_or(|best| d < best) {
                        building_distance_m = Some(d);
                    }
                }
                "landuse" => {
                    if let Some(class) = feature.properties.class {
                        if landuse.as_ref().is_none_or(|(best, _)| d < *best) {
                            landuse = Some((d, class));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Some(UrbanSignals {
            road_distance_m,
            building_distance_m,
            landuse: landuse.map(|(_, class)| class),
        }))
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
