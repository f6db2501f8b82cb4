//! Reverse geocoding boundary with an injected result cache

use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use crate::core::GeoPoint;
use crate::processing::{BoundedCache, Cache};

/// Decimal places kept in cache keys (about 11 m at the equator)
const KEY_SCALE: f64 = 10_000.0;

pub const DEFAULT_GEOCODE_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    #[error("no address found for this position")]
    NotFound,
    #[error("coordinates are not finite")]
    InvalidPoint,
    #[error("geocoding service unavailable: {0}")]
    Unavailable(String),
}

/// Cache key: coordinates rounded to four decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeocodeKey {
    latitude_e4: i64,
    longitude_e4: i64,
}

impl GeocodeKey {
    pub fn from_point(point: GeoPoint) -> Option<Self> {
        if !point.latitude.is_finite() || !point.longitude.is_finite() {
            return None;
        }
        Some(Self {
            latitude_e4: (point.latitude * KEY_SCALE).round() as i64,
            longitude_e4: (point.longitude * KEY_SCALE).round() as i64,
        })
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(
            self.latitude_e4 as f64 / KEY_SCALE,
            self.longitude_e4 as f64 / KEY_SCALE,
        )
    }
}

/// Turns a position into a human readable address
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, point: GeoPoint) -> Result<String, GeocodeError>;
}

/// Geocoder front that answers repeated lookups from a bounded cache
///
/// Failures are never cached.
pub struct CachedGeocoder {
    geocoder: Arc<dyn ReverseGeocoder>,
    cache: Arc<dyn Cache<GeocodeKey, String>>,
}

impl CachedGeocoder {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, cache: Arc<dyn Cache<GeocodeKey, String>>) -> Self {
        Self { geocoder, cache }
    }

    /// Use a private LRU cache of `capacity` entries
    pub fn with_capacity(geocoder: Arc<dyn ReverseGeocoder>, capacity: usize) -> Self {
        Self::new(geocoder, Arc::new(BoundedCache::new(capacity)))
    }

    pub fn cache(&self) -> &Arc<dyn Cache<GeocodeKey, String>> {
        &self.cache
    }
}

#[async_trait]
impl ReverseGeocoder for CachedGeocoder {
    async fn reverse(&self, point: GeoPoint) -> Result<String, GeocodeError> {
        let key = GeocodeKey::from_point(point).ok_or(GeocodeError::InvalidPoint)?;
        if let Some(address) = self.cache.get(&key) {
            debug!(?key, "geocode cache hit");
            return Ok(address);
        }

        let address = self.geocoder.reverse(point).await?;
        self.cache.set(key, address.clone());
        Ok(address)
    }
}
