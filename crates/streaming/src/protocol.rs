//! Wire formats of the forecast backend.
//!
//! Two endpoints are consumed:
//! - `GET /tiles/{z}/{x}/{y}?originYear=&horizonOffset=&level=&v=` returns a
//!   vector tile; an empty body or 204 is a valid "no data" tile.
//! - `GET /detail?level=&id=&originYear=` returns the JSON time series of one
//!   feature; a missing or empty `years` array means "no detail available".

use foundation::geo::{LngLat, MERCATOR_MAX_LAT};
use foundation::ids::{FeatureRef, GeoLevel};
use foundation::series::ForecastSeries;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Tile coordinate in ZXY scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile containing `p` at zoom `z`.
    pub fn containing(p: LngLat, z: u8) -> Self {
        Self::new(z, lon_to_tile_x(p.lng, z), lat_to_tile_y(p.lat, z))
    }

    /// Tiles in a square of `radius` tiles around the tile containing `center`,
    /// clipped to the valid range and ordered row-major.
    pub fn around(center: LngLat, z: u8, radius: u32) -> Vec<TileCoord> {
        let c = Self::containing(center, z);
        let max = (1u32 << z) - 1;
        let (x0, x1) = (c.x.saturating_sub(radius), (c.x + radius).min(max));
        let (y0, y1) = (c.y.saturating_sub(radius), (c.y + radius).min(max));
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
        for y in y0..=y1 {
            for x in x0..=x1 {
                out.push(TileCoord::new(z, x, y));
            }
        }
        out
    }
}

fn lon_to_tile_x(lon: f64, z: u8) -> u32 {
    let n = 1u32 << z;
    let x = ((lon + 180.0) / 360.0 * n as f64).floor() as i64;
    x.clamp(0, n as i64 - 1) as u32
}

fn lat_to_tile_y(lat: f64, z: u8) -> u32 {
    let n = 1u32 << z;
    let lat_rad = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n as f64).floor() as i64;
    y.clamp(0, n as i64 - 1) as u32
}

/// Query parameters shared by every tile of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileQuery {
    pub level: GeoLevel,
    pub origin_year: i32,
    pub horizon_offset: u32,
    /// Cache-bust token; the staging generation that produced this query.
    pub cache_bust: u64,
}

impl TileQuery {
    pub fn query_string(&self) -> String {
        format!(
            "originYear={}&horizonOffset={}&level={}&v={}",
            self.origin_year, self.horizon_offset, self.level, self.cache_bust
        )
    }
}

/// Base URLs of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tile_url(&self, coord: TileCoord, query: &TileQuery) -> String {
        format!(
            "{}/tiles/{}/{}/{}?{}",
            self.base_url,
            coord.z,
            coord.x,
            coord.y,
            query.query_string()
        )
    }

    pub fn detail_url(&self, feature: &FeatureRef, origin_year: i32) -> String {
        format!(
            "{}/detail?level={}&id={}&originYear={origin_year}",
            self.base_url, feature.level, feature.id
        )
    }
}

/// JSON body of the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailPayload {
    #[serde(default)]
    pub years: Vec<f64>,
    #[serde(default)]
    pub p10: Vec<Option<f64>>,
    #[serde(default)]
    pub p50: Vec<Option<f64>>,
    #[serde(default)]
    pub p90: Vec<Option<f64>>,
    #[serde(default)]
    pub y_med: Vec<Option<f64>>,
    #[serde(default, rename = "historicalValues")]
    pub historical_values: Option<Vec<Option<f64>>>,
}

impl DetailPayload {
    /// `None` when the backend has no detail for the feature.
    ///
    /// Value arrays are aligned to `years`: short arrays are padded with `NaN`,
    /// long ones truncated.
    pub fn into_series(self) -> Option<ForecastSeries> {
        if self.years.is_empty() {
            return None;
        }
        let n = self.years.len();
        let align = |v: Vec<Option<f64>>| -> Vec<f64> {
            let mut out: Vec<f64> = v
                .into_iter()
                .take(n)
                .map(|x| x.unwrap_or(f64::NAN))
                .collect();
            out.resize(n, f64::NAN);
            out
        };
        Some(ForecastSeries {
            years: self.years.iter().map(|y| y.round() as i32).collect(),
            p10: align(self.p10),
            p50: align(self.p50),
            p90: align(self.p90),
            median: align(self.y_med),
            historical: align(self.historical_values.unwrap_or_default()),
        })
    }
}

/// Parses a detail response body; an empty body is "no detail".
pub fn parse_detail(body: &[u8]) -> Result<Option<ForecastSeries>, ProtocolError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    let payload: DetailPayload =
        serde_json::from_slice(body).map_err(|e| ProtocolError::Json(e.to_string()))?;
    Ok(payload.into_series())
}
