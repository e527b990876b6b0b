//! Robust y-axis domain derived from the features currently on screen.

use std::collections::BTreeMap;

use foundation::ids::FeatureId;
use foundation::series::ForecastSeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::statistics::Statistics;

/// One feature as rendered on the routed level after the map settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedFeature {
    pub id: FeatureId,
    pub value: f64,
    #[serde(default = "nan")]
    pub p10: f64,
    #[serde(default = "nan")]
    pub p90: f64,
    /// Additive properties, e.g. parcel or housing-unit counts.
    #[serde(default)]
    pub totals: BTreeMap<String, f64>,
}

fn nan() -> f64 {
    f64::NAN
}

impl RenderedFeature {
    pub fn new(id: impl Into<String>, value: f64, p10: f64, p90: f64) -> Self {
        Self {
            id: FeatureId::new(id),
            value,
            p10,
            p90,
            totals: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ViewportDomain {
    pub lo: f64,
    pub hi: f64,
    pub frozen: bool,
}

impl ViewportDomain {
    fn widened(lo: f64, hi: f64, frozen: bool) -> Self {
        if lo < hi {
            return Self { lo, hi, frozen };
        }
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.05 };
        Self {
            lo: lo - pad,
            hi: hi + pad,
            frozen,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewportDomainCalculator {
    low_percentile: f64,
    high_percentile: f64,
    frozen: bool,
    domain: Option<ViewportDomain>,
}

impl ViewportDomainCalculator {
    pub fn new(low_percentile: f64, high_percentile: f64) -> Self {
        Self {
            low_percentile,
            high_percentile,
            frozen: false,
            domain: None,
        }
    }

    pub fn domain(&self) -> Option<ViewportDomain> {
        self.domain
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freezing keeps the current domain through pans until unfrozen.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
        if let Some(d) = self.domain.as_mut() {
            d.frozen = frozen;
        }
    }

    /// Recomputes from a settled viewport. Returns the new domain when it
    /// changed; frozen calculators and empty samples keep the previous one.
    pub fn recompute(&mut self, rendered: &[RenderedFeature]) -> Option<ViewportDomain> {
        if self.frozen {
            debug!(features = rendered.len(), "viewport domain frozen; skipping");
            return None;
        }
        let samples: Vec<f64> = rendered
            .iter()
            .flat_map(|f| [f.value, f.p10, f.p90])
            .collect();
        let (lo, hi) =
            Statistics::percentile_band(samples, self.low_percentile, self.high_percentile)?;
        let next = ViewportDomain::widened(lo, hi, false);
        if self.domain == Some(next) {
            return None;
        }
        debug!(lo = next.lo, hi = next.hi, "viewport domain recomputed");
        self.domain = Some(next);
        self.domain
    }

    /// Ambient domain extended so the displayed series' own median and
    /// historical lines are never clipped. Never narrower than
    /// [`domain`](Self::domain).
    pub fn display_domain<'a>(
        &self,
        displayed: impl IntoIterator<Item = &'a ForecastSeries>,
    ) -> Option<ViewportDomain> {
        let own = Statistics::min_max(
            displayed
                .into_iter()
                .flat_map(|s| s.own_line_values())
                .collect::<Vec<_>>(),
        );
        match (self.domain, own) {
            (None, None) => None,
            (Some(d), None) => Some(d),
            (None, Some((lo, hi))) => Some(ViewportDomain::widened(lo, hi, self.frozen)),
            (Some(d), Some((lo, hi))) => Some(ViewportDomain {
                lo: d.lo.min(lo),
                hi: d.hi.max(hi),
                frozen: d.frozen,
            }),
        }
    }
}
