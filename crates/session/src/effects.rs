use compute::viewport::{RenderedFeature, ViewportDomain};
use foundation::geo::LngLat;
use foundation::ids::{FeatureId, FeatureRef, GeoLevel};
use foundation::series::ForecastSeries;
use serde::{Deserialize, Serialize};
use streaming::request::FetchTicket;

/// Work the host must perform on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch `url` and hand the result back via `MapSession::detail_loaded`.
    FetchDetail {
        ticket: FetchTicket,
        feature: FeatureRef,
        url: String,
    },
    FlyTo { center: LngLat, zoom: f64 },
    /// Re-query the fine-grained overlay after panning settled.
    RefreshOverlay {
        level: GeoLevel,
        center: LngLat,
        zoom: f64,
    },
}

/// Produced events for chart and tooltip consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    FeatureHover {
        feature: Option<FeatureRef>,
    },
    FeatureSelect {
        feature: Option<FeatureRef>,
    },
    /// `series` is `None` for confirmed-empty or failed details.
    SeriesUpdated {
        feature: Option<FeatureRef>,
        series: Option<ForecastSeries>,
    },
    ComparisonUpdated {
        feature: Option<FeatureRef>,
        series: Option<ForecastSeries>,
    },
    DomainUpdated {
        domain: ViewportDomain,
    },
    HorizonSwapped {
        horizon: u32,
        generation: u64,
    },
}

/// What the map reported after it finished a render pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdleReport {
    /// Features rendered on the routed level within the viewport.
    #[serde(default)]
    pub rendered: Vec<RenderedFeature>,
    /// Feature under the viewport centre, if any.
    #[serde(default)]
    pub center_feature: Option<FeatureId>,
}

#[cfg(test)]
mod tests {
    use super::{EngineEvent, IdleReport};
    use foundation::ids::{FeatureRef, GeoLevel};

    #[test]
    fn events_serialize_as_tagged_json() {
        let event = EngineEvent::FeatureSelect {
            feature: Some(FeatureRef::new(GeoLevel::Tract, "48201")),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"feature_select","feature":{"level":"tract","id":"48201"}}"#
        );
    }

    #[test]
    fn idle_report_fields_are_optional() {
        let report: IdleReport = serde_json::from_str("{}").unwrap();
        assert!(report.rendered.is_empty());
        assert_eq!(report.center_feature, None);
    }
}
