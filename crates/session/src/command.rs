use serde::{Deserialize, Serialize};

/// Commands issued from outside the map (e.g. a chat assistant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalCommand {
    /// Animates the camera; once the map settles, selects `select_feature_id`
    /// or else the feature under the new centre.
    FlyToLocation {
        lat: f64,
        lng: f64,
        #[serde(default)]
        zoom: Option<f64>,
        #[serde(default, rename = "selectFeatureId", alias = "select_feature_id")]
        select_feature_id: Option<String>,
    },
    ClearSelection,
}
