use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampStop {
    pub value: f64,
    pub color: [u8; 4],
}

impl RampStop {
    pub const fn new(value: f64, color: [u8; 4]) -> Self {
        Self { value, color }
    }
}

/// Choropleth colour stops per horizon offset.
///
/// Breakpoints are empirically fitted upstream and treated as configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    pub horizons: BTreeMap<u32, Vec<RampStop>>,
}

impl Default for ColorRamp {
    fn default() -> Self {
        let stops = vec![
            RampStop::new(-0.10, [178, 24, 43, 255]),
            RampStop::new(-0.03, [239, 138, 98, 255]),
            RampStop::new(0.0, [247, 247, 247, 255]),
            RampStop::new(0.03, [103, 169, 207, 255]),
            RampStop::new(0.10, [33, 102, 172, 255]),
        ];
        Self {
            horizons: BTreeMap::from([(0, stops)]),
        }
    }
}

impl ColorRamp {
    /// Stops of the closest configured horizon at or below `horizon`, else the first.
    pub fn paint_for(&self, horizon: u32) -> &[RampStop] {
        self.horizons
            .range(..=horizon)
            .next_back()
            .or_else(|| self.horizons.iter().next())
            .map(|(_, stops)| stops.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::{ColorRamp, RampStop};
    use std::collections::BTreeMap;

    #[test]
    fn falls_back_to_nearest_lower_horizon() {
        let ramp = ColorRamp {
            horizons: BTreeMap::from([
                (2, vec![RampStop::new(0.0, [0; 4])]),
                (6, vec![RampStop::new(0.0, [0; 4]), RampStop::new(1.0, [255; 4])]),
            ]),
        };
        assert_eq!(ramp.paint_for(0).len(), 1);
        assert_eq!(ramp.paint_for(5).len(), 1);
        assert_eq!(ramp.paint_for(6).len(), 2);
        assert_eq!(ramp.paint_for(40).len(), 2);
    }

    #[test]
    fn parses_from_json_with_string_keys() {
        let ramp: ColorRamp =
            serde_json::from_str(r#"{"horizons":{"12":[{"value":0.5,"color":[1,2,3,255]}]}}"#)
                .unwrap();
        assert_eq!(ramp.paint_for(12)[0].color, [1, 2, 3, 255]);
        assert!(ColorRamp { horizons: BTreeMap::new() }.paint_for(3).is_empty());
    }
}
