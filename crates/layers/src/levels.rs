use foundation::ids::GeoLevel;
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Zoom range `[min_zoom, max_zoom)` routed to one geography level.
///
/// The finest level's range is closed at [`MAX_ZOOM`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub level: GeoLevel,
    pub source_layer: String,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl LevelRange {
    pub fn new(level: GeoLevel, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            level,
            source_layer: level.as_str().to_string(),
            min_zoom,
            max_zoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelTableError {
    WrongCount { found: usize },
    OutOfOrder { level: GeoLevel },
    EmptyRange { level: GeoLevel },
    StartsAbove { min_zoom: f64 },
    EndsBelow { max_zoom: f64 },
    Gap { below: GeoLevel, above: GeoLevel },
    Overlap { below: GeoLevel, above: GeoLevel },
}

impl std::fmt::Display for LevelTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelTableError::WrongCount { found } => {
                write!(f, "expected {} geography levels, found {found}", GeoLevel::ALL.len())
            }
            LevelTableError::OutOfOrder { level } => {
                write!(f, "level {level} is out of coarse-to-fine order")
            }
            LevelTableError::EmptyRange { level } => write!(f, "level {level} has an empty zoom range"),
            LevelTableError::StartsAbove { min_zoom } => {
                write!(f, "first level starts at zoom {min_zoom}, expected {MIN_ZOOM}")
            }
            LevelTableError::EndsBelow { max_zoom } => {
                write!(f, "last level ends at zoom {max_zoom}, expected {MAX_ZOOM}")
            }
            LevelTableError::Gap { below, above } => {
                write!(f, "zoom gap between {below} and {above}")
            }
            LevelTableError::Overlap { below, above } => {
                write!(f, "zoom ranges of {below} and {above} overlap")
            }
        }
    }
}

impl std::error::Error for LevelTableError {}

/// Static zoom → geography level routing table.
///
/// Both the tile buffers (to pick a source layer) and the interaction state
/// machine (to resolve features under the cursor) route through the same
/// table, so hover and selection always match what is painted.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    ranges: Vec<LevelRange>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            ranges: vec![
                LevelRange::new(GeoLevel::District, 0.0, 8.0),
                LevelRange::new(GeoLevel::Tract, 8.0, 12.0),
                LevelRange::new(GeoLevel::BlockGroup, 12.0, 16.0),
                LevelRange::new(GeoLevel::Parcel, 16.0, MAX_ZOOM),
            ],
        }
    }
}

impl LevelTable {
    /// Validates that the ranges partition `[MIN_ZOOM, MAX_ZOOM]` coarse to fine.
    pub fn new(ranges: Vec<LevelRange>) -> Result<Self, LevelTableError> {
        if ranges.len() != GeoLevel::ALL.len() {
            return Err(LevelTableError::WrongCount {
                found: ranges.len(),
            });
        }
        for (range, expected) in ranges.iter().zip(GeoLevel::ALL) {
            if range.level != expected {
                return Err(LevelTableError::OutOfOrder { level: range.level });
            }
            if !(range.min_zoom < range.max_zoom) {
                return Err(LevelTableError::EmptyRange { level: range.level });
            }
        }
        let first = &ranges[0];
        if first.min_zoom > MIN_ZOOM {
            return Err(LevelTableError::StartsAbove {
                min_zoom: first.min_zoom,
            });
        }
        let last = &ranges[ranges.len() - 1];
        if last.max_zoom < MAX_ZOOM {
            return Err(LevelTableError::EndsBelow {
                max_zoom: last.max_zoom,
            });
        }
        for pair in ranges.windows(2) {
            let (below, above) = (&pair[0], &pair[1]);
            if below.max_zoom < above.min_zoom {
                return Err(LevelTableError::Gap {
                    below: below.level,
                    above: above.level,
                });
            }
            if below.max_zoom > above.min_zoom {
                return Err(LevelTableError::Overlap {
                    below: below.level,
                    above: above.level,
                });
            }
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[LevelRange] {
        &self.ranges
    }

    pub fn levels(&self) -> impl Iterator<Item = GeoLevel> + '_ {
        self.ranges.iter().map(|r| r.level)
    }

    /// Total over all `f64`: below the table (or NaN) routes to the coarsest
    /// level, above it to the finest.
    pub fn range_for(&self, zoom: f64) -> &LevelRange {
        let first = &self.ranges[0];
        let last = &self.ranges[self.ranges.len() - 1];
        if zoom.is_nan() || zoom < first.min_zoom {
            return first;
        }
        self.ranges
            .iter()
            .find(|r| zoom >= r.min_zoom && zoom < r.max_zoom)
            .unwrap_or(last)
    }

    pub fn level_for(&self, zoom: f64) -> GeoLevel {
        self.range_for(zoom).level
    }
}
