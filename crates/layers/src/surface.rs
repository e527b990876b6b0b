use std::collections::BTreeMap;
use std::fmt;

use foundation::ids::GeoLevel;
use streaming::protocol::TileQuery;

use crate::ramp::RampStop;

/// One of the two parallel tile buffers kept per geography level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferSlot {
    Primary,
    Secondary,
}

impl BufferSlot {
    pub const fn other(self) -> Self {
        match self {
            BufferSlot::Primary => BufferSlot::Secondary,
            BufferSlot::Secondary => BufferSlot::Primary,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BufferSlot::Primary => "primary",
            BufferSlot::Secondary => "secondary",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            BufferSlot::Primary => 0,
            BufferSlot::Secondary => 1,
        }
    }
}

/// Renderer-side tile source, named `"{level}-{slot}"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId {
    pub level: GeoLevel,
    pub slot: BufferSlot,
}

impl SourceId {
    pub const fn new(level: GeoLevel, slot: BufferSlot) -> Self {
        Self { level, slot }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.level, self.slot.as_str())
    }
}

/// The rendering library, seen from the tile buffer manager.
///
/// Implementations are expected to start fetching tiles on `set_tiles` and to
/// report back through `TileBufferManager::source_loaded` once every
/// requested tile settled (individual tile failures count as settled).
/// `source_layer` names the vector layer inside each tile to draw.
pub trait TileSurface {
    fn set_tiles(&mut self, source: SourceId, source_layer: &str, query: &TileQuery);
    fn set_visibility(&mut self, source: SourceId, visible: bool);
    fn set_paint(&mut self, source: SourceId, stops: &[RampStop]);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Tiles(SourceId, String, TileQuery),
    Visibility(SourceId, bool),
    Paint(SourceId, usize),
}

/// In-memory surface for hosts without a renderer and for tests.
///
/// Keeps the latest state per source plus the ordered call log.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    queries: BTreeMap<SourceId, TileQuery>,
    layers: BTreeMap<SourceId, String>,
    visible: BTreeMap<SourceId, bool>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self, source: SourceId) -> Option<&TileQuery> {
        self.queries.get(&source)
    }

    pub fn source_layer(&self, source: SourceId) -> Option<&str> {
        self.layers.get(&source).map(String::as_str)
    }

    pub fn is_visible(&self, source: SourceId) -> bool {
        self.visible.get(&source).copied().unwrap_or(false)
    }

    /// Horizon currently painted for `level`, if exactly one buffer is visible.
    pub fn visible_horizon(&self, level: GeoLevel) -> Option<u32> {
        let primary = SourceId::new(level, BufferSlot::Primary);
        let secondary = SourceId::new(level, BufferSlot::Secondary);
        let shown = match (self.is_visible(primary), self.is_visible(secondary)) {
            (true, false) => primary,
            (false, true) => secondary,
            _ => return None,
        };
        self.query(shown).map(|q| q.horizon_offset)
    }
}

impl TileSurface for RecordingSurface {
    fn set_tiles(&mut self, source: SourceId, source_layer: &str, query: &TileQuery) {
        self.queries.insert(source, *query);
        self.layers.insert(source, source_layer.to_string());
        self.calls
            .push(SurfaceCall::Tiles(source, source_layer.to_string(), *query));
    }

    fn set_visibility(&mut self, source: SourceId, visible: bool) {
        self.visible.insert(source, visible);
        self.calls.push(SurfaceCall::Visibility(source, visible));
    }

    fn set_paint(&mut self, source: SourceId, stops: &[RampStop]) {
        self.calls.push(SurfaceCall::Paint(source, stops.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferSlot, SourceId};
    use foundation::ids::GeoLevel;

    #[test]
    fn source_names_include_level_and_slot() {
        let id = SourceId::new(GeoLevel::BlockGroup, BufferSlot::Secondary);
        assert_eq!(id.to_string(), "block_group-secondary");
        assert_eq!(BufferSlot::Primary.other(), BufferSlot::Secondary);
    }
}
