use std::collections::BTreeMap;

use foundation::ids::GeoLevel;
use layers::ramp::RampStop;
use layers::surface::{BufferSlot, RecordingSurface, SourceId, TileSurface};
use runtime::generation::Generation;
use streaming::protocol::TileQuery;
use tracing::debug;

/// Tile surface without a renderer: keeps source state and remembers every
/// retargeted source until the driver loads its tiles over HTTP.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    state: RecordingSurface,
    /// Latest query per retargeted source not yet handed out for loading.
    unloaded: BTreeMap<SourceId, TileQuery>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self, source: SourceId) -> Option<&TileQuery> {
        self.state.query(source)
    }

    pub fn source_layer(&self, source: SourceId) -> Option<&str> {
        self.state.source_layer(source)
    }

    /// Hands out the hidden source of `level` if it was retargeted for
    /// `generation` and not loaded yet.
    ///
    /// Other levels keep their queued query, so routing to a new level while
    /// a horizon is staging still loads that level's hidden buffer. Queries
    /// for another generation or for the visible slot are dropped.
    pub fn take_loadable(
        &mut self,
        level: GeoLevel,
        hidden: BufferSlot,
        generation: Generation,
    ) -> Option<(SourceId, TileQuery)> {
        self.unloaded
            .retain(|source, query| source.slot == hidden && query.cache_bust == generation.0);
        let source = SourceId::new(level, hidden);
        self.unloaded.remove(&source).map(|query| (source, query))
    }
}

impl TileSurface for HeadlessSurface {
    fn set_tiles(&mut self, source: SourceId, source_layer: &str, query: &TileQuery) {
        self.state.set_tiles(source, source_layer, query);
        self.unloaded.insert(source, *query);
    }

    fn set_visibility(&mut self, source: SourceId, visible: bool) {
        if self.state.is_visible(source) != visible {
            debug!(%source, visible, "source visibility");
        }
        self.state.set_visibility(source, visible);
    }

    fn set_paint(&mut self, source: SourceId, stops: &[RampStop]) {
        self.state.set_paint(source, stops);
    }
}

#[cfg(test)]
mod tests {
    use super::HeadlessSurface;
    use foundation::ids::GeoLevel;
    use layers::surface::{BufferSlot, SourceId, TileSurface};
    use runtime::generation::Generation;
    use streaming::protocol::TileQuery;

    fn query(level: GeoLevel, horizon_offset: u32, cache_bust: u64) -> TileQuery {
        TileQuery {
            level,
            origin_year: 2024,
            horizon_offset,
            cache_bust,
        }
    }

    fn stage(surface: &mut HeadlessSurface, horizon: u32, generation: u64) {
        for level in [GeoLevel::Tract, GeoLevel::Parcel] {
            let source = SourceId::new(level, BufferSlot::Secondary);
            surface.set_tiles(source, level.as_str(), &query(level, horizon, generation));
        }
    }

    #[test]
    fn staged_level_out_of_view_stays_loadable() {
        let mut surface = HeadlessSurface::new();
        stage(&mut surface, 1, 2);
        let hidden = BufferSlot::Secondary;

        let (source, q) = surface
            .take_loadable(GeoLevel::Tract, hidden, Generation(2))
            .unwrap();
        assert_eq!(source, SourceId::new(GeoLevel::Tract, hidden));
        assert_eq!(q.horizon_offset, 1);
        assert_eq!(surface.take_loadable(GeoLevel::Tract, hidden, Generation(2)), None);

        // Zoomed to parcels while the horizon is still staging.
        let (source, _) = surface
            .take_loadable(GeoLevel::Parcel, hidden, Generation(2))
            .unwrap();
        assert_eq!(source, SourceId::new(GeoLevel::Parcel, hidden));
    }

    #[test]
    fn newer_generation_replaces_queued_query() {
        let mut surface = HeadlessSurface::new();
        stage(&mut surface, 1, 2);
        stage(&mut surface, 3, 3);
        let hidden = BufferSlot::Secondary;

        let (_, q) = surface
            .take_loadable(GeoLevel::Parcel, hidden, Generation(3))
            .unwrap();
        assert_eq!(q.horizon_offset, 3);
        assert_eq!(
            surface.source_layer(SourceId::new(GeoLevel::Parcel, hidden)),
            Some("parcel")
        );
        // After a commit the staged slot is visible: nothing left to load.
        assert_eq!(
            surface.take_loadable(GeoLevel::Tract, BufferSlot::Primary, Generation(3)),
            None
        );
    }
}
