//! Double-buffered tile sources for flicker-free horizon changes.
//!
//! Every geography level owns a primary and a secondary source. One slot is
//! visible; the other is the staging target for the next horizon. A swap goes
//! `Idle → Staging → Swapping → Idle`:
//!
//! 1. `request_horizon` points the hidden slot at the new horizon.
//! 2. The hidden source of the level in view reports loaded, then the map
//!    reports idle (or the fallback timeout elapses).
//! 3. `settle_frames` more paint cycles pass.
//! 4. If no newer horizon was requested meanwhile, visibility flips.

use std::collections::BTreeSet;
use std::time::Duration;

use foundation::ids::GeoLevel;
use foundation::time::Millis;
use runtime::generation::{Generation, GenerationCounter};
use streaming::protocol::TileQuery;
use tracing::{debug, info};

use crate::levels::{LevelRange, LevelTable};
use crate::ramp::ColorRamp;
use crate::surface::{BufferSlot, SourceId, TileSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapConfig {
    pub timeout: Duration,
    pub settle_frames: u8,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(600),
            settle_frames: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Idle,
    Staging,
    Swapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpPhase {
    Staging,
    Swapping { frames_left: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SwapOp {
    generation: Generation,
    horizon: u32,
    started: Millis,
    phase: OpPhase,
}

/// Result of [`TileBufferManager::request_horizon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staged {
    /// `None` when the requested horizon is already visible.
    pub generation: Option<Generation>,
    /// Earlier staging operations dropped because they lost their buffer.
    pub superseded: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapCommitted {
    pub horizon: u32,
    pub generation: Generation,
    pub active: BufferSlot,
}

/// Result of [`TileBufferManager::frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub committed: Option<SwapCommitted>,
    /// Operations that reached their commit point with a stale generation.
    pub superseded: u32,
}

/// Owns visibility of all tile sources; nothing else may toggle it.
#[derive(Debug)]
pub struct TileBufferManager {
    config: SwapConfig,
    origin_year: i32,
    /// Routed levels with the source layer each one renders from.
    levels: Vec<LevelRange>,
    level_in_view: GeoLevel,
    ramp: ColorRamp,
    active: BufferSlot,
    slot_horizon: [u32; 2],
    latest_target: u32,
    generations: GenerationCounter,
    /// `(level, generation)` pairs the hidden slot reported as fully loaded.
    loaded: BTreeSet<(GeoLevel, Generation)>,
    ops: Vec<SwapOp>,
}

impl TileBufferManager {
    pub fn new(
        table: &LevelTable,
        origin_year: i32,
        initial_horizon: u32,
        ramp: ColorRamp,
        config: SwapConfig,
    ) -> Self {
        let levels = table.ranges().to_vec();
        Self {
            config,
            origin_year,
            level_in_view: table.level_for(0.0),
            levels,
            ramp,
            active: BufferSlot::Primary,
            slot_horizon: [initial_horizon; 2],
            latest_target: initial_horizon,
            generations: GenerationCounter::new(),
            loaded: BTreeSet::new(),
            ops: Vec::new(),
        }
    }

    /// Points both slots of every level at the initial horizon and shows primary.
    pub fn initialize(&mut self, surface: &mut dyn TileSurface) {
        let generation = self.generations.bump();
        let stops = self.ramp.paint_for(self.latest_target);
        for range in &self.levels {
            let level = range.level;
            for slot in [BufferSlot::Primary, BufferSlot::Secondary] {
                let source = SourceId::new(level, slot);
                let query = TileQuery {
                    level,
                    origin_year: self.origin_year,
                    horizon_offset: self.slot_horizon[slot.index()],
                    cache_bust: generation.0,
                };
                surface.set_tiles(source, &range.source_layer, &query);
                surface.set_paint(source, stops);
                surface.set_visibility(source, slot == self.active);
            }
        }
    }

    pub fn active_slot(&self) -> BufferSlot {
        self.active
    }

    pub fn active_horizon(&self) -> u32 {
        self.slot_horizon[self.active.index()]
    }

    pub fn latest_target(&self) -> u32 {
        self.latest_target
    }

    pub fn current_generation(&self) -> Generation {
        self.generations.current()
    }

    pub fn phase(&self) -> SwapPhase {
        let Some(op) = self.ops.iter().find(|op| self.generations.is_current(op.generation))
        else {
            return SwapPhase::Idle;
        };
        match op.phase {
            OpPhase::Staging => SwapPhase::Staging,
            OpPhase::Swapping { .. } => SwapPhase::Swapping,
        }
    }

    /// Level whose hidden source must be loaded before a swap may proceed.
    pub fn set_level_in_view(&mut self, level: GeoLevel) {
        self.level_in_view = level;
    }

    pub fn request_horizon(
        &mut self,
        horizon: u32,
        now: Millis,
        surface: &mut dyn TileSurface,
    ) -> Staged {
        self.latest_target = horizon;
        let generation = self.generations.bump();

        // Staging ops lose their buffer contents to this request; ops already
        // swapping stay and fail their generation check at commit time.
        let before = self.ops.len();
        self.ops.retain(|op| matches!(op.phase, OpPhase::Swapping { .. }));
        let superseded = (before - self.ops.len()) as u32;
        self.loaded.clear();

        if horizon == self.active_horizon() {
            debug!(horizon, "requested horizon already visible; pending swaps are now stale");
            return Staged {
                generation: None,
                superseded,
            };
        }

        let hidden = self.active.other();
        self.slot_horizon[hidden.index()] = horizon;
        for range in &self.levels {
            let query = TileQuery {
                level: range.level,
                origin_year: self.origin_year,
                horizon_offset: horizon,
                cache_bust: generation.0,
            };
            surface.set_tiles(SourceId::new(range.level, hidden), &range.source_layer, &query);
        }
        self.ops.push(SwapOp {
            generation,
            horizon,
            started: now,
            phase: OpPhase::Staging,
        });
        debug!(horizon, generation = generation.0, slot = hidden.as_str(), "staged horizon");
        Staged {
            generation: Some(generation),
            superseded,
        }
    }

    /// The renderer finished every tile of `source` for staging `generation`.
    pub fn source_loaded(&mut self, source: SourceId, generation: Generation) {
        if source.slot == self.active || !self.generations.is_current(generation) {
            debug!(%source, generation = generation.0, "ignoring stale load report");
            return;
        }
        self.loaded.insert((source.level, generation));
    }

    /// The map finished a full render pass.
    pub fn map_idle(&mut self) {
        let settle = self.config.settle_frames;
        for op in &mut self.ops {
            if op.phase == OpPhase::Staging
                && self.loaded.contains(&(self.level_in_view, op.generation))
            {
                op.phase = OpPhase::Swapping {
                    frames_left: settle,
                };
            }
        }
    }

    /// Forces staging ops past their timeout into the swapping phase.
    ///
    /// Returns how many ops took the fallback path.
    pub fn tick(&mut self, now: Millis) -> u32 {
        let mut fallbacks = 0;
        for op in &mut self.ops {
            if op.phase == OpPhase::Staging && now.since(op.started) >= self.config.timeout {
                debug!(horizon = op.horizon, "swap timeout fallback");
                op.phase = OpPhase::Swapping {
                    frames_left: self.config.settle_frames,
                };
                fallbacks += 1;
            }
        }
        fallbacks
    }

    /// Advances swapping ops by one paint cycle and commits the one that is due.
    pub fn frame(&mut self, surface: &mut dyn TileSurface) -> FrameOutcome {
        let mut due: Vec<SwapOp> = Vec::new();
        self.ops.retain_mut(|op| {
            let OpPhase::Swapping { frames_left } = &mut op.phase else {
                return true;
            };
            *frames_left = frames_left.saturating_sub(1);
            if *frames_left == 0 {
                due.push(*op);
                return false;
            }
            true
        });

        let mut out = FrameOutcome::default();
        for op in due {
            if self.generations.is_current(op.generation) && op.horizon == self.latest_target {
                out.committed = Some(self.commit(op, surface));
            } else {
                debug!(
                    horizon = op.horizon,
                    latest = self.latest_target,
                    "dropping superseded swap"
                );
                out.superseded += 1;
            }
        }
        out
    }

    fn commit(&mut self, op: SwapOp, surface: &mut dyn TileSurface) -> SwapCommitted {
        let shown = self.active.other();
        let hidden = self.active;
        for level in self.levels.iter().map(|r| r.level) {
            surface.set_visibility(SourceId::new(level, shown), true);
            surface.set_visibility(SourceId::new(level, hidden), false);
        }
        self.active = shown;
        self.loaded.clear();

        let stops = self.ramp.paint_for(op.horizon);
        for level in self.levels.iter().map(|r| r.level) {
            surface.set_paint(SourceId::new(level, shown), stops);
            surface.set_paint(SourceId::new(level, hidden), stops);
        }
        info!(horizon = op.horizon, slot = shown.as_str(), "horizon swap committed");
        SwapCommitted {
            horizon: op.horizon,
            generation: op.generation,
            active: shown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SwapConfig, SwapPhase, TileBufferManager};
    use crate::levels::LevelTable;
    use crate::ramp::ColorRamp;
    use crate::surface::{BufferSlot, RecordingSurface, SourceId, SurfaceCall};
    use foundation::ids::GeoLevel;
    use foundation::time::Millis;

    fn setup() -> (TileBufferManager, RecordingSurface) {
        let mut mgr = TileBufferManager::new(
            &LevelTable::default(),
            2024,
            0,
            ColorRamp::default(),
            SwapConfig::default(),
        );
        mgr.set_level_in_view(GeoLevel::Tract);
        let mut surface = RecordingSurface::new();
        mgr.initialize(&mut surface);
        (mgr, surface)
    }

    fn hidden_tract(mgr: &TileBufferManager) -> SourceId {
        SourceId::new(GeoLevel::Tract, mgr.active_slot().other())
    }

    #[test]
    fn initialize_shows_primary_only() {
        let (_mgr, surface) = setup();
        for level in GeoLevel::ALL {
            assert!(surface.is_visible(SourceId::new(level, BufferSlot::Primary)));
            assert!(!surface.is_visible(SourceId::new(level, BufferSlot::Secondary)));
            assert_eq!(surface.visible_horizon(level), Some(0));
        }
    }

    #[test]
    fn swap_waits_for_load_idle_and_settle_frames() {
        let (mut mgr, mut surface) = setup();
        let g = mgr.request_horizon(3, Millis(0), &mut surface).generation.unwrap();
        assert_eq!(mgr.phase(), SwapPhase::Staging);
        // The active buffer is untouched while staging.
        assert_eq!(surface.visible_horizon(GeoLevel::Tract), Some(0));
        assert_eq!(surface.query(hidden_tract(&mgr)).unwrap().horizon_offset, 3);

        // Idle before load does nothing.
        mgr.map_idle();
        assert_eq!(mgr.phase(), SwapPhase::Staging);

        mgr.source_loaded(hidden_tract(&mgr), g);
        mgr.map_idle();
        assert_eq!(mgr.phase(), SwapPhase::Swapping);

        assert_eq!(mgr.frame(&mut surface).committed, None);
        let done = mgr.frame(&mut surface).committed.unwrap();
        assert_eq!(done.horizon, 3);
        assert_eq!(done.active, BufferSlot::Secondary);
        assert_eq!(surface.visible_horizon(GeoLevel::Tract), Some(3));
        assert_eq!(surface.visible_horizon(GeoLevel::Parcel), Some(3));
        assert_eq!(mgr.phase(), SwapPhase::Idle);
    }

    #[test]
    fn rapid_requests_settle_on_the_latest_horizon() {
        let (mut mgr, mut surface) = setup();
        let g1 = mgr.request_horizon(1, Millis(0), &mut surface).generation.unwrap();
        let hidden = hidden_tract(&mgr);
        mgr.source_loaded(hidden, g1);
        mgr.map_idle();
        // H1 is swapping when H2 arrives and retargets the hidden buffer.
        let g2 = mgr.request_horizon(2, Millis(10), &mut surface).generation.unwrap();

        // H1 reaches its commit point first and must abort.
        mgr.frame(&mut surface);
        let out = mgr.frame(&mut surface);
        assert_eq!(out.committed, None);
        assert_eq!(out.superseded, 1);
        assert_eq!(surface.visible_horizon(GeoLevel::Tract), Some(0));

        // A late load report for H1 is ignored.
        mgr.source_loaded(hidden, g1);
        mgr.map_idle();
        assert_eq!(mgr.phase(), SwapPhase::Staging);

        mgr.source_loaded(hidden, g2);
        mgr.map_idle();
        mgr.frame(&mut surface);
        let done = mgr.frame(&mut surface).committed.unwrap();
        assert_eq!(done.horizon, 2);
        assert_eq!(surface.visible_horizon(GeoLevel::Tract), Some(2));
    }

    #[test]
    fn stale_staging_is_dropped_when_a_newer_request_arrives() {
        let (mut mgr, mut surface) = setup();
        mgr.request_horizon(1, Millis(0), &mut surface);
        let staged = mgr.request_horizon(2, Millis(5), &mut surface);
        assert_eq!(staged.superseded, 1);

        // Even the timeout fallback only ever reveals the newest horizon.
        assert_eq!(mgr.tick(Millis(700)), 1);
        mgr.frame(&mut surface);
        let done = mgr.frame(&mut surface).committed.unwrap();
        assert_eq!(done.horizon, 2);
    }

    #[test]
    fn timeout_triggers_swap_without_load_signal() {
        let (mut mgr, mut surface) = setup();
        mgr.request_horizon(4, Millis(100), &mut surface);
        assert_eq!(mgr.tick(Millis(699)), 0);
        assert_eq!(mgr.tick(Millis(700)), 1);
        mgr.frame(&mut surface);
        assert!(mgr.frame(&mut surface).committed.is_some());
        assert_eq!(mgr.active_horizon(), 4);
    }

    #[test]
    fn requesting_the_visible_horizon_cancels_pending_swap() {
        let (mut mgr, mut surface) = setup();
        let g = mgr.request_horizon(5, Millis(0), &mut surface).generation.unwrap();
        mgr.source_loaded(hidden_tract(&mgr), g);
        mgr.map_idle();
        let back = mgr.request_horizon(0, Millis(1), &mut surface);
        assert_eq!(back.generation, None);
        mgr.frame(&mut surface);
        let out = mgr.frame(&mut surface);
        assert_eq!(out.committed, None);
        assert_eq!(out.superseded, 1);
        assert_eq!(surface.visible_horizon(GeoLevel::Tract), Some(0));
    }

    #[test]
    fn load_of_a_level_out_of_view_does_not_unblock_swap() {
        let (mut mgr, mut surface) = setup();
        let g = mgr.request_horizon(2, Millis(0), &mut surface).generation.unwrap();
        mgr.source_loaded(SourceId::new(GeoLevel::Parcel, BufferSlot::Secondary), g);
        mgr.map_idle();
        assert_eq!(mgr.phase(), SwapPhase::Staging);
        mgr.set_level_in_view(GeoLevel::Parcel);
        mgr.map_idle();
        assert_eq!(mgr.phase(), SwapPhase::Swapping);
    }

    #[test]
    fn tiles_are_requested_from_each_level_source_layer() {
        let mut ranges = LevelTable::default().ranges().to_vec();
        ranges[2].source_layer = "bgs".to_string();
        let table = LevelTable::new(ranges).unwrap();
        let mut mgr =
            TileBufferManager::new(&table, 2024, 0, ColorRamp::default(), SwapConfig::default());
        let mut surface = RecordingSurface::new();
        mgr.initialize(&mut surface);

        let bg = SourceId::new(GeoLevel::BlockGroup, BufferSlot::Secondary);
        assert_eq!(surface.source_layer(bg), Some("bgs"));
        let tract = SourceId::new(GeoLevel::Tract, BufferSlot::Primary);
        assert_eq!(surface.source_layer(tract), Some(GeoLevel::Tract.as_str()));

        mgr.request_horizon(1, Millis(0), &mut surface);
        assert!(surface.calls.iter().any(|call| matches!(
            call,
            SurfaceCall::Tiles(source, layer, query)
                if *source == bg && layer == "bgs" && query.horizon_offset == 1
        )));
    }

    #[test]
    fn commit_repaints_both_buffers_of_every_level() {
        let (mut mgr, mut surface) = setup();
        mgr.request_horizon(1, Millis(0), &mut surface);
        assert_eq!(mgr.tick(Millis(600)), 1);
        mgr.frame(&mut surface);
        surface.calls.clear();
        assert!(mgr.frame(&mut surface).committed.is_some());

        let painted: Vec<SourceId> = surface
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Paint(source, _) => Some(*source),
                _ => None,
            })
            .collect();
        assert_eq!(painted.len(), 2 * GeoLevel::ALL.len());
        for level in GeoLevel::ALL {
            for slot in [BufferSlot::Primary, BufferSlot::Secondary] {
                assert!(painted.contains(&SourceId::new(level, slot)));
            }
        }
    }
}
