use compute::aggregate::{Aggregate, Member, aggregate, preview};
use compute::viewport::{RenderedFeature, ViewportDomain, ViewportDomainCalculator};
use foundation::geo::LngLat;
use foundation::ids::{FeatureId, FeatureRef, GeoLevel};
use foundation::series::ForecastSeries;
use foundation::time::Millis;
use layers::buffers::{Staged, TileBufferManager};
use layers::levels::LevelTable;
use layers::surface::{SourceId, TileSurface};
use runtime::debounce::Debouncer;
use runtime::event_bus::{EventBus, Stamped};
use runtime::frame::Frame;
use runtime::generation::Generation;
use runtime::metrics::{Counter, Metrics};
use scene::interaction::{
    DetailSlot, Directive, InteractionEvent, InteractionMachine, InteractionState, Urgency,
};
use streaming::cache::{DetailCache, DetailValue, Lookup, Outcome};
use streaming::error::FetchError;
use streaming::protocol::Endpoints;
use streaming::request::FetchTicket;
use tracing::{debug, info};

use crate::command::ExternalCommand;
use crate::config::{ConfigError, EngineConfig};
use crate::effects::{Effect, EngineEvent, IdleReport};

/// Auto-selection armed by `fly_to_location`, resolved on the next idle.
#[derive(Debug, Clone, PartialEq)]
struct PendingSelect {
    feature: Option<FeatureId>,
}

/// The detail the charts currently want, per display slot. Completions for
/// any other key are cached but not displayed.
#[derive(Debug, Clone, Default)]
struct Displayed {
    focus: Option<FeatureRef>,
    focus_series: DetailValue,
    comparison: Option<FeatureRef>,
    comparison_series: DetailValue,
}

/// One map view: every engine component plus the host-facing outboxes.
///
/// All methods are synchronous and deterministic. Time advances only through
/// [`MapSession::tick`], paint cycles only through [`MapSession::frame`].
#[derive(Debug)]
pub struct MapSession {
    config: EngineConfig,
    endpoints: Endpoints,
    levels: LevelTable,
    tiles: TileBufferManager,
    interaction: InteractionMachine,
    cache: DetailCache,
    domain: ViewportDomainCalculator,
    detail_debounce: Debouncer<(FeatureRef, DetailSlot)>,
    pan_debounce: Debouncer<(LngLat, f64)>,
    now: Millis,
    frame: Frame,
    zoom: f64,
    level: GeoLevel,
    center: LngLat,
    displayed: Displayed,
    rendered: Vec<RenderedFeature>,
    pending_select: Option<PendingSelect>,
    effects: Vec<Effect>,
    events: EventBus<EngineEvent>,
    metrics: Metrics,
}

impl MapSession {
    /// Validates `config` and points every tile source at the initial horizon.
    pub fn new(config: EngineConfig, surface: &mut dyn TileSurface) -> Result<Self, ConfigError> {
        config.validate()?;
        let levels = config.level_table()?;
        let mut tiles = TileBufferManager::new(
            &levels,
            config.origin_year,
            config.initial_horizon,
            config.color_ramp.clone(),
            config.swap_config(),
        );
        tiles.initialize(surface);
        let level = levels.level_for(0.0);
        tiles.set_level_in_view(level);
        Ok(Self {
            endpoints: Endpoints::new(config.base_url.clone()),
            interaction: InteractionMachine::new(),
            cache: DetailCache::new(config.detail_cache_capacity),
            domain: ViewportDomainCalculator::new(
                config.domain_low_percentile,
                config.domain_high_percentile,
            ),
            detail_debounce: Debouncer::new(config.hover_debounce()),
            pan_debounce: Debouncer::new(config.pan_debounce()),
            now: Millis::ZERO,
            frame: Frame::new(0, Millis::ZERO),
            zoom: 0.0,
            level,
            center: LngLat::new(0.0, 0.0),
            displayed: Displayed::default(),
            rendered: Vec::new(),
            pending_select: None,
            effects: Vec::new(),
            events: EventBus::new(),
            metrics: Metrics::new(),
            levels,
            tiles,
            config,
        })
    }

    // ---- accessors ----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn level(&self) -> GeoLevel {
        self.level
    }

    pub fn center(&self) -> LngLat {
        self.center
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    pub fn tiles(&self) -> &TileBufferManager {
        &self.tiles
    }

    pub fn cache(&self) -> &DetailCache {
        &self.cache
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn interaction_state(&self, feature: &FeatureRef) -> InteractionState {
        self.interaction.state_of(feature)
    }

    pub fn focused_feature(&self) -> Option<&FeatureRef> {
        self.displayed.focus.as_ref()
    }

    pub fn focused_series(&self) -> Option<&ForecastSeries> {
        self.displayed.focus_series.as_deref()
    }

    pub fn comparison_series(&self) -> Option<&ForecastSeries> {
        self.displayed.comparison_series.as_deref()
    }

    pub fn viewport_domain(&self) -> Option<ViewportDomain> {
        self.domain.domain()
    }

    /// Viewport domain widened to the displayed features' own lines.
    pub fn display_domain(&self) -> Option<ViewportDomain> {
        let displayed = self
            .displayed
            .focus_series
            .iter()
            .chain(self.displayed.comparison_series.iter())
            .map(|s| &**s);
        self.domain.display_domain(displayed)
    }

    /// Mean series of the selection; only meaningful with two or more members.
    pub fn selection_aggregate(&self) -> Option<Aggregate> {
        if self.interaction.selection().len() < 2 {
            return None;
        }
        let members: Vec<Member<'_>> = self
            .interaction
            .selection()
            .iter()
            .map(|f| self.member(f))
            .collect();
        aggregate(&members)
    }

    /// Selection plus the shift-held candidate.
    pub fn preview_aggregate(&self) -> Option<Aggregate> {
        let candidate = self.interaction.preview_candidate()?;
        let members: Vec<Member<'_>> = self
            .interaction
            .selection()
            .iter()
            .map(|f| self.member(f))
            .collect();
        preview(
            &members,
            self.member(candidate),
            self.interaction.shift_held(),
        )
    }

    fn member<'a>(&'a self, feature: &'a FeatureRef) -> Member<'a> {
        let series = self.cache.peek(feature).and_then(|v| v.as_deref());
        let totals = self
            .rendered
            .iter()
            .find(|r| feature.level == self.level && r.id == feature.id)
            .map(|r| &r.totals);
        Member::new(feature, series).with_totals(totals)
    }

    // ---- outboxes ----

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn drain_events(&mut self) -> Vec<Stamped<EngineEvent>> {
        self.events.drain()
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.emit(self.frame.index, event);
    }

    // ---- pointer / keyboard ----

    /// `feature` is the id under the cursor on the currently routed level.
    pub fn pointer_move(&mut self, feature: Option<FeatureId>) {
        let feature = feature.map(|id| self.on_level(id));
        self.dispatch(InteractionEvent::PointerMove(feature));
    }

    pub fn click(&mut self, feature: Option<FeatureId>, additive: bool) {
        let feature = feature.map(|id| self.on_level(id));
        self.dispatch(InteractionEvent::Click { feature, additive });
    }

    pub fn shift(&mut self, held: bool) {
        self.dispatch(InteractionEvent::Shift(held));
    }

    pub fn escape(&mut self) {
        self.dispatch(InteractionEvent::Escape);
    }

    fn on_level(&self, id: FeatureId) -> FeatureRef {
        FeatureRef {
            level: self.level,
            id,
        }
    }

    fn dispatch(&mut self, event: InteractionEvent) {
        let directives = self.interaction.dispatch(event);
        self.sync_displayed();
        self.domain.set_frozen(self.interaction.is_locked());
        for directive in directives {
            self.apply(directive);
        }
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Fetch {
                feature,
                urgency: Urgency::Debounced,
                slot,
            } => {
                if let Some((dropped, _)) = self.detail_debounce.schedule(self.now, (feature, slot)) {
                    debug!(feature = %dropped, "debounced detail fetch superseded");
                }
            }
            Directive::Fetch {
                feature,
                urgency: Urgency::Immediate,
                ..
            } => self.request_detail(feature),
            Directive::CancelDebounce => {
                self.detail_debounce.cancel();
            }
            Directive::HoverChanged(feature) => {
                debug!(feature = ?feature.as_ref().map(|f| f.to_string()), "hover changed");
                self.emit(EngineEvent::FeatureHover { feature });
            }
            Directive::SelectionChanged(feature) => {
                debug!(feature = ?feature.as_ref().map(|f| f.to_string()), "selection changed");
                self.emit(EngineEvent::FeatureSelect { feature });
            }
            Directive::ComparisonChanged(feature) => {
                debug!(feature = ?feature.as_ref().map(|f| f.to_string()), "comparison changed");
            }
        }
    }

    /// Re-derives which keys the charts want from the interaction state and
    /// clears series whose key changed. Fetch results fill them in later.
    fn sync_displayed(&mut self) {
        let focus = self.interaction.focus().cloned();
        if focus != self.displayed.focus {
            self.displayed.focus = focus;
            self.displayed.focus_series = self.ready_value(self.displayed.focus.as_ref());
            if self.displayed.focus.is_none() {
                self.emit(EngineEvent::SeriesUpdated {
                    feature: None,
                    series: None,
                });
            }
        }
        let comparison = self.interaction.comparison().cloned();
        if comparison != self.displayed.comparison {
            self.displayed.comparison = comparison;
            self.displayed.comparison_series = self.ready_value(self.displayed.comparison.as_ref());
            if self.displayed.comparison.is_none() {
                self.emit(EngineEvent::ComparisonUpdated {
                    feature: None,
                    series: None,
                });
            }
        }
    }

    fn ready_value(&self, key: Option<&FeatureRef>) -> DetailValue {
        key.and_then(|k| self.cache.peek(k)).cloned().flatten()
    }

    // ---- detail fetching ----

    fn request_detail(&mut self, feature: FeatureRef) {
        match self.cache.lookup(&feature) {
            Lookup::Ready(value) => {
                self.metrics.inc(Counter::CacheHit);
                self.deliver(&feature, value);
            }
            Lookup::Pending(ticket) => {
                self.metrics.inc(Counter::FetchCoalesced);
                debug!(%feature, ticket = ticket.0, "detail fetch coalesced");
            }
            Lookup::Fetch(ticket) => {
                self.metrics.inc(Counter::CacheMiss);
                let url = self.endpoints.detail_url(&feature, self.config.origin_year);
                self.effects.push(Effect::FetchDetail {
                    ticket,
                    feature,
                    url,
                });
            }
        }
    }

    /// Hands a fetch result back. Every result updates the cache; only the
    /// result for the key a chart currently wants is displayed.
    pub fn detail_loaded(
        &mut self,
        ticket: FetchTicket,
        result: Result<Option<ForecastSeries>, FetchError>,
    ) {
        let Some(done) = self.cache.complete(ticket, result) else {
            return;
        };
        self.metrics
            .add(Counter::CacheEviction, done.evicted.len() as u64);
        let value = match done.outcome {
            Outcome::Stored(value) => value,
            Outcome::Failed => {
                self.metrics.inc(Counter::FetchFailed);
                None
            }
        };
        self.deliver(&done.key, value);
    }

    fn deliver(&mut self, key: &FeatureRef, value: DetailValue) {
        let mut shown = false;
        if self.displayed.focus.as_ref() == Some(key) {
            self.displayed.focus_series = value.clone();
            self.emit(EngineEvent::SeriesUpdated {
                feature: Some(key.clone()),
                series: value.as_deref().cloned(),
            });
            shown = true;
        }
        if self.displayed.comparison.as_ref() == Some(key) {
            self.displayed.comparison_series = value.clone();
            self.emit(EngineEvent::ComparisonUpdated {
                feature: Some(key.clone()),
                series: value.as_deref().cloned(),
            });
            shown = true;
        }
        let wanted = self.interaction.selection().contains(key)
            || self.interaction.hovered() == Some(key);
        if !shown && !wanted {
            self.metrics.inc(Counter::StaleDetailDiscarded);
            debug!(%key, "discarding detail for a feature no longer displayed");
        }
    }

    // ---- camera ----

    /// Routes `zoom` to a geography level; a level change resets interaction.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
        let level = self.levels.level_for(zoom);
        if level == self.level {
            return;
        }
        debug!(from = %self.level, to = %level, zoom, "geography level changed");
        self.level = level;
        self.tiles.set_level_in_view(level);
        self.dispatch(InteractionEvent::LevelChanged(level));
        if !level.is_finest() {
            self.pan_debounce.cancel();
        }
    }

    /// Pan or zoom gesture ended.
    pub fn move_end(&mut self, center: LngLat, zoom: f64) {
        self.center = center.normalized();
        self.set_zoom(zoom);
        if self.level.is_finest() {
            self.pan_debounce.schedule(self.now, (self.center, zoom));
        }
    }

    /// The map finished rendering: feeds the swap protocol, recomputes the
    /// viewport domain and resolves a pending fly-to selection.
    pub fn map_idle(&mut self, report: IdleReport) {
        self.tiles.map_idle();
        self.rendered = report.rendered;
        if let Some(domain) = self.domain.recompute(&self.rendered) {
            self.emit(EngineEvent::DomainUpdated { domain });
        }
        // Stays armed until an idle names a feature to select.
        let Some(pending) = &self.pending_select else {
            return;
        };
        let Some(id) = pending.feature.clone().or(report.center_feature) else {
            debug!("idle without a centre feature; fly-to selection still pending");
            return;
        };
        self.pending_select = None;
        let feature = self.on_level(id.clone());
        if self.interaction.selection().is_only(&feature) {
            return;
        }
        info!(%feature, "selecting feature after fly-to");
        self.click(Some(id), false);
    }

    /// Tiles settled without a full render report. Only the swap protocol
    /// hears about it; the rendered sample and pending fly-to are untouched.
    pub fn tiles_idle(&mut self) {
        self.tiles.map_idle();
    }

    // ---- horizon / tiles ----

    pub fn set_horizon(&mut self, horizon: u32, surface: &mut dyn TileSurface) -> Staged {
        let staged = self.tiles.request_horizon(horizon, self.now, surface);
        self.metrics
            .add(Counter::SwapSuperseded, u64::from(staged.superseded));
        if staged.generation.is_some() {
            self.metrics.inc(Counter::SwapStaged);
        }
        staged
    }

    pub fn source_loaded(&mut self, source: SourceId, generation: Generation) {
        self.tiles.source_loaded(source, generation);
    }

    /// One paint cycle completed.
    pub fn frame(&mut self, surface: &mut dyn TileSurface) {
        self.frame = self.frame.next(self.now);
        let outcome = self.tiles.frame(surface);
        self.metrics
            .add(Counter::SwapSuperseded, u64::from(outcome.superseded));
        if let Some(done) = outcome.committed {
            self.metrics.inc(Counter::SwapCommitted);
            self.emit(EngineEvent::HorizonSwapped {
                horizon: done.horizon,
                generation: done.generation.0,
            });
        }
    }

    /// Advances host time: fires due debounces and swap timeouts.
    pub fn tick(&mut self, now: Millis) {
        self.now = self.now.max(now);
        let fallbacks = self.tiles.tick(self.now);
        self.metrics
            .add(Counter::SwapTimeoutFallback, u64::from(fallbacks));

        if let Some((feature, slot)) = self.detail_debounce.poll(self.now) {
            // Only pointer-driven fetches are debounced.
            let wanted = match slot {
                DetailSlot::Comparison => self.interaction.comparison(),
                DetailSlot::Focus | DetailSlot::Member => self.interaction.hovered(),
            };
            if wanted == Some(&feature) {
                self.request_detail(feature);
            }
        }

        if let Some((center, zoom)) = self.pan_debounce.poll(self.now) {
            if self.level.is_finest() {
                self.effects.push(Effect::RefreshOverlay {
                    level: self.level,
                    center,
                    zoom,
                });
            }
        }
    }

    // ---- external commands ----

    pub fn command(&mut self, command: ExternalCommand) {
        match command {
            ExternalCommand::FlyToLocation {
                lat,
                lng,
                zoom,
                select_feature_id,
            } => {
                let center = LngLat::new(lng, lat).normalized();
                let zoom = zoom.unwrap_or(self.zoom);
                info!(lat = center.lat, lng = center.lng, zoom, "fly to location");
                self.pending_select = Some(PendingSelect {
                    feature: select_feature_id.map(FeatureId::new),
                });
                self.effects.push(Effect::FlyTo { center, zoom });
            }
            ExternalCommand::ClearSelection => {
                info!("clearing selection on request");
                self.pending_select = None;
                self.escape();
            }
        }
    }
}
