mod http;
mod input;
mod surface;

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use foundation::geo::LngLat;
use foundation::ids::FeatureId;
use foundation::series::ForecastSeries;
use foundation::time::Millis;
use layers::buffers::SwapPhase;
use layers::surface::SourceId;
use runtime::generation::Generation;
use serde::Serialize;
use session::config::{ConfigError, EngineConfig};
use session::effects::{Effect, EngineEvent};
use session::session::MapSession;
use streaming::error::FetchError;
use streaming::protocol::{Endpoints, TileCoord, TileQuery};
use streaming::request::FetchTicket;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::http::TileBatch;
use crate::input::{Input, Line};
use crate::surface::HeadlessSurface;

#[derive(Parser, Debug)]
#[command(name = "viewer_headless", about = "Drive a forecast map session from stdin")]
struct Args {
    /// JSON engine configuration; unspecified fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    origin_year: Option<i32>,
    /// Initial horizon offset.
    #[arg(long)]
    horizon: Option<u32>,
    #[arg(long, default_value_t = 10.0)]
    zoom: f64,
    #[arg(long, default_value_t = 29.76)]
    lat: f64,
    #[arg(long, default_value_t = -95.37)]
    lng: f64,
    /// Tiles loaded around the centre in each direction.
    #[arg(long, default_value_t = 1)]
    tile_radius: u32,
}

enum Completion {
    Detail {
        ticket: FetchTicket,
        result: Result<Option<ForecastSeries>, FetchError>,
    },
    Tiles {
        source: SourceId,
        generation: Generation,
        batch: TileBatch,
    },
    Overlay {
        source: SourceId,
        batch: TileBatch,
    },
}

#[derive(Serialize)]
struct OutputLine<'a> {
    session: &'a str,
    frame: u64,
    #[serde(flatten)]
    event: &'a EngineEvent,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<EngineConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
            EngineConfig::from_json_str(&text)?
        }
        None => EngineConfig::default(),
    };
    if let Ok(url) = env::var("FORECAST_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(year) = env::var("FORECAST_ORIGIN_YEAR") {
        config.origin_year = year.parse().map_err(|_| ConfigError::Invalid {
            field: "origin_year",
            reason: format!("FORECAST_ORIGIN_YEAR={year:?} is not a year"),
        })?;
    }
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(year) = args.origin_year {
        config.origin_year = year;
    }
    if let Some(horizon) = args.horizon {
        config.initial_horizon = horizon;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let (tx, mut rx) = mpsc::channel::<Completion>(256);
    let mut driver = Driver::new(config, &args, tx)?;
    info!(
        session = %driver.session_id,
        base_url = driver.endpoints.base_url(),
        level = %driver.session.level(),
        "headless viewer started"
    );
    driver.flush();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(Duration::from_millis(16));
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => driver.handle_line(&line),
                Ok(None) => {
                    debug!("stdin closed; waiting for outstanding work");
                    stdin_open = false;
                }
                Err(err) => {
                    error!("stdin read failed: {err}");
                    stdin_open = false;
                }
            },
            Some(done) = rx.recv() => driver.handle_completion(done),
            _ = interval.tick() => {
                driver.on_interval();
                if !stdin_open && driver.is_quiescent() {
                    break;
                }
            }
        }
        driver.flush();
    }

    info!(metrics = ?driver.session.metrics().snapshot(), "headless viewer finished");
    Ok(())
}

struct Driver {
    session_id: String,
    session: MapSession,
    surface: HeadlessSurface,
    endpoints: Endpoints,
    http: reqwest::Client,
    tx: mpsc::Sender<Completion>,
    started: Instant,
    tile_radius: u32,
    outstanding: usize,
}

impl Driver {
    fn new(
        config: EngineConfig,
        args: &Args,
        tx: mpsc::Sender<Completion>,
    ) -> Result<Self, ConfigError> {
        let mut surface = HeadlessSurface::new();
        let endpoints = Endpoints::new(config.base_url.clone());
        let mut session = MapSession::new(config, &mut surface)?;
        session.move_end(LngLat::new(args.lng, args.lat), args.zoom);
        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            session,
            surface,
            endpoints,
            http: reqwest::Client::new(),
            tx,
            started: Instant::now(),
            tile_radius: args.tile_radius,
            outstanding: 0,
        })
    }

    fn now(&self) -> Millis {
        Millis(self.started.elapsed().as_millis() as u64)
    }

    fn is_quiescent(&self) -> bool {
        self.outstanding == 0 && self.session.tiles().phase() == SwapPhase::Idle
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match input::parse_line(line) {
            Ok(Line::Command(command)) => self.session.command(command),
            Ok(Line::Input(input)) => self.handle_input(input),
            Err(err) => warn!("ignoring malformed input line: {err}"),
        }
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Pointer { id } => self.session.pointer_move(id.map(FeatureId::new)),
            Input::Click { id, additive } => self.session.click(id.map(FeatureId::new), additive),
            Input::Shift { held } => self.session.shift(held),
            Input::Escape => self.session.escape(),
            Input::Zoom { zoom, lat, lng } => {
                let center = self.session.center();
                let center = LngLat::new(lng.unwrap_or(center.lng), lat.unwrap_or(center.lat));
                self.session.move_end(center, zoom);
            }
            Input::Horizon { horizon } => {
                self.session.set_horizon(horizon, &mut self.surface);
            }
            Input::Idle(report) => self.session.map_idle(report),
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match done {
            Completion::Detail { ticket, result } => self.session.detail_loaded(ticket, result),
            Completion::Tiles {
                source,
                generation,
                batch,
            } => {
                debug!(%source, generation = generation.0, ?batch, "tile batch settled");
                self.session.source_loaded(source, generation);
                self.session.tiles_idle();
            }
            Completion::Overlay { source, batch } => {
                info!(%source, ?batch, "overlay refreshed");
            }
        }
    }

    fn on_interval(&mut self) {
        let now = self.now();
        self.session.tick(now);
        self.session.frame(&mut self.surface);
    }

    /// Executes queued effects, loads the hidden source of the level in view
    /// and prints events.
    fn flush(&mut self) {
        for effect in self.session.drain_effects() {
            match effect {
                Effect::FetchDetail { ticket, feature, url } => {
                    debug!(%feature, %url, "fetching detail");
                    let client = self.http.clone();
                    let tx = self.tx.clone();
                    self.outstanding += 1;
                    tokio::spawn(async move {
                        let result = http::fetch_detail(&client, &url).await;
                        let _ = tx.send(Completion::Detail { ticket, result }).await;
                    });
                }
                Effect::FlyTo { center, zoom } => {
                    // No camera animation here; the view jumps and settles.
                    self.session.move_end(center, zoom);
                }
                Effect::RefreshOverlay { level, .. } => {
                    let source = SourceId::new(level, self.session.tiles().active_slot());
                    if let Some(query) = self.surface.query(source).copied() {
                        self.spawn_tiles(source, query, false);
                    }
                }
            }
        }

        let loadable = self.surface.take_loadable(
            self.session.level(),
            self.session.tiles().active_slot().other(),
            self.session.tiles().current_generation(),
        );
        if let Some((source, query)) = loadable {
            self.spawn_tiles(source, query, true);
        }

        let mut out = String::new();
        for stamped in self.session.drain_events() {
            let line = OutputLine {
                session: &self.session_id,
                frame: stamped.frame_index,
                event: &stamped.event,
            };
            match serde_json::to_string(&line) {
                Ok(json) => {
                    out.push_str(&json);
                    out.push('\n');
                }
                Err(err) => warn!("event serialization failed: {err}"),
            }
        }
        if !out.is_empty() {
            print!("{out}");
        }
    }

    fn spawn_tiles(&mut self, source: SourceId, query: TileQuery, staged: bool) {
        let zoom = self.session.zoom().floor().clamp(0.0, 22.0) as u8;
        let urls: Vec<String> = TileCoord::around(self.session.center(), zoom, self.tile_radius)
            .into_iter()
            .map(|coord| self.endpoints.tile_url(coord, &query))
            .collect();
        debug!(
            %source,
            layer = self.surface.source_layer(source).unwrap_or_default(),
            tiles = urls.len(),
            horizon = query.horizon_offset,
            "loading tiles"
        );
        let client = self.http.clone();
        let tx = self.tx.clone();
        let generation = Generation(query.cache_bust);
        self.outstanding += 1;
        tokio::spawn(async move {
            let batch = http::fetch_tiles(&client, urls).await;
            let done = if staged {
                Completion::Tiles {
                    source,
                    generation,
                    batch,
                }
            } else {
                Completion::Overlay { source, batch }
            };
            let _ = tx.send(done).await;
        });
    }
}
