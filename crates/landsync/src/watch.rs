//! The watch loop: timer ticks in, handler calls out.
//!
//! ```text
//! Idle --arm--> Armed --tick changed--> Polling --done--> Armed
//!                 |                                          |
//!                 +-----------------cancel-------------------+--> Cancelled
//! ```
//!
//! Arming empties the watch folder. Each poll lists it once and dispatches
//! terrain, then vantage, then vegetation; vegetation needs the terrain, so a
//! raster and masks arriving together are handled in that order. Handler
//! failures are logged and recorded in the [`PollReport`], never propagated.

use std::path::{Path, PathBuf};

use crate::artifact::{Artifact, TERRAIN_FILE, VANTAGE_FILE, clear_folder};
use crate::camera::VantagePose;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::terrain::TerrainUpdate;

/// Lifecycle of a [`WatchLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Armed,
    /// A poll is running.
    Polling,
    /// Terminal; the loop never polls again.
    Cancelled,
}

/// Recognised artifacts found by one directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbox {
    pub terrain: bool,
    pub vantage: bool,
    /// Mask file names, sorted.
    pub patches: Vec<String>,
}

impl Inbox {
    /// List `folder` once and classify its entries.
    pub fn scan(folder: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(folder).map_err(|e| Error::io("list", folder, e))?;
        let names = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok());
        Ok(Self::from_names(names))
    }

    /// Classify entry names. Unrecognised names are dropped.
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut inbox = Self::default();
        for name in names {
            match Artifact::classify(&name) {
                Some(Artifact::Terrain) => inbox.terrain = true,
                Some(Artifact::Vantage) => inbox.vantage = true,
                Some(Artifact::Patch { file_name }) => inbox.patches.push(file_name),
                None => {}
            }
        }
        inbox.patches.sort();
        inbox
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.terrain && !self.vantage && self.patches.is_empty()
    }
}

/// What one poll did.
#[derive(Debug)]
pub struct PollReport {
    pub tick: u64,
    /// Artifacts handed to a handler, in dispatch order.
    pub dispatched: Vec<Artifact>,
    pub terrain: Option<TerrainUpdate>,
    pub vantage: Option<VantagePose>,
    /// Vegetation classes planted.
    pub planted: Vec<String>,
    /// Artifacts a handler gave up on this tick, by file name.
    pub failures: Vec<(String, Error)>,
}

impl PollReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            dispatched: Vec::new(),
            terrain: None,
            vantage: None,
            planted: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Whether nothing was found to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.dispatched.is_empty() && self.failures.is_empty()
    }
}

/// Timer-driven poller of one watch folder.
#[derive(Debug)]
pub struct WatchLoop {
    folder: PathBuf,
    state: WatchState,
    last_tick: Option<u64>,
}

impl WatchLoop {
    /// An idle loop over `folder`. Use [`Engine::arm`] to get one bound to the
    /// engine's watch folder.
    pub(crate) fn new(folder: PathBuf) -> Self {
        Self {
            folder,
            state: WatchState::Idle,
            last_tick: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Empty the watch folder and start accepting ticks.
    ///
    /// Re-arming an armed loop clears the folder again. Returns the number of
    /// files removed.
    pub fn arm(&mut self) -> Result<usize> {
        if self.state == WatchState::Cancelled {
            return Err(Error::WatchCancelled);
        }
        let removed = clear_folder(&self.folder);
        self.state = WatchState::Armed;
        self.last_tick = None;
        tracing::info!(
            "Watching {} ({removed} stale file(s) removed)",
            self.folder.display()
        );
        Ok(removed)
    }

    /// Stop polling for good.
    pub fn cancel(&mut self) {
        if self.state != WatchState::Cancelled {
            tracing::info!("Stopped watching {}", self.folder.display());
        }
        self.state = WatchState::Cancelled;
    }

    /// Poll if armed and `tick` differs from the previous one.
    ///
    /// Returns `None` when no poll ran.
    pub fn on_tick(&mut self, tick: u64, engine: &mut Engine) -> Option<PollReport> {
        if self.state != WatchState::Armed || self.last_tick == Some(tick) {
            return None;
        }
        self.last_tick = Some(tick);
        self.state = WatchState::Polling;
        let report = poll(&self.folder, engine, tick);
        self.state = WatchState::Armed;
        Some(report)
    }
}

/// Bad input from the producer is a warning; everything else is an error.
fn failure_level(error: &Error) -> tracing::Level {
    match error {
        Error::MalformedArtifact { .. } => tracing::Level::WARN,
        _ => tracing::Level::ERROR,
    }
}

fn log_failure(what: &str, error: &Error) {
    if failure_level(error) == tracing::Level::WARN {
        tracing::warn!("{what} skipped: {error}");
    } else {
        tracing::error!("{what} failed: {error}");
    }
}

/// List the folder and run every handler with something to do, in fixed order.
fn poll(folder: &Path, engine: &mut Engine, tick: u64) -> PollReport {
    let mut report = PollReport::new(tick);
    let inbox = match Inbox::scan(folder) {
        Ok(inbox) => inbox,
        Err(e) => {
            tracing::error!("{e}");
            report.failures.push((folder.display().to_string(), e));
            return report;
        }
    };

    if inbox.terrain {
        report.dispatched.push(Artifact::Terrain);
        match engine.handle_terrain() {
            Ok(update) => report.terrain = Some(update),
            Err(e) => {
                log_failure("Terrain update", &e);
                report.failures.push((TERRAIN_FILE.to_owned(), e));
            }
        }
    }

    if inbox.vantage {
        report.dispatched.push(Artifact::Vantage);
        match engine.handle_vantage() {
            Ok(pose) => report.vantage = Some(pose),
            Err(e) => {
                log_failure("Vantage update", &e);
                report.failures.push((VANTAGE_FILE.to_owned(), e));
            }
        }
    }

    if !inbox.patches.is_empty() {
        report.dispatched.extend(
            inbox
                .patches
                .iter()
                .map(|file_name| Artifact::Patch {
                    file_name: file_name.clone(),
                }),
        );
        let planted = engine.handle_patches(&inbox.patches);
        report.planted = planted.planted;
        report.failures.extend(planted.skipped);
    }

    if !report.is_idle() {
        tracing::debug!(
            "Tick {tick}: {} artifact(s), {} failure(s)",
            report.dispatched.len(),
            report.failures.len()
        );
    }
    report
}
