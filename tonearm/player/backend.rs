use crate::error::App;
use crate::player::types::{MediaSource, PlaybackState};

/// Tag for one `load`; events carry the generation of the source they describe.
pub type Generation = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum BackendEventKind {
    StateChanged(PlaybackState),
    DurationChanged(u64),
    PositionChanged(u64),
    EndOfStream,
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendEvent {
    pub generation: Generation,
    pub kind: BackendEventKind,
}

impl BackendEvent {
    pub fn new(generation: Generation, kind: BackendEventKind) -> Self {
        Self { generation, kind }
    }
}

/// The native playback facility the facade drives.
///
/// Every command is a request: returning `Ok` means it was issued, and the
/// outcome arrives later as a [`BackendEvent`]. Implementations deliver
/// those events on the channel handed to them at construction.
pub trait MediaBackend: Send + 'static {
    /// Drops whatever was loaded before. Before anything that can fail, the
    /// implementation reports `StateChanged(Stopped)` tagged with
    /// `generation`, so the previous source's state never outlives it.
    fn load(&mut self, source: &MediaSource, generation: Generation) -> Result<(), App>;
    fn play(&mut self) -> Result<(), App>;
    fn pause(&mut self) -> Result<(), App>;
    fn stop(&mut self) -> Result<(), App>;
    fn seek(&mut self, position_ms: u64) -> Result<(), App>;
    /// Normalized gain in `0.0..=1.0`.
    fn set_gain(&mut self, gain: f64) -> Result<(), App>;
}
