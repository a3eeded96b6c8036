use crate::error::App;
use crate::player::backend::{BackendEvent, BackendEventKind, Generation, MediaBackend};
use crate::player::types::{MediaSource, PlaybackState};
use futures_util::stream::StreamExt;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Element, MessageView, SeekFlags, State};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// [`MediaBackend`] over a GStreamer `playbin`.
///
/// Every `load` gets a fresh playbin and a bus pump task tagged with the
/// load's generation. The previous playbin is torn down first, so nothing it
/// still had queued on its bus can reach the new generation.
pub struct GstBackend {
    playbin: Option<Element>,
    pump: Option<JoinHandle<()>>,
    gain: f64,
    events: mpsc::UnboundedSender<BackendEvent>,
    position_interval: Duration,
    runtime: Handle,
}

impl GstBackend {
    pub fn new(
        events: mpsc::UnboundedSender<BackendEvent>,
        position_interval: Duration,
        runtime: Handle,
    ) -> Result<Self, App> {
        gstreamer::init().map_err(|e| App::Init(e.to_string()))?;
        info!("GStreamer initialized: {}", gstreamer::version_string());
        Ok(Self {
            playbin: None,
            pump: None,
            gain: 1.0,
            events,
            position_interval,
            runtime,
        })
    }

    fn teardown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(playbin) = self.playbin.take() {
            if let Err(e) = playbin.set_state(State::Null) {
                error!("Failed to set previous pipeline to Null: {}", e);
            }
        }
    }

    fn set_state(&self, state: State) -> Result<(), App> {
        let Some(playbin) = &self.playbin else {
            debug!("No source loaded, ignoring request for {:?}", state);
            return Ok(());
        };
        playbin
            .set_state(state)
            .map_err(|_| App::State(format!("Failed to set pipeline to {state:?}")))?;
        Ok(())
    }
}

impl MediaBackend for GstBackend {
    fn load(&mut self, source: &MediaSource, generation: Generation) -> Result<(), App> {
        self.teardown();
        // Nothing is loaded until the new playbin exists.
        let _ = self.events.send(BackendEvent::new(
            generation,
            BackendEventKind::StateChanged(PlaybackState::Stopped),
        ));

        let uri = source_uri(source)?;
        let playbin = gstreamer::ElementFactory::make("playbin")
            .name(format!("playbin-{generation}"))
            .property("uri", uri.as_str())
            .property("volume", self.gain)
            .build()
            .map_err(|_| App::Element("Failed to create playbin element".to_string()))?;

        info!("Loaded {} (generation {})", uri, generation);
        let pump = self.runtime.spawn(pump_bus(
            playbin.clone(),
            generation,
            self.events.clone(),
            self.position_interval,
        ));
        self.playbin = Some(playbin);
        self.pump = Some(pump);
        Ok(())
    }

    fn play(&mut self) -> Result<(), App> {
        self.set_state(State::Playing)
    }

    fn pause(&mut self) -> Result<(), App> {
        self.set_state(State::Paused)
    }

    // Ready rather than Null: the pipeline flushes its bus on the way to
    // Null, which would swallow the state change that confirms the stop.
    fn stop(&mut self) -> Result<(), App> {
        self.set_state(State::Ready)
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), App> {
        let Some(playbin) = &self.playbin else {
            return Ok(());
        };
        if !matches!(playbin.current_state(), State::Paused | State::Playing) {
            debug!("Pipeline not prerolled, ignoring seek to {}ms", position_ms);
            return Ok(());
        }
        playbin
            .seek_simple(
                SeekFlags::FLUSH | SeekFlags::KEY_UNIT,
                ClockTime::from_mseconds(position_ms),
            )
            .map_err(|_| App::Seek(format!("Failed to seek to {position_ms}ms")))?;
        Ok(())
    }

    fn set_gain(&mut self, gain: f64) -> Result<(), App> {
        self.gain = gain.clamp(0.0, 1.0);
        if let Some(playbin) = &self.playbin {
            playbin.set_property("volume", self.gain);
        }
        Ok(())
    }
}

impl Drop for GstBackend {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn pump_bus(
    playbin: Element,
    generation: Generation,
    events: mpsc::UnboundedSender<BackendEvent>,
    position_interval: Duration,
) {
    let Some(bus) = playbin.bus() else {
        error!("Failed to get GStreamer bus for generation {}", generation);
        return;
    };
    let mut messages = bus.stream();
    let mut ticker = tokio::time::interval(position_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let kinds: Vec<BackendEventKind> = tokio::select! {
            message = messages.next() => {
                let Some(message) = message else { break };
                translate(&playbin, &message)
            }
            _ = ticker.tick() => {
                if playbin.current_state() != State::Playing {
                    continue;
                }
                query_position(&playbin).into_iter().collect()
            }
        };

        for kind in kinds {
            if events.send(BackendEvent::new(generation, kind)).is_err() {
                debug!("Event receiver closed, stopping bus pump {}", generation);
                return;
            }
        }
    }
}

fn query_position(playbin: &Element) -> Option<BackendEventKind> {
    playbin
        .query_position::<ClockTime>()
        .map(|position| BackendEventKind::PositionChanged(position.mseconds()))
}

fn query_duration(playbin: &Element) -> Option<BackendEventKind> {
    playbin
        .query_duration::<ClockTime>()
        .map(|duration| BackendEventKind::DurationChanged(duration.mseconds()))
}

fn translate(playbin: &Element, message: &gstreamer::Message) -> Vec<BackendEventKind> {
    match message.view() {
        MessageView::StateChanged(changed) => {
            if changed.src() != Some(playbin.upcast_ref::<gstreamer::Object>()) {
                return Vec::new();
            }
            settled_state(changed.current(), changed.pending())
                .map(BackendEventKind::StateChanged)
                .into_iter()
                .collect()
        }
        MessageView::DurationChanged(_) => query_duration(playbin).into_iter().collect(),
        // Preroll and flushing seeks both finish with AsyncDone.
        MessageView::AsyncDone(_) => query_duration(playbin)
            .into_iter()
            .chain(query_position(playbin))
            .collect(),
        MessageView::Eos(_) => {
            info!("EOS message received");
            if let Err(e) = playbin.set_state(State::Ready) {
                error!("Failed to reset pipeline after EOS: {}", e);
            }
            vec![BackendEventKind::EndOfStream]
        }
        MessageView::Error(err) => {
            error!("Error from GStreamer pipeline: {}", err.error());
            vec![BackendEventKind::Error(err.error().to_string())]
        }
        MessageView::Warning(warning) => {
            warn!("Warning from GStreamer pipeline: {}", warning.error());
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Only settled transitions count: a playbin passes through Ready and Paused
/// on its way to Playing, and those intermediate steps are not reported.
fn settled_state(current: State, pending: State) -> Option<PlaybackState> {
    if pending != State::VoidPending {
        return None;
    }
    match current {
        State::Playing => Some(PlaybackState::Playing),
        State::Paused => Some(PlaybackState::Paused),
        State::Ready | State::Null => Some(PlaybackState::Stopped),
        _ => None,
    }
}

fn source_uri(source: &MediaSource) -> Result<String, App> {
    match source {
        MediaSource::Uri(uri) => Ok(uri.clone()),
        MediaSource::Path(path) => {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()?.join(path)
            };
            glib::filename_to_uri(&absolute, None)
                .map(|uri| uri.to_string())
                .map_err(|e| App::Source(format!("{}: {e}", absolute.display())))
        }
    }
}
