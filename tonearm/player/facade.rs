//! Backend-agnostic transport API.
//!
//! [`PlaybackFacade`] owns the backend exclusively and runs as a single task
//! on the runtime handed to [`PlaybackFacade::spawn`]. Callers talk to it
//! through a [`FacadeHandle`]: every operation is a fire-and-forget message,
//! and its effect is observed only through [`FacadeEvent`]s and the
//! [`PlaybackSnapshot`] watch channel. Both are published from the facade
//! task, so all notifications are serialized with the commands that caused
//! them.

use crate::error::App;
use crate::player::backend::{BackendEvent, BackendEventKind, Generation, MediaBackend};
use crate::player::types::{MediaSource, PlaybackState, Volume};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum FacadeEvent {
    PositionChanged(u64),
    DurationChanged(u64),
    PlaybackStateChanged(PlaybackState),
    Error(String),
}

/// Everything the facade currently believes about playback.
///
/// `confirmed` is the last state the backend reported and is the one that
/// counts; `requested` is the last state a command asked for. They differ
/// while a request is in flight, or forever if the backend never answers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub source: Option<MediaSource>,
    pub requested: PlaybackState,
    pub confirmed: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub volume: Volume,
}

impl PlaybackSnapshot {
    pub fn is_diverged(&self) -> bool {
        self.requested != self.confirmed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FacadeOptions {
    pub initial_volume: Volume,
    /// Log once when a request stays unconfirmed this long. `None` disables it.
    pub confirm_warn_after: Option<Duration>,
}

impl Default for FacadeOptions {
    fn default() -> Self {
        Self {
            initial_volume: Volume::default(),
            confirm_warn_after: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug)]
enum Command {
    Play(MediaSource),
    TogglePlayback,
    Stop,
    SetVolume(Volume),
    SetPosition(u64),
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

/// Caller side of the facade. Cheap to clone; the facade task ends once the
/// last handle is dropped or [`FacadeHandle::shutdown`] is called.
#[derive(Clone, Debug)]
pub struct FacadeHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<FacadeEvent>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    divergence_reports: Arc<AtomicUsize>,
}

impl FacadeHandle {
    pub fn play(&self, source: MediaSource) {
        self.send(Command::Play(source));
    }

    pub fn toggle_playback(&self) {
        self.send(Command::TogglePlayback);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn set_volume(&self, level: u8) {
        self.send(Command::SetVolume(Volume::new(level)));
    }

    pub fn set_position(&self, position_ms: u64) {
        self.send(Command::SetPosition(position_ms));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FacadeEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// How many times a request went unconfirmed past `confirm_warn_after`.
    pub fn divergence_reports(&self) -> usize {
        self.divergence_reports.load(Ordering::Relaxed)
    }

    /// Resolves once every command sent before it, and every backend event
    /// already queued, has been handled.
    pub async fn barrier(&self) {
        let (done_sender, done_receiver) = oneshot::channel();
        self.send(Command::Barrier(done_sender));
        let _ = done_receiver.await;
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            warn!("Playback facade is gone, dropping {:?}", e.0);
        }
    }
}

pub struct PlaybackFacade<B: MediaBackend> {
    backend: B,
    generation: Generation,
    state: PlaybackSnapshot,
    awaiting_stop: bool,
    diverged_since: Option<Instant>,
    divergence_reported: bool,
    divergence_reports: Arc<AtomicUsize>,
    confirm_warn_after: Option<Duration>,
    events: broadcast::Sender<FacadeEvent>,
    snapshot: watch::Sender<PlaybackSnapshot>,
}

impl<B: MediaBackend> PlaybackFacade<B> {
    /// Starts the facade task on `context`. Every notification is published
    /// from that task.
    pub fn spawn(
        backend: B,
        backend_events: mpsc::UnboundedReceiver<BackendEvent>,
        options: FacadeOptions,
        context: &Handle,
    ) -> (FacadeHandle, JoinHandle<()>) {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let (event_sender, _) = broadcast::channel(EVENT_CAPACITY);
        let state = PlaybackSnapshot {
            volume: options.initial_volume,
            ..PlaybackSnapshot::default()
        };
        let (snapshot_sender, snapshot_receiver) = watch::channel(state.clone());
        let divergence_reports = Arc::new(AtomicUsize::new(0));

        let mut facade = Self {
            backend,
            generation: 0,
            state,
            awaiting_stop: false,
            diverged_since: None,
            divergence_reported: false,
            divergence_reports: Arc::clone(&divergence_reports),
            confirm_warn_after: options.confirm_warn_after,
            events: event_sender.clone(),
            snapshot: snapshot_sender,
        };
        let result = facade.backend.set_gain(options.initial_volume.gain());
        facade.relay_failure("set initial volume", result);

        let task = context.spawn(facade.run(command_receiver, backend_events));
        let handle = FacadeHandle {
            commands: command_sender,
            events: event_sender,
            snapshot: snapshot_receiver,
            divergence_reports,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut backend_events: mpsc::UnboundedReceiver<BackendEvent>,
    ) {
        info!("Playback facade started");
        loop {
            let deadline = self.divergence_deadline();
            tokio::select! {
                biased;
                Some(event) = backend_events.recv() => self.handle_backend_event(event),
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                () = wait_until(deadline) => self.report_divergence(),
            }
            self.after_update();
        }

        let result = self.backend.stop();
        self.relay_failure("stop on shutdown", result);
        info!("Playback facade stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play(source) => self.play(source),
            Command::TogglePlayback => self.toggle_playback(),
            Command::Stop => self.stop(),
            Command::SetVolume(volume) => {
                debug!("Set volume {}", volume.level());
                self.state.volume = volume;
                let result = self.backend.set_gain(volume.gain());
                self.relay_failure("set volume", result);
            }
            Command::SetPosition(position_ms) => self.set_position(position_ms),
            Command::Barrier(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn play(&mut self, source: MediaSource) {
        self.generation += 1;
        info!("Play {} (generation {})", source, self.generation);

        self.awaiting_stop = false;
        self.state.requested = PlaybackState::Playing;
        self.update_position(0);
        self.update_duration(0);

        let result = self.backend.load(&source, self.generation);
        self.state.source = Some(source);
        if self.relay_failure("load source", result) {
            let result = self.backend.play();
            self.relay_failure("start playback", result);
        } else {
            self.state.requested = PlaybackState::Stopped;
        }
    }

    fn toggle_playback(&mut self) {
        if self.state.confirmed == PlaybackState::Playing {
            info!("Pause");
            self.state.requested = PlaybackState::Paused;
            let result = self.backend.pause();
            self.relay_failure("pause", result);
        } else if self.state.source.is_some() {
            info!("Resume playback");
            self.state.requested = PlaybackState::Playing;
            let result = self.backend.play();
            self.relay_failure("play", result);
        } else {
            debug!("No source loaded, ignoring toggle");
        }
    }

    fn stop(&mut self) {
        info!("Stop");
        self.state.requested = PlaybackState::Stopped;
        self.awaiting_stop = self.state.confirmed != PlaybackState::Stopped;
        let result = self.backend.stop();
        self.relay_failure("stop", result);
    }

    fn set_position(&mut self, position_ms: u64) {
        if self.state.source.is_none() {
            debug!("No source loaded, ignoring seek to {}ms", position_ms);
            return;
        }
        let target = self.clamp_to_duration(position_ms);
        debug!("Seek to {}ms", target);
        let result = self.backend.seek(target);
        self.relay_failure("seek", result);
    }

    fn handle_backend_event(&mut self, event: BackendEvent) {
        if event.generation != self.generation {
            debug!(
                "Dropping {:?} from superseded generation {}",
                event.kind, event.generation
            );
            return;
        }

        match event.kind {
            BackendEventKind::StateChanged(state) => {
                if self.state.confirmed != state {
                    info!("Playback state {} -> {}", self.state.confirmed, state);
                    self.state.confirmed = state;
                    self.emit(FacadeEvent::PlaybackStateChanged(state));
                }
                if state == PlaybackState::Stopped {
                    self.awaiting_stop = false;
                    self.update_position(0);
                }
            }
            BackendEventKind::DurationChanged(duration_ms) => self.update_duration(duration_ms),
            BackendEventKind::PositionChanged(position_ms) => {
                if self.awaiting_stop {
                    debug!("Stop pending, dropping position {}ms", position_ms);
                    return;
                }
                let position_ms = self.clamp_to_duration(position_ms);
                self.update_position(position_ms);
            }
            BackendEventKind::EndOfStream => {
                info!("End of stream");
                self.state.requested = PlaybackState::Stopped;
            }
            BackendEventKind::Error(message) => {
                error!("Backend error: {}", message);
                self.emit(FacadeEvent::Error(message));
            }
        }
    }

    fn update_position(&mut self, position_ms: u64) {
        if self.state.position_ms != position_ms {
            self.state.position_ms = position_ms;
            self.emit(FacadeEvent::PositionChanged(position_ms));
        }
    }

    fn update_duration(&mut self, duration_ms: u64) {
        if self.state.duration_ms != duration_ms {
            self.state.duration_ms = duration_ms;
            self.emit(FacadeEvent::DurationChanged(duration_ms));
        }
    }

    fn clamp_to_duration(&self, position_ms: u64) -> u64 {
        if self.state.duration_ms > 0 {
            position_ms.min(self.state.duration_ms)
        } else {
            position_ms
        }
    }

    /// Logs and relays a failed command. Returns whether it succeeded.
    fn relay_failure(&self, action: &str, result: Result<(), App>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to {}: {}", action, e);
                self.emit(FacadeEvent::Error(e.to_string()));
                false
            }
        }
    }

    fn emit(&self, event: FacadeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn after_update(&mut self) {
        if self.state.is_diverged() {
            if self.diverged_since.is_none() {
                self.diverged_since = Some(Instant::now());
                self.divergence_reported = false;
            }
        } else {
            self.diverged_since = None;
        }
        self.snapshot.send_if_modified(|current| {
            if *current == self.state {
                false
            } else {
                current.clone_from(&self.state);
                true
            }
        });
    }

    fn divergence_deadline(&self) -> Option<Instant> {
        if self.divergence_reported {
            return None;
        }
        Some(self.diverged_since? + self.confirm_warn_after?)
    }

    fn report_divergence(&mut self) {
        self.divergence_reported = true;
        self.divergence_reports.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Backend has not confirmed {} (last confirmed {})",
            self.state.requested, self.state.confirmed
        );
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
