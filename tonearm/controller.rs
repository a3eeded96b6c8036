//! Headless stand-in for the player window.
//!
//! Holds what a window would show (track label, progress slider, play/pause
//! button text, volume slider) and turns user intents into facade calls.

use crate::config::Config;
use crate::error::App;
use crate::player::{FacadeEvent, FacadeHandle, MediaSource, PlaybackState};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Presentation {
    pub track_label: String,
    pub progress_value: u64,
    pub progress_maximum: u64,
    pub slider_down: bool,
    pub play_pause_label: String,
    pub volume: u8,
}

impl Presentation {
    fn new(volume: u8) -> Self {
        Self {
            track_label: String::new(),
            progress_value: 0,
            progress_maximum: 0,
            slider_down: false,
            play_pause_label: "Play".to_string(),
            volume,
        }
    }
}

pub struct TransportController {
    facade: FacadeHandle,
    view: Presentation,
    audio_extensions: Vec<String>,
    fallback_file: PathBuf,
}

impl TransportController {
    /// `audio_dir` is where the fallback track is looked up.
    pub fn new(facade: FacadeHandle, config: &Config, audio_dir: &Path) -> Self {
        let view = Presentation::new(config.default_volume.min(100));
        facade.set_volume(view.volume);
        Self {
            facade,
            view,
            audio_extensions: config
                .audio_extensions
                .iter()
                .map(|extension| extension.to_ascii_lowercase())
                .collect(),
            fallback_file: audio_dir.join(&config.fallback_track),
        }
    }

    pub fn view(&self) -> &Presentation {
        &self.view
    }

    /// Opens `locator`, or the fallback track when none is given.
    pub fn open(&mut self, locator: Option<&str>) -> Result<MediaSource, App> {
        let source = match locator {
            Some(locator) => MediaSource::parse(locator),
            None => MediaSource::from_path(&self.fallback_file),
        };

        if let Err(e) = self.check_source(&source) {
            warn!("Refusing to open {}: {}", source, e);
            return Err(e);
        }

        info!("Open {}", source);
        self.view.track_label = source.file_name();
        self.facade.play(source.clone());
        Ok(source)
    }

    fn check_source(&mut self, source: &MediaSource) -> Result<(), App> {
        let name = source.file_name();
        let supported = Path::new(&name)
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                self.audio_extensions
                    .contains(&extension.to_ascii_lowercase())
            });
        if !supported {
            self.view.track_label = format!("Unsupported file: {name}");
            return Err(App::Source(format!("{source} is not an audio file")));
        }

        if let MediaSource::Path(path) = source {
            if !path.exists() {
                self.view.track_label = format!("File not found: {}", path.display());
                return Err(App::Source(format!("{} does not exist", path.display())));
            }
        }
        Ok(())
    }

    pub fn play_pause(&self) {
        self.facade.toggle_playback();
    }

    pub fn stop(&self) {
        self.facade.stop();
    }

    pub fn volume_changed(&mut self, level: u8) {
        self.view.volume = level.min(100);
        self.facade.set_volume(self.view.volume);
    }

    pub fn slider_pressed(&mut self) {
        self.view.slider_down = true;
    }

    pub fn slider_moved(&mut self, position_ms: u64) {
        self.view.progress_value = position_ms;
        self.facade.set_position(position_ms);
    }

    pub fn slider_released(&mut self) {
        self.view.slider_down = false;
    }

    pub fn apply(&mut self, event: &FacadeEvent) {
        match event {
            // The slider belongs to the user while it is held down.
            FacadeEvent::PositionChanged(position_ms) => {
                if !self.view.slider_down {
                    self.view.progress_value = *position_ms;
                }
            }
            FacadeEvent::DurationChanged(duration_ms) => {
                self.view.progress_maximum = *duration_ms;
            }
            FacadeEvent::PlaybackStateChanged(state) => {
                self.view.play_pause_label = play_pause_label(*state);
            }
            FacadeEvent::Error(message) => {
                self.view.track_label = format!("Error: {message}");
            }
        }
    }

    /// Rebuilds the playback part of the view from the facade snapshot, for
    /// when notifications were lost.
    pub fn resync(&mut self) {
        let snapshot = self.facade.snapshot();
        self.view.play_pause_label = play_pause_label(snapshot.confirmed);
        self.view.progress_maximum = snapshot.duration_ms;
        if !self.view.slider_down {
            self.view.progress_value = snapshot.position_ms;
        }
    }
}

fn play_pause_label(state: PlaybackState) -> String {
    if state == PlaybackState::Playing {
        "Pause".to_string()
    } else {
        "Play".to_string()
    }
}

/// Feeds facade notifications into the controller until the facade goes away.
pub async fn follow_events(
    controller: Arc<Mutex<TransportController>>,
    mut events: broadcast::Receiver<FacadeEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => controller.lock().await.apply(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Controller fell behind, skipped {} notifications", skipped);
                controller.lock().await.resync();
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    info!("Facade notifications closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{BackendEvent, FacadeOptions, Generation, MediaBackend, PlaybackFacade};
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    struct SilentBackend;

    impl MediaBackend for SilentBackend {
        fn load(&mut self, _: &MediaSource, _: Generation) -> Result<(), App> {
            Ok(())
        }
        fn play(&mut self) -> Result<(), App> {
            Ok(())
        }
        fn pause(&mut self) -> Result<(), App> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), App> {
            Ok(())
        }
        fn seek(&mut self, _: u64) -> Result<(), App> {
            Ok(())
        }
        fn set_gain(&mut self, _: f64) -> Result<(), App> {
            Ok(())
        }
    }

    fn controller_in(audio_dir: &Path) -> (TransportController, FacadeHandle) {
        let (_backend_sender, backend_receiver) = mpsc::unbounded_channel::<BackendEvent>();
        let (facade, _task) = PlaybackFacade::spawn(
            SilentBackend,
            backend_receiver,
            FacadeOptions::default(),
            &Handle::current(),
        );
        let config = Config {
            default_volume: 30,
            ..Config::default()
        };
        (
            TransportController::new(facade.clone(), &config, audio_dir),
            facade,
        )
    }

    #[tokio::test]
    async fn construction_pushes_default_volume() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, facade) = controller_in(dir.path());
        facade.barrier().await;

        assert_eq!(controller.view().volume, 30);
        assert_eq!(facade.snapshot().volume.level(), 30);
    }

    #[tokio::test]
    async fn missing_fallback_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, facade) = controller_in(dir.path());

        let result = controller.open(None);
        facade.barrier().await;

        assert!(result.is_err());
        assert!(controller.view().track_label.starts_with("File not found: "));
        assert_eq!(facade.snapshot().source, None);
    }

    #[tokio::test]
    async fn existing_fallback_is_played() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("sample.mp3");
        std::fs::write(&fallback, b"").unwrap();
        let (mut controller, facade) = controller_in(dir.path());

        controller.open(None).unwrap();
        facade.barrier().await;

        assert_eq!(controller.view().track_label, "sample.mp3");
        assert_eq!(facade.snapshot().source, Some(MediaSource::Path(fallback)));
    }

    #[tokio::test]
    async fn non_audio_files_are_filtered_out() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"").unwrap();
        let (mut controller, _facade) = controller_in(dir.path());

        let result = controller.open(notes.to_str());

        assert!(matches!(result, Err(App::Source(_))));
        assert_eq!(controller.view().track_label, "Unsupported file: notes.txt");
    }

    #[tokio::test]
    async fn extension_filter_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("LOUD.FLAC");
        std::fs::write(&track, b"").unwrap();
        let (mut controller, _facade) = controller_in(dir.path());

        assert!(controller.open(track.to_str()).is_ok());
        assert_eq!(controller.view().track_label, "LOUD.FLAC");
    }

    #[tokio::test]
    async fn held_slider_ignores_position_updates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, _facade) = controller_in(dir.path());

        controller.apply(&FacadeEvent::PositionChanged(1_000));
        controller.slider_pressed();
        controller.slider_moved(40_000);
        controller.apply(&FacadeEvent::PositionChanged(1_200));
        assert_eq!(controller.view().progress_value, 40_000);

        controller.slider_released();
        controller.apply(&FacadeEvent::PositionChanged(40_200));
        assert_eq!(controller.view().progress_value, 40_200);
    }

    #[tokio::test]
    async fn button_label_follows_confirmed_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, _facade) = controller_in(dir.path());

        controller.apply(&FacadeEvent::PlaybackStateChanged(PlaybackState::Playing));
        assert_eq!(controller.view().play_pause_label, "Pause");
        controller.apply(&FacadeEvent::PlaybackStateChanged(PlaybackState::Paused));
        assert_eq!(controller.view().play_pause_label, "Play");
    }

    #[tokio::test]
    async fn lagging_follower_resyncs_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, facade) = controller_in(dir.path());
        facade.barrier().await;
        controller.apply(&FacadeEvent::PlaybackStateChanged(PlaybackState::Playing));
        controller.apply(&FacadeEvent::DurationChanged(60_000));
        let controller = Arc::new(Mutex::new(controller));

        let (sender, receiver) = broadcast::channel(1);
        for position in [1_000, 2_000, 3_000] {
            sender.send(FacadeEvent::PositionChanged(position)).unwrap();
        }
        drop(sender);
        follow_events(Arc::clone(&controller), receiver).await;

        let controller = controller.lock().await;
        assert_eq!(controller.view().play_pause_label, "Play");
        assert_eq!(controller.view().progress_maximum, 0);
        assert_eq!(controller.view().progress_value, 3_000);
    }

    #[tokio::test]
    async fn resync_leaves_held_slider_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, facade) = controller_in(dir.path());
        facade.barrier().await;
        controller.slider_pressed();
        controller.slider_moved(40_000);

        controller.resync();

        assert_eq!(controller.view().progress_value, 40_000);
    }

    #[tokio::test]
    async fn duration_sets_slider_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, _facade) = controller_in(dir.path());

        controller.apply(&FacadeEvent::DurationChanged(180_000));

        assert_eq!(controller.view().progress_maximum, 180_000);
    }
}
