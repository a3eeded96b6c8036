use std::sync::Arc;

use log::{error, info};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use zbus::{fdo, interface, ConnectionBuilder};

use crate::controller::{Presentation, TransportController};
use crate::error::App;
use crate::player::{FacadeHandle, PlaybackSnapshot};

pub const SERVICE_NAME: &str = "org.tonearm.Player";
pub const OBJECT_PATH: &str = "/org/tonearm/Player";

#[derive(Serialize)]
struct Status {
    view: Presentation,
    playback: PlaybackSnapshot,
}

#[derive(Clone)]
pub struct PlayerDBus {
    controller: Arc<Mutex<TransportController>>,
    facade: FacadeHandle,
    stop_signal: watch::Sender<()>,
}

#[interface(name = "org.tonearm.Player")]
impl PlayerDBus {
    #[allow(clippy::unused_self)]
    fn test_connection(&self) {}

    /// Empty `path` opens the fallback track. Returns the new track label.
    async fn open(&self, path: String) -> fdo::Result<String> {
        let mut controller = self.controller.lock().await;
        let locator = (!path.is_empty()).then_some(path.as_str());
        controller
            .open(locator)
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;
        Ok(controller.view().track_label.clone())
    }

    async fn play_pause(&self) {
        self.controller.lock().await.play_pause();
    }

    async fn stop(&self) {
        self.controller.lock().await.stop();
    }

    async fn set_volume(&self, level: u8) {
        self.controller.lock().await.volume_changed(level);
    }

    async fn slider_pressed(&self) {
        self.controller.lock().await.slider_pressed();
    }

    async fn slider_moved(&self, position_ms: u64) {
        self.controller.lock().await.slider_moved(position_ms);
    }

    async fn slider_released(&self) {
        self.controller.lock().await.slider_released();
    }

    async fn status(&self) -> fdo::Result<String> {
        self.facade.barrier().await;
        let status = Status {
            view: self.controller.lock().await.view().clone(),
            playback: self.facade.snapshot(),
        };
        serde_json::to_string(&status).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    fn quit(&self) {
        if let Err(e) = self.stop_signal.send(()) {
            error!("Failed to send stop signal: {}", e);
        }
    }
}

pub async fn run_dbus_server(
    controller: Arc<Mutex<TransportController>>,
    facade: FacadeHandle,
    stop_signal: watch::Sender<()>,
) -> Result<(), App> {
    let player_dbus = PlayerDBus {
        controller,
        facade,
        stop_signal: stop_signal.clone(),
    };

    let _connection = ConnectionBuilder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, player_dbus)?
        .build()
        .await?;
    info!("Serving {} on the session bus", SERVICE_NAME);

    let mut stop_receiver = stop_signal.subscribe();
    let _ = stop_receiver.changed().await;
    info!("Stop signal received, shutting down DBus server...");

    Ok(())
}
