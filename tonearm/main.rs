use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task;
use tonearm::config::{self, Config};
use tonearm::controller::{follow_events, TransportController};
use tonearm::dbus;
use tonearm::error::App;
use tonearm::player::{FacadeOptions, GstBackend, PlaybackFacade};

#[tokio::main]
async fn main() -> Result<(), App> {
    let log_dir = config::log_dir()?;
    fs::create_dir_all(&log_dir).await?;
    let config = Config::load_or_create(&config::config_file()?).await?;

    let _logger = Logger::try_with_str(&config.log_level)?
        .log_to_file(FileSpec::default().directory(&log_dir))
        .rotate(
            Criterion::Size(1_000_000),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .duplicate_to_stderr(Duplicate::None)
        .start()?;

    // Every facade call and notification runs on this runtime.
    let runtime = Handle::current();
    let (backend_sender, backend_receiver) = mpsc::unbounded_channel();
    let backend = GstBackend::new(backend_sender, config.position_interval(), runtime.clone())?;
    let (facade, facade_task) = PlaybackFacade::spawn(
        backend,
        backend_receiver,
        FacadeOptions::from(&config),
        &runtime,
    );

    let controller = Arc::new(Mutex::new(TransportController::new(
        facade.clone(),
        &config,
        &audio_dir()?,
    )));
    task::spawn(follow_events(Arc::clone(&controller), facade.subscribe()));

    let (stop_sender, mut stop_receiver) = watch::channel(());
    task::spawn({
        let controller = Arc::clone(&controller);
        let facade = facade.clone();
        let stop_sender = stop_sender.clone();
        async move {
            if let Err(e) = dbus::run_dbus_server(controller, facade, stop_sender.clone()).await {
                error!("DBus listener error: {}", e);
                let _ = stop_sender.send(());
            }
        }
    });

    tokio::select! {
        _ = stop_receiver.changed() => info!("Quit requested"),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            let _ = stop_sender.send(());
        }
    }

    facade.shutdown();
    if let Err(e) = facade_task.await {
        error!("Playback facade task failed: {}", e);
    }
    Ok(())
}

/// `audio/` next to the executable, home of the fallback track.
fn audio_dir() -> Result<PathBuf, App> {
    let current_exe_path = std::env::current_exe()?;
    let exe_dir = current_exe_path
        .parent()
        .ok_or_else(|| App::Io("Failed to get the directory of the executable".to_string()))?;
    Ok(exe_dir.join("audio"))
}
