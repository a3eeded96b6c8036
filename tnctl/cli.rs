mod error;

use clap::{Parser, Subcommand};
use error::App;
use serde::Deserialize;
use tokio::process::Command;
use zbus::{proxy, Connection};

type StdResult<T> = std::result::Result<T, App>;

#[proxy(
    interface = "org.tonearm.Player",
    default_service = "org.tonearm.Player",
    default_path = "/org/tonearm/Player"
)]
trait Player {
    async fn test_connection(&self) -> zbus::Result<()>;
    async fn open(&self, path: &str) -> zbus::Result<String>;
    async fn play_pause(&self) -> zbus::Result<()>;
    async fn stop(&self) -> zbus::Result<()>;
    async fn set_volume(&self, level: u8) -> zbus::Result<()>;
    async fn slider_pressed(&self) -> zbus::Result<()>;
    async fn slider_moved(&self, position_ms: u64) -> zbus::Result<()>;
    async fn slider_released(&self) -> zbus::Result<()>;
    async fn status(&self) -> zbus::Result<String>;
    async fn quit(&self) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(name = "tnctl", about = "Control the tonearm player.", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the tonearm daemon")]
    Start,

    #[command(about = "Open and play an audio file (the fallback track if omitted)")]
    Open {
        #[arg(help = "Path or URI of an mp3, flac or wav file")]
        path: Option<String>,
    },

    #[command(about = "Toggle between play and pause")]
    Toggle,

    #[command(about = "Stop playback")]
    Stop,

    #[command(about = "Set the volume")]
    Volume {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },

    #[command(about = "Seek to a position in milliseconds")]
    Seek { position_ms: u64 },

    #[command(about = "Show what the player is doing")]
    Status {
        #[arg(long, help = "Print the raw JSON status")]
        json: bool,
    },

    #[command(about = "Shut the daemon down")]
    Quit,
}

#[derive(Deserialize)]
struct Status {
    view: View,
    playback: Playback,
}

#[derive(Deserialize)]
struct View {
    track_label: String,
    volume: u8,
}

#[derive(Deserialize)]
struct Playback {
    requested: String,
    confirmed: String,
    position_ms: u64,
    duration_ms: u64,
}

#[tokio::main]
async fn main() -> StdResult<()> {
    let cli = Cli::parse();
    let connection = Connection::session().await?;
    let proxy = PlayerProxy::new(&connection).await?;
    handle_command(cli, proxy).await
}

async fn handle_command(cli: Cli, proxy: PlayerProxy<'_>) -> StdResult<()> {
    match cli.command {
        Commands::Start => start_tonearm(&proxy).await,
        command => {
            if is_tonearm_running(&proxy).await {
                handle_player_command(command, &proxy).await
            } else {
                eprintln!("tonearm is not running, start it with `tnctl start`");
                Ok(())
            }
        }
    }
}

async fn handle_player_command(command: Commands, proxy: &PlayerProxy<'_>) -> StdResult<()> {
    match command {
        Commands::Start => start_tonearm(proxy).await?,
        Commands::Open { path } => {
            let label = proxy.open(path.as_deref().unwrap_or_default()).await?;
            println!("Playing {label}");
        }
        Commands::Toggle => proxy.play_pause().await?,
        Commands::Stop => proxy.stop().await?,
        Commands::Volume { level } => {
            proxy.set_volume(level).await?;
            println!("Volume set to {level}");
        }
        Commands::Seek { position_ms } => {
            proxy.slider_pressed().await?;
            proxy.slider_moved(position_ms).await?;
            proxy.slider_released().await?;
            println!("Seek to {}", format_ms(position_ms));
        }
        Commands::Status { json } => {
            let raw = proxy.status().await?;
            if json {
                println!("{raw}");
            } else {
                let status: Status = serde_json::from_str(&raw)?;
                println!("{}", describe(&status));
            }
        }
        Commands::Quit => {
            proxy.quit().await?;
            println!("tonearm has exited");
        }
    }
    Ok(())
}

async fn is_tonearm_running(proxy: &PlayerProxy<'_>) -> bool {
    proxy.test_connection().await.is_ok()
}

async fn start_tonearm(proxy: &PlayerProxy<'_>) -> StdResult<()> {
    if is_tonearm_running(proxy).await {
        println!("tonearm is already running");
        return Ok(());
    }

    let current_exe_path = std::env::current_exe()?;
    let exe_dir = current_exe_path.parent().ok_or_else(|| {
        App::InvalidInput("Failed to get the directory of the executable".to_string())
    })?;
    let tonearm_path = exe_dir.join("tonearm");

    if !tonearm_path.exists() {
        return Err(App::InvalidInput(
            "tonearm executable not found in the same directory".to_string(),
        ));
    }

    let child = Command::new(tonearm_path).spawn()?;
    println!("tonearm started, process ID: {:?}", child.id());
    Ok(())
}

fn describe(status: &Status) -> String {
    let playback = &status.playback;
    let mut state = playback.confirmed.clone();
    if playback.requested != playback.confirmed {
        state = format!("{state} (requested {})", playback.requested);
    }
    format!(
        "{state}  {} / {}  vol {}  {}",
        format_ms(playback.position_ms),
        format_ms(playback.duration_ms),
        status.view.volume,
        status.view.track_label
    )
}

fn format_ms(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
