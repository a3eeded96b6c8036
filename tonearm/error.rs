use flexi_logger::FlexiLoggerError;
use std::io;
use thiserror::Error;
use zbus::Error as ZbusError;

#[derive(Error, Debug, Clone)]
pub enum App {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Environment variable error: {0}")]
    EnvVar(String),

    #[error("GStreamer initialization error: {0}")]
    Init(String),

    #[error("GStreamer element error: {0}")]
    Element(String),

    #[error("GStreamer state error: {0}")]
    State(String),

    #[error("GStreamer seek error: {0}")]
    Seek(String),

    #[error("Invalid media source: {0}")]
    Source(String),

    #[error("TOML parsing error: {0}")]
    TomlParsing(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(String),

    #[error("Logger initialization error: {0}")]
    Logger(String),

    #[error("ZBus error: {0}")]
    ZBus(String),
}

impl From<io::Error> for App {
    fn from(error: io::Error) -> Self {
        App::Io(error.to_string())
    }
}

impl From<std::env::VarError> for App {
    fn from(error: std::env::VarError) -> Self {
        App::EnvVar(error.to_string())
    }
}

impl From<toml::de::Error> for App {
    fn from(error: toml::de::Error) -> Self {
        App::TomlParsing(error.to_string())
    }
}

impl From<toml::ser::Error> for App {
    fn from(error: toml::ser::Error) -> Self {
        App::TomlSerialize(error.to_string())
    }
}

impl From<FlexiLoggerError> for App {
    fn from(error: FlexiLoggerError) -> Self {
        App::Logger(error.to_string())
    }
}

impl From<ZbusError> for App {
    fn from(error: ZbusError) -> Self {
        App::ZBus(error.to_string())
    }
}
