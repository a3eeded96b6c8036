pub mod config;
pub mod controller;
pub mod dbus;
pub mod error;
pub mod player;
