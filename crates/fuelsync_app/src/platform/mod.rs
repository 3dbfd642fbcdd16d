mod app;
pub mod config;
mod console;
mod effects;
pub mod logging;
mod persistence;
mod ui;

pub use app::{run, Plan};
