pub mod analysis;
pub mod app;
pub mod config;
pub mod error;
pub mod sessions;
pub mod state;
pub mod workflow;
