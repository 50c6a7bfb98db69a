pub mod actions;
pub mod config;
pub mod handler;
pub mod intake;
pub mod router;
pub mod state;
