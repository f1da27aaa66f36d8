//! Command handlers

pub mod config;
pub mod daemon;
pub mod room;
pub mod status;
