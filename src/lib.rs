//! MySQL pool plugin
//!
//! Opens one or more MySQL pools while a plugin is registered with the host,
//! makes them reachable through exposures or server and request decorations,
//! and ends them when the host stops.

pub mod api;
pub mod config;
pub mod db;
pub mod host;
pub mod plugin;
