// Package app wires the management APIs into a running server.

#[allow(clippy::module_inception)]
pub mod app;

pub use app::App;
