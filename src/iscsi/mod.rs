// Package iscsi exposes iSCSI portals, targets and the disks behind them.

pub mod api;

pub use api::{IscsiApi, IscsiError};
