#[path = "shared/powershell/mod.rs"]
pub mod powershell;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod app;
pub mod cim;
pub mod config;
pub mod controller;
pub mod iscsi;
pub mod server;
pub mod shutdown;
pub mod smb;
pub mod system;
