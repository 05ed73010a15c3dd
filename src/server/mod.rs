// Package server hosts every versioned API group on its own endpoint and runs them as
// a single unit.

pub mod error;
pub mod server;
pub mod transport;
pub mod types;


pub use error::ServerError;
pub use server::Server;
pub use transport::{Listener, TcpTransport, Transport, DEFAULT_DRAIN_TIMEOUT};
pub use types::{ApiGroup, Registrant, VersionedApi};
