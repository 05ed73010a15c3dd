// Shared test support code for unit and integration tests.
// In-memory collaborators standing in for the host's management layer and transports.

pub mod cim;
pub mod services;
pub mod shell;
pub mod transport;

pub use cim::{Call, FakeClient};
pub use services::FakeServiceGraph;
pub use shell::FakeShell;
pub use transport::FakeTransport;
