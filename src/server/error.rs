// Server orchestrator errors.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyStarted,
    #[error("server not started yet")]
    NotStarted,
    #[error("listening for API group {group} version {version} on {address} failed: {source}")]
    Listen {
        group: String,
        version: String,
        address: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("server for API group {group} version {version} failed: {source}")]
    Serve {
        group: String,
        version: String,
        #[source]
        source: anyhow::Error,
    },
}
