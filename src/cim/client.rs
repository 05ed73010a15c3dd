//! Management query collaborator interface.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::query::Query;
use super::record::Record;
use crate::powershell::ShellError;

#[derive(Debug, thiserror::Error)]
pub enum CimError {
    #[error("no instances found for `{query}` in namespace {namespace}")]
    NotFound { namespace: String, query: String },
    #[error("query `{query}` failed: {reason}")]
    Query { query: String, reason: String },
    #[error("method {class}.{method} failed: {reason}")]
    Method {
        class: String,
        method: String,
        reason: String,
    },
    #[error("property {property} of {class}: {reason}")]
    Property {
        class: String,
        property: String,
        reason: String,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl CimError {
    /// Reports whether the error only means that nothing matched.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CimError::NotFound { .. })
    }
}

/// Turns a not-found outcome into an empty result.
pub fn ignore_not_found(result: Result<Vec<Record>, CimError>) -> Result<Vec<Record>, CimError> {
    match result {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Outcome of a method invocation: the method's return code plus its out parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodResult {
    pub return_value: u32,
    pub out_params: Map<String, Value>,
}

/// ManagementClient queries and invokes methods against the host's management instrumentation.
///
/// Queries that match nothing fail with [`CimError::NotFound`].
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Lists the instances selected by the query.
    async fn query_instances(&self, query: &Query) -> Result<Vec<Record>, CimError>;

    /// Lists the instances associated with the single instance identified by `source`.
    async fn query_associated(
        &self,
        source: &Query,
        association: &str,
        role: &str,
    ) -> Result<Vec<Record>, CimError>;

    /// Invokes a static method of a class.
    async fn invoke_class_method(
        &self,
        namespace: &str,
        class: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError>;

    /// Invokes a method on every instance selected by `target`.
    async fn invoke_instance_method(
        &self,
        target: &Query,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult, CimError>;
}
