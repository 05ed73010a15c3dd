// Package cim provides access to the host's management instrumentation and the
// correlation engine that answers topology questions over it.

pub mod client;
pub mod correlate;
pub mod disk;
pub mod indexer;
pub mod iscsi;
pub mod powershell;
pub mod query;
pub mod record;


pub const NAMESPACE_CIMV2: &str = r"root\cimv2";
pub const NAMESPACE_STORAGE: &str = r"root\Microsoft\Windows\Storage";
pub const NAMESPACE_SMB: &str = r"root\Microsoft\Windows\SMB";

// Re-export main types
pub use client::{ignore_not_found, CimError, ManagementClient, MethodResult};
pub use correlate::{build_mapping, correlate, CorrelationError, MappingTable};
pub use indexer::{object_ref, parse_object_ref, string_property, Indexer, Key};
pub use powershell::PowerShellClient;
pub use query::{Filter, Operator, Query};
pub use record::Record;
