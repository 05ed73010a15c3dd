// HTTP API controllers for the system, iscsi and smb groups.

pub mod controller;
pub mod group;
pub mod iscsi;
pub mod response;
pub mod smb;
pub mod system;

// Re-export controller types for convenience
pub use controller::Controller;
pub use group::ControllerGroup;
pub use iscsi::IscsiController;
pub use response::ApiError;
pub use smb::SmbController;
pub use system::SystemController;
