// Package smb maps remote SMB shares on the host and links them into local paths.

pub mod api;


pub use api::{SmbApi, SmbError, GLOBAL_MAPPING_CLASS};
