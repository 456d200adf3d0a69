//! Process exit codes.

pub const SUCCESS: u8 = 0;

/// Invalid configuration, or any failure while starting or serving.
pub const FAILURE: u8 = 1;

/// The remote WebDAV server did not answer the startup probe.
pub const REMOTE_UNREACHABLE: u8 = 2;
