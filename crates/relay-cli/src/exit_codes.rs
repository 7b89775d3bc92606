//! Exit codes for the `relay` binary.

pub const SUCCESS: i32 = 0;
pub const COMMAND_FAILED: i32 = 1; // Dev server exited non-zero
pub const INTERNAL_ERROR: i32 = 2; // Setup or config error
pub const STARTUP_FAILED: i32 = 3; // Dev server never reported a port
