//! Process exit codes.
//! These codes are part of the public contract for scripted runs.

pub const SUCCESS: i32 = 0;
pub const VERSIONS_FAILED: i32 = 1; // At least one version could not be synthesized
pub const FATAL: i32 = 2; // Configuration, catalog or key loading failed
pub const VERIFICATION_FAILED: i32 = 3; // A signature did not verify against any trusted key
