// Library exports for testing
// The binary (main.rs) imports these as well

pub mod error;
pub mod logger;
pub mod scenario;
pub mod session;

#[cfg(test)]
mod tests;

/// Directory name under the platform data and config dirs.
pub const APP_DIR_NAME: &str = "ipc-messenger";
