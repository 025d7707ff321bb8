//! Test utilities for vetted crates.

pub mod server;

pub use server::{responses, TestHttpServer};

use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Writes `content` to `.vetted/config.yaml` inside a fresh temporary
/// project directory.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let config_dir = dir.path().join(".vetted");
    std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    let path = config_dir.join("config.yaml");
    std::fs::write(&path, content).expect("Failed to write temp config");
    (dir, path)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
