pub mod config;
pub mod error;
pub mod identity;
pub mod logger;
pub mod programs;
pub mod services;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
