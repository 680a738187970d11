//! Utility modules for plantry-ss

pub mod db_retry;

pub use db_retry::retry_on_lock;
