//! Backend for a personal daily planner. Each day's chain of items is laid
//! out backwards from a fixed anchor and kept consistent as times change.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod schedule;
pub mod server;
pub mod travel;
