//! Shared value types used across the engine

pub mod models;
