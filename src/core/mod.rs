// src/core/mod.rs - Evaluation engine, gate, aggregation, and ranking

pub mod aggregate;
pub mod decision;
pub mod engine;
pub mod history;
pub mod metrics;
pub mod ranking;
pub mod results;
pub mod types;
