// src/lib.rs - Library root for fixbench

pub mod benchmark;
pub mod cli;
pub mod core;
pub mod evaluator;
pub mod infra;
pub mod provider;
