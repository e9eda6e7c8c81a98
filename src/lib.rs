//! Autonomous exploratory data analysis over CSV and Parquet datasets.

pub mod agent;
pub mod cli;
pub mod config;
pub mod execution;
pub mod functions;
pub mod handlers;
pub mod llm;
pub mod memory;
pub mod printer;
pub mod render;
pub mod role;
pub mod table;
pub mod tools;
