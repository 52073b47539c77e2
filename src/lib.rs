pub mod aggregate;
pub mod cancel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod git;
pub mod model;
pub mod range;
pub mod render;
pub mod repos;
pub mod scan;
pub mod summarize;
