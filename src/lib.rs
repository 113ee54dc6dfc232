pub mod analyzer;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod matcher;
pub mod normalizer;
pub mod scanner;
