pub mod aggregate;
pub mod aws;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod collectors;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod environment;
pub mod filter;
pub mod pool;
pub mod reporter;
pub mod scheduler;
pub mod sts;
pub mod util;
