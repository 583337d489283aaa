pub mod cli;
pub mod config;
pub mod db;
pub mod export;
pub mod indexer;
pub mod model;
pub mod util;
