pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod sentiment;
pub mod stream;
pub mod types;
