pub mod config;

pub use config::{Configuration, ElasticsearchConfig, RetentionRule};
