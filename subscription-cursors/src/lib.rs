pub mod codec;
pub mod comparator;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod fold;
pub mod keys;
pub mod metric_consts;
pub mod offsets;
pub mod ownership;
pub mod types;
