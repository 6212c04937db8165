pub mod aggregator;
pub mod app;
pub mod config;
pub mod db;
pub mod db_ops;
pub mod handlers;
pub mod report;
pub mod storage;

pub use logindash_models as models;
