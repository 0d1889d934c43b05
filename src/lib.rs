pub mod codec;
pub mod config;
pub mod conflict;
pub mod contracts;
pub mod generator;
pub mod metrics;
pub mod storage;
