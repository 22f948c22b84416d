pub mod clips;
pub mod config;
pub mod id;
pub mod log;
pub mod memory;
pub mod rate_limit;
pub mod redis;
pub mod store;
pub mod structs;
