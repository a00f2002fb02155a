pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod remote;
pub mod seed;
pub mod session;
pub mod storage;
pub mod sync;
