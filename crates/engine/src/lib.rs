pub mod config;
pub mod dispatch;
pub mod execution;
pub mod gateway;
pub mod jobs;
pub mod limiter;
pub mod logging;
pub mod segments;
pub mod webhook;
