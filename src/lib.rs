//! Flood early-warning service.
//!
//! Field readings flow through validation, a per-site sliding window, a
//! sequence risk model and a hysteresis classifier, producing one alert
//! record per scored window.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod replay;
pub mod scoring;
pub mod sites;
pub mod store;
pub mod validate;
pub mod verify;
pub mod window;
