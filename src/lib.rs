//! Veredicto - Statistical anomaly detection engine for performance tests
//!
//! This library turns a performance test's time-series metrics (throughput,
//! concurrent users, response-time percentiles, error rate) into an
//! automated verdict: whether the system scaled linearly during ramp-up,
//! whether steady-state metrics stayed statistically stable, and where
//! anomalous excursions occurred.

pub mod changepoint;
pub mod check;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod isolation_forest;
pub mod period;
pub mod stationarity;
pub mod stats;
pub mod summary;
pub mod window;
