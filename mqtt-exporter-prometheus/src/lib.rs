//! Prometheus metrics exporter for MQTT device telemetry.
//!
//! This crate subscribes to device topics on an MQTT broker, keeps the latest
//! temperature, humidity and power readings per device, and exposes them via
//! an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   MQTT Broker   │────>│   Dispatcher    │────>│ MetricRegistry  │
//! │ (tele/+/+ ...)  │     │ (decode, write) │     │    (RwLock)     │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │ snapshot
//!                                                 ┌────────▼────────┐
//!                                                 │   HTTP Server   │
//!                                                 │   (/metrics)    │
//!                                                 └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! mqtt-exporter-prometheus --config config.json5
//! mqtt-exporter-prometheus --broker tcp://localhost:1883 --topic "tele/+/+ stat/+/+"
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod exposition;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod subscriber;
pub mod translator;

pub use config::ExporterConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use http::HttpServer;
pub use metrics::{LabelSet, MetricName};
pub use registry::{MetricRegistry, SharedRegistry, Snapshot};
pub use subscriber::TelemetrySubscriber;
