//! # Device Control Module
//!
//! Talks to the ESP32's HTTP control API. The only operation the bridge needs
//! is a one-shot configuration push that points the device at a new broker
//! and a new upload endpoint.
//!
//! ```text
//! device/
//! ├── config.rs        - Device endpoint and the configuration payload
//! └── configurator.rs  - The POST request and its logging
//! ```
//!
//! The push is fire-and-forget: the bridge logs the device's answer and
//! carries on regardless of the outcome.

pub mod config;
pub mod configurator;
