//! # MQTT Telemetry Module
//!
//! Receives the ESP32's HDLC telemetry from the broker. The device compresses
//! every frame with LZ4 (frame format) before publishing, so each inbound
//! message is decoded here and logged as lowercase hex for inspection.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Broker address, topic and keep-alive
//! ├── frame.rs         - Inbound frame representation and LZ4 decoding
//! ├── listener.rs      - Connect/message handling and the supervised task handle
//! └── mqtt_handler.rs  - rumqttc event loop driving the handler
//! ```
//!
//! ## Event Flow
//!
//! ```text
//! Broker ──► EventLoop::poll ──► BrokerEvents::on_connect(code) ──► subscribe(topic)
//!                           └──► BrokerEvents::on_message(frame) ──► decompress ──► log hex
//! ```
//!
//! ## Failure Model
//!
//! Nothing in this module retries. A refused connection or a transport error
//! is logged and ends the receive loop; a frame that fails to decompress is
//! logged and the loop moves on to the next one.

pub mod config;
pub mod frame;
pub mod listener;
pub mod mqtt_handler;
