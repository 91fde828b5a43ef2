//! End-to-end tests for the serial socket bridge.
//!
//! These tests drive a [`BridgeService`](serial_socket_bridge::BridgeService)
//! or its parts from the outside, the way a deployment would.

pub mod serial_tests;
pub mod tcp_tests;

#[cfg(feature = "websocket")]
pub mod websocket_tests;
