mod client;

pub use client::{GatewayClient, DEFAULT_GATEWAY_BASE};
