//! Event payloads published on the engine's broadcast channels.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them to its UI layer (IPC bus, websocket, ...) as-is.

pub mod events;
