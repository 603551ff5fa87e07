//! # Formats
//!
//! Interchange and persistence encodings. Pure transformations only; file
//! I/O lives in the app layer.
//!
//! - `json`: the interchange document shape (`ToJson` / `FromJson`)
//! - `persistence`: the binary snapshot (header + postcard payload)

pub mod json;
pub mod persistence;

pub use json::{FromJson, ToJson};
pub use persistence::{
    MAX_SNAPSHOT_SIZE, SessionSnapshot, SnapshotHeader, session_from_bytes, session_to_bytes,
};
