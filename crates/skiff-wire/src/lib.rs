//! # Skiff Wire
//!
//! The byte layer between two paired peers.
//!
//! This crate provides:
//! - Length-prefixed framing over any reliable byte stream
//! - The typed protocol message and its codec: JSON, deflate, then the
//!   AEAD envelope

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod framed;
pub mod message;

pub use error::WireError;
pub use framed::FramedStream;
pub use message::{Message, MessageKind};
