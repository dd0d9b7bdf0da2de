//! Selector resolution - durable element descriptors
//!
//! This crate turns live element attributes into descriptors that can be
//! stored and re-resolved later:
//! - Eight strategies in a fixed priority chain, with exact variants
//! - Uniqueness verification against the live page, container scoping
//! - Fallback-with-nth candidates ranked by confidence
//! - JSON-safe serialization that keeps pattern semantics
//! - Target references resolved by primary descriptor, then fallback id

pub mod errors;
pub mod resolver;
pub mod scoring;
pub mod serialize;
pub mod strategies;
pub mod target;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use scoring::*;
pub use serialize::*;
pub use strategies::*;
pub use target::*;
pub use types::*;
