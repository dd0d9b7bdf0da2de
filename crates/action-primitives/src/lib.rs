//! Action primitives - element references and browser actions
//!
//! This crate provides the building blocks the rest of the workspace drives
//! a page with:
//! - Selector descriptors with scoped child chains and `nth` disambiguation
//! - The `BrowserDriver` collaborator trait; the page is always passed in
//! - Chain evaluation (`locate`) and bounded waiting for a single match
//! - `perform`: navigate, click, form update and assertion primitives

pub mod driver;
pub mod errors;
mod locator;
mod primitives;
pub mod selector;
pub mod types;
mod waiting;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use driver::*;
pub use errors::*;
pub use locator::*;
pub use primitives::*;
pub use selector::*;
pub use types::*;
pub use waiting::*;
