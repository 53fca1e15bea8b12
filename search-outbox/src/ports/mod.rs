//! Trait definitions for the outbox's collaborators.
//!
//! The codec, the index applier and the transactional store are provided by
//! the surrounding system; these traits are the seams it plugs in at.

mod applier;
mod codec;
mod store;

pub use applier::*;
pub use codec::*;
pub use store::*;
