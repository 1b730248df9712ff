//! Foundation types for lochist, the per-project local history engine.
//!
//! Every other lochist crate depends on `lochist-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash) for blobs,
//!   trees, and snapshot commits
//! - [`Timestamp`] -- Wall-clock milliseconds used to order snapshots
//! - [`OwnerId`] -- Opaque identity of a component that registers a saver

pub mod error;
pub mod object;
pub mod owner;
pub mod temporal;

pub use error::TypeError;
pub use object::ObjectId;
pub use owner::OwnerId;
pub use temporal::Timestamp;
