//! Content hashing for lochist.
//!
//! Every stored object is addressed by a domain-separated BLAKE3 hash so that
//! a blob and a tree with identical bytes never share an id.

pub mod hasher;

pub use hasher::ContentHasher;
