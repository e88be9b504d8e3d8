//! Block Storage Module
//!
//! Holds the bytes of the shared address space that live in this process.
//!
//! ## Core Concepts
//! - **Local store**: authoritative buffers for owned blocks (`LocalBlockStore`),
//!   one lock per block.
//! - **Cache**: speculative copies of remote blocks with a validity flag (`BlockCache`).
//!   A cached copy is trusted only while its entry is `Valid`; an invalidation from the
//!   owner flips it before any later read can count a hit.

pub mod cache;
pub mod local;
