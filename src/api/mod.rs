//! Public API Module
//!
//! The façade a harness talks to.
//!
//! ## Submodules
//! - **`node`**: `DsmNode`, an explicit context object with an `initialize` / `shutdown`
//!   lifecycle, argument validation, `read` / `write` and read-only diagnostics.
//! - **`handlers`** / **`types`**: optional HTTP debug surface (stats, cache state, read, write).

pub mod handlers;
pub mod node;
pub mod types;
