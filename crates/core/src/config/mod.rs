//! Configuration loading and schema definitions
//!
//! Shared by the library crates and the `shrinkray` binary.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
