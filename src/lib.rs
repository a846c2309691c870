//! Gallery server library: capability tokens and tiered, tag-indexed image
//! storage. Transport adapters call into [`gallery::Gallery`]; the binary
//! entry point in main.rs is an operator CLI over the same operations.

pub mod auth;
pub mod config;
pub mod error;
pub mod gallery;
pub mod storage;

pub use error::GalleryError;
pub use gallery::Gallery;
