//! Core support shared by the binary codec.

pub mod compression;

pub use compression::{deflate, inflate};
