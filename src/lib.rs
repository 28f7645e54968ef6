//! # Zedis
//!
//! An in-memory key/value server speaking a length-prefixed binary
//! protocol, built from scratch in Rust.
//!
//! Zedis stores byte strings and sorted sets under a single key space with
//! per-key TTLs. The interesting parts are the state engine and its data
//! structures: an arena AVL tree with order-statistic queries, an
//! incrementally resizing hash index, a position-tracked TTL heap, and a
//! single-threaded readiness-polling event loop with no async runtime,
//! plus a small worker pool that only destroys large values.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod index;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod store;
pub mod types;
