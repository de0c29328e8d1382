//! A small Redis-compatible key-value server with append-only persistence.
//!
//! Clients speak RESP over TCP. The server supports:
//!
//! - String and hash operations (SET, GET, HSET, HGET) plus PING and KEYS
//! - Pipelines, sent as one array of command arrays and answered with one array
//! - Publish/subscribe (SUBSCRIBE, UNSUBSCRIBE, PUBLISH) with bounded per-subscriber
//!   queues so a slow subscriber never stalls a publisher
//! - An append-only file of every mutating command, synced to disk periodically
//!   and replayed on startup to rebuild the store

pub mod aof;
pub mod commands;
pub mod connection;
pub mod input;
pub mod key_value_store;
pub mod pub_sub;
pub mod resp;
pub mod server;
