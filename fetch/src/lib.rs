//! # mdxdb HTTP backend
//!
//! Delegates every collection operation to a remote mdxdb service as JSON
//! over HTTP. Error statuses map back onto [`mdxdb_core::MdxdbError`]:
//! `404` is `NotFound`, `409` is `DuplicateDocument`, `501` is
//! `NotImplemented` and everything else is `Remote`.

pub mod client;
pub mod collection;
pub mod config;
pub mod database;

pub use client::FetchClient;
pub use collection::FetchCollection;
pub use config::FetchConfig;
pub use database::FetchDatabase;
