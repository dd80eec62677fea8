//! Source fetching under a bounded concurrency gate.
//!
//! Callers take a [`FetchSlot`] from the [`FetchGate`] before issuing the
//! outbound request and keep it until the transform is done.

pub mod client;
pub mod gate;

pub use client::{FetchedSource, HttpFetcherConfig, HttpSourceFetcher, SourceFetcher, SourceRequest};
pub use gate::{FetchGate, FetchSlot};
