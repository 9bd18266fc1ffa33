//! Transfer layer
//!
//! Everything that touches the network or moves finished files into place.
//! The coordinator only sees the [`Transport`] trait; [`HttpTransport`] is the
//! production implementation on top of reqwest, rate limited with governor.
//!
//! # Module Organization
//!
//! - [`config`] - HTTP client settings and directories
//! - [`transport`] - The [`Transport`] trait and its progress/result types
//! - [`http`] - reqwest-backed transport
//! - [`download`] - Persisting staged transfers to their destination

pub mod config;
pub mod download;
pub mod http;
pub mod transport;

pub use config::ClientConfig;
pub use download::{copy_into_place, generated_destination, persist_download};
pub use http::HttpTransport;
pub use transport::{TransferProgress, TransferResponse, TransferResult, Transport};
