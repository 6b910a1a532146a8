//! Tezos Delegation Service
//!
//! Continuously ingests delegation operations from the TzKT API into a
//! local SQLite database and serves paginated reads over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod repository;
pub mod translate;
pub mod transport;
