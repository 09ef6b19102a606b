//! Adapters to the outside world: Solr, the fields API, the event bus and
//! the HTTP surface.

pub mod bus;
pub mod error;
pub mod fields_api;
pub mod http;
pub mod solr;
pub mod telemetry;
