//! Client for the OASA telematics API.
//!
//! The API exposes every dataset through one endpoint, `/api/?act=<action>`.
//! Line data comes back as a JSON array; routes, stops and route-stop
//! associations come back as delimited text, gzip compressed for the larger
//! actions. Failures are reported either through the HTTP status or as a JSON
//! object carrying an `error` property.

pub mod client;
pub mod error;

pub use client::{OasaClient, TelemetrySource};
pub use error::ClientError;
