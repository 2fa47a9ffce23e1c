//! # Server Module
//!
//! Transport boundary of the request core. The listener itself lives outside
//! this crate; adapters translate their native request into a [`Request`] and
//! hand the dispatcher something implementing [`ResponseSink`].

pub mod request;
pub mod response;

pub use request::{parse_cookies, parse_query_params, Request};
pub use response::{BufferedResponse, ResponseSink, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON};
