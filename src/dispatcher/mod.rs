//! # Dispatcher Module
//!
//! The request state machine. [`Dispatcher::dispatch`] takes one transport
//! request and a [`ResponseSink`](crate::server::ResponseSink) and walks
//!
//! ```text
//! Received -> PreProcessing -> Routing -> Handling -> Rendering -> Completed
//!     \            \              \           \            \
//!      +------------+--------------+-----------+------------+--> ErrorCaught -> Completed
//! ```
//!
//! ## Request Flow
//!
//! 1. Build the [`RequestContext`](crate::context::RequestContext) and start
//!    the `request` profiler span
//! 2. Parse cookies, query string and output mode (AJAX header or `?json`)
//! 3. Run the pre-request tasks; their outputs land in the request data bag
//! 4. Resolve the route; no match is a 404
//! 5. Split the target into `<group>.<action>` and resolve it in the
//!    [`HandlerRegistry`](crate::handlers::HandlerRegistry)
//! 6. Invoke the action, synchronously or through its completion callback
//! 7. Render the returned view tree (an empty body or `{}` when there is none)
//! 8. Stop the `request` span and hand the profile to the sink
//!
//! ## Error Boundary
//!
//! Steps 2 to 7 run inside a single boundary. Any error, including panics in
//! tasks, actions and async continuations, is classified (404 for not found,
//! the declared status or 500 otherwise) and written as:
//!
//! - the JSON [`ErrorPayload`](crate::error::ErrorPayload) in JSON mode
//! - the `<status>` template, else the `error` template, in HTML mode
//! - the JSON payload when neither template exists
//!
//! If writing the error response fails as well, the failure is logged and a
//! fixed [`FALLBACK_BODY`] is sent with status 500. The response is always
//! ended.

mod boundary;
mod core;

pub use boundary::FALLBACK_BODY;
pub use core::{Dispatcher, DispatcherOptions};
