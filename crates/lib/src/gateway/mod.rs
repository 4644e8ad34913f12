//! Gateway: HTTP boundary of the dispatch pipeline.
//!
//! `POST /commands` submits one message; `GET /` is a health probe. Errors are returned as
//! plain text with 400 (bad input) or 500 (interpretation, decoding, broker).

mod protocol;
mod server;

pub use protocol::{SubmitRequest, REQUEST_ID_HEADER};
pub use server::{router, run_gateway, serve, GatewayState};
