//! Wire-level helpers for the facility API.

mod request;
mod token;

pub(crate) use request::{api_error, backoff_delay};
pub use token::{TokenGrant, request_token};
