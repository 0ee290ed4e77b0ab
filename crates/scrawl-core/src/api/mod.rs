//! Remote notes API.

mod auth;
mod client;
mod envelope;
mod transport;

pub use auth::{AuthApi, RefreshGrant};
pub use client::ApiClient;
pub use envelope::{Envelope, ErrorBody};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
