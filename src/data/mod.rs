//! OpenF1 API access
//!
//! Builds request identities, fetches them through the response cache and
//! classifies network failures. Payloads are returned as untyped JSON; callers
//! own their interpretation.

pub mod client;
pub mod request;
pub mod retry;

pub use client::{ClientSettings, FetchError, OpenF1Client};
pub use request::{ApiRequest, OPENF1_BASE_URL};
pub use retry::{is_retryable_status, RetryPolicy};
