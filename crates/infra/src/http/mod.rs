//! HTTP request execution
//!
//! - **[`request`]**: request description, body sources, progress observer
//! - **[`response`]**: JSON / raw response classification
//! - **[`executor`]**: retrying, cancellable sender

pub mod executor;
pub mod request;
pub mod response;

pub use executor::{RequestExecutor, RequestExecutorBuilder};
pub use request::{
    ApiRequest, BodySource, BytesBody, OneShotBody, ProgressListener, ReaderBody,
};
pub use response::{ApiResponse, JsonResponse, RawResponse};
