//! Real-time endpoint discovery
//!
//! `OPTIONS events` lists the long-poll servers available to this client.
//! The first entry is used.

use nimbus_domain::constants::EVENTS_PATH;
use nimbus_domain::{RealtimeDiscovery, RealtimeEndpoint};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::api::{ApiConnection, ApiError};
use crate::http::ApiRequest;

/// Asks the service for a long-poll endpoint.
///
/// # Errors
///
/// Returns [`ApiError::InvalidResponse`] if the response is not JSON or lists
/// no endpoints, and any error raised while sending.
#[instrument(skip_all)]
pub async fn discover_endpoint(
    connection: &ApiConnection,
    cancel: &CancellationToken,
) -> Result<RealtimeEndpoint, ApiError> {
    let mut request = ApiRequest::options(connection.url(EVENTS_PATH)?);
    let discovery: RealtimeDiscovery = connection.send(&mut request, cancel).await?.into_json()?;

    let endpoint = discovery
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::InvalidResponse("no real-time endpoints offered".into()))?;

    debug!(
        url = %endpoint.url,
        max_retries = endpoint.max_retries,
        retry_timeout_ms = endpoint.retry_timeout.as_millis() as u64,
        "discovered real-time endpoint"
    );
    Ok(endpoint)
}
