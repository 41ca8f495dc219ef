//! Shared HTTP client construction for network collaborators.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, Result};

/// Build a client with a request timeout.
///
/// Some sandboxed macOS environments panic during proxy auto-detection in
/// reqwest's default builder; fall back to a no-proxy client in that case.
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e))),
    }
}
