use reqwest::{Client, Response};
use std::time::Duration;
use testbed_core::{Error, Result};

pub(crate) fn client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(timeout)
        .build()
        .map_err(http_error)
}

pub(crate) fn http_error(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}

/// Fails on any non-2xx status.
pub(crate) fn ensure_success(response: Response) -> Result<Response> {
    response.error_for_status().map_err(http_error)
}
