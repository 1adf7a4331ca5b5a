//! Shared HTTP plumbing for collaborator clients.

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use std::time::Duration;

use crate::error::CollaboratorError;

/// Blocking client with a per-request timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// POST `body` as JSON and return the response if the status is 2xx.
pub(crate) fn post_json<B: Serialize + ?Sized>(client: &Client, url: &str, body: &B) -> Result<Response, CollaboratorError> {
    log::trace!("POST {}", url);

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .map_err(|e| CollaboratorError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_status(url, response)
}

pub(crate) fn check_status(url: &str, response: Response) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(CollaboratorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}
