//! Error classification for record API calls.

use super::TransportError;
use crate::Error;
use tracing::debug;

/// Whether a failure should be reported as bad credentials.
///
/// 400 and 401 both surface this way: the API answers 400 to requests made
/// with a token for the wrong tenant or resource. Connection / DNS failures
/// mean the resource URL itself is wrong, which is part of the credential set.
pub(crate) fn is_credential_failure(status: Option<u16>, connect_failed: bool) -> bool {
    matches!(status, Some(400) | Some(401)) || connect_failed
}

/// Map a raw transport failure into the caller-facing taxonomy.
pub fn classify(err: TransportError) -> Error {
    let status = err.status();
    if is_credential_failure(status, err.is_connect()) {
        debug!(
            status = ?status,
            detail = %first_line(&err.to_string()),
            "transport failure classified as invalid credentials"
        );
        return Error::InvalidCredentials;
    }
    Error::Transport(err)
}

fn first_line(message: &str) -> &str {
    message.split(['\r', '\n']).next().unwrap_or(message)
}
