//! Response decoders for [`ReadThroughFetcher::fetch`](crate::fetch::ReadThroughFetcher::fetch).
//!
//! Decoders borrow the response so the same bytes can be stored afterwards.

use bytes::Bytes;
use gamedata_core::{Error, RawResponse};
use serde::de::DeserializeOwned;

/// Decode the body as JSON.
pub fn json<D: DeserializeOwned>(response: &RawResponse) -> Result<D, Error> {
    serde_json::from_slice(&response.body).map_err(|e| Error::Decode(format!("invalid JSON: {e}")))
}

/// Decode the body as UTF-8 text.
pub fn text(response: &RawResponse) -> Result<String, Error> {
    String::from_utf8(response.body.to_vec()).map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))
}

/// The body as-is.
pub fn bytes(response: &RawResponse) -> Result<Bytes, Error> {
    Ok(response.body.clone())
}
