//! Cursor-following retrieval of list resources.
//!
//! Confluence v2 list endpoints answer with `{ "results": [...], "_links": { "next": ... } }`.
//! The `next` link is a server-absolute path that already carries the API prefix
//! (`/wiki/api/v2/...`) and the cursor, so the prefix is stripped before the link is
//! reissued against the client's own API base.

use std::collections::HashSet;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

pub const API_PATH_PREFIX: &str = "/wiki/api/v2";

/// Issues a single GET against an endpoint relative to the API base and returns the JSON body.
pub trait JsonSource {
    fn get_json(&mut self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError>;

    /// Path prefix that the server puts in front of pagination links.
    fn api_prefix(&self) -> &str {
        API_PATH_PREFIX
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default, rename = "_links")]
    links: ListLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ListLinks {
    next: Option<String>,
}

/// Fetch every item of a paginated listing, in server order.
///
/// `params` are sent with the first request only; later requests follow the
/// server's `next` links verbatim. Any failure aborts the whole listing.
pub fn fetch_all<S, T>(
    source: &mut S,
    endpoint: &str,
    params: &[(&str, String)],
) -> Result<Vec<T>, ApiError>
where
    S: JsonSource + ?Sized,
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut current = endpoint.to_string();
    let mut first_request = true;

    loop {
        let request_params: &[(&str, String)] = if first_request { params } else { &[] };
        first_request = false;

        let payload = source.get_json(&current, request_params)?;
        let envelope: ListEnvelope<T> =
            serde_json::from_value(payload).map_err(|error| ApiError::Decode {
                url: current.clone(),
                message: error.to_string(),
            })?;
        let page_len = envelope.results.len();
        items.extend(envelope.results);
        debug!(endpoint = %current, page_len, total = items.len(), "fetched list page");

        let Some(next_link) = envelope.links.next.filter(|link| !link.trim().is_empty()) else {
            break;
        };
        let next = strip_api_prefix(&next_link, source.api_prefix()).to_string();

        visited.insert(current);
        if visited.contains(&next) {
            return Err(ApiError::Decode {
                url: next_link,
                message: "pagination link points at an already visited page".to_string(),
            });
        }
        current = next;
    }

    Ok(items)
}

/// Remove the API prefix from a server-provided pagination link.
///
/// Links without the prefix are returned unchanged.
pub fn strip_api_prefix<'a>(link: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return link;
    }
    match link.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest,
        _ => link,
    }
}
