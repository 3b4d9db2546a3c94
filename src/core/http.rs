use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = "TribesLauncher/0.1.0";

/// Shared HTTP client for every remote object fetch.
///
/// Archives are stored pre-compressed, so transfer encoding is pinned to
/// `identity` to keep `Content-Length` meaningful for progress reporting.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}
