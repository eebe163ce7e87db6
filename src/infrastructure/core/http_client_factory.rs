use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

/// Market-data calls never wait longer than this per attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client with retry middleware and the default timeout
    pub fn create_client() -> ClientWithMiddleware {
        Self::create_client_with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates an HTTP client with retry middleware.
    ///
    /// Transient failures (connect errors, 5xx, 429) are retried up to twice
    /// with exponential backoff. `timeout` bounds each attempt.
    pub fn create_client_with_timeout(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Builds a URL with percent-encoded query parameters.
/// reqwest-middleware does not expose `.query()`, so the query string is
/// assembled here.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query_string: String = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k.as_ref()), encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base_url, separator, query_string)
}

fn encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_appended_and_encoded() {
        let url = build_url_with_query(
            "https://example.test/query",
            &[("function", "GLOBAL_QUOTE"), ("symbol", "BRK.B"), ("note", "a b&c")],
        );
        assert_eq!(
            url,
            "https://example.test/query?function=GLOBAL_QUOTE&symbol=BRK.B&note=a%20b%26c"
        );
    }

    #[test]
    fn test_existing_query_is_extended() {
        let url = build_url_with_query("https://example.test/q?x=1", &[("y", "2")]);
        assert_eq!(url, "https://example.test/q?x=1&y=2");
        let empty: [(&str, &str); 0] = [];
        assert_eq!(build_url_with_query("https://example.test", &empty), "https://example.test");
    }
}
