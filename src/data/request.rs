//! Request identities for the OpenF1 API

/// Base URL for the OpenF1 API
pub const OPENF1_BASE_URL: &str = "https://api.openf1.org/v1";

/// An endpoint plus its query parameters, in the order they were added
///
/// The rendered URL is the request identity used for caching, so two requests
/// built with the same endpoint and parameter order share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    endpoint: String,
    params: Vec<(String, String)>,
}

impl ApiRequest {
    /// Creates a request for an endpoint such as `laps` or `sessions`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    /// Appends a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Returns the endpoint name
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the query parameters
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Renders the full URL against a base such as [`OPENF1_BASE_URL`]
    ///
    /// Values are percent-encoded. Keys are kept as given so comparison
    /// filters like `speed>` + `315` render as `speed>=315`.
    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.endpoint.trim_matches('/')
        );

        if !self.params.is_empty() {
            let query: Vec<String> = self
                .params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }

        url
    }
}
