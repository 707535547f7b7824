/// Configuration for the outbound stargazer feed client.
///
/// Passed explicitly at construction; nothing here is read from or written
/// to the process environment, so tests can point the client anywhere.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Optional bearer token for elevated rate limits.
    pub auth_token: Option<String>,
    /// Base URL of the upstream API (override for testing).
    pub base_api_url: String,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            base_api_url: "https://api.github.com".to_string(),
            user_agent: "trendwatch".to_string(),
        }
    }
}

impl FetcherConfig {
    /// Default configuration with a bearer token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            auth_token: Some(token.into()),
            ..Self::default()
        }
    }
}
