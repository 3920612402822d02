use reqwest::StatusCode;

/// Errors returned by [`crate::OktaClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid Okta org URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to Okta failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with {status}")]
    Status { status: StatusCode, url: String },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

