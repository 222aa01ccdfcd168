use thiserror::Error;

/// Failures talking to the leads table.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed table response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures fetching a profile. A missing profile is not an error.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {handle}: {body}")]
    Status {
        handle: String,
        status: u16,
        body: String,
    },
    #[error("malformed profile payload for {handle}: {source}")]
    Payload {
        handle: String,
        #[source]
        source: serde_json::Error,
    },
}
