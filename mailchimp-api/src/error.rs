use crate::models::MailchimpError;
use reqwest::StatusCode;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mailchimp error: {0}")]
    Mailchimp(#[from] ApiError),
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("No list id given and the client has no default list")]
    MissingListId,
    #[error("Could not read template file {}: {source}", path.display())]
    TemplateFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A non-2xx response returned by the Mailchimp API.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}: {body}")]
pub struct ApiError {
    pub status: StatusCode,
    pub body: String,
}

impl ApiError {
    /// Parses the body as a Mailchimp problem document, if it is one.
    pub fn problem(&self) -> Option<MailchimpError> {
        serde_json::from_str(&self.body).ok()
    }

    /// Client errors that only concern the addressed member (e.g. a 404 for
    /// an unknown email). Credential and throttling failures are excluded
    /// because they would fail every following call as well.
    pub fn is_member_level(&self) -> bool {
        self.status.is_client_error()
            && !matches!(
                self.status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            )
    }
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Mailchimp(e) => Some(e.status),
            Error::Request(e) => e.status(),
            _ => None,
        }
    }
}
