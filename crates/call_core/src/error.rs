use shared::domain::ContactId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiCallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("lookup rejected: {0}")]
    Rejected(String),
    #[error("{0} is not configured")]
    Unavailable(&'static str),
}

impl ApiCallError {
    /// 5xx responses are the only transient class worth retrying.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiCallError::Status { status, .. } if (500..600).contains(status))
    }

    /// Text suitable for a user-facing notice.
    pub fn detail(&self) -> String {
        match self {
            ApiCallError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("live update channel is not open")]
    NotOpen,
    #[error("live update channel url must use ws:// or wss://: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("sequence is already confirmed")]
    AlreadyConfirmed,
    #[error("failed to dispatch call to {contact_id}: {source}")]
    Dispatch {
        contact_id: ContactId,
        source: ApiCallError,
    },
    #[error("live update channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("live update channel closed while awaiting call outcome")]
    ChannelClosed,
    #[error("sequence was not confirmed")]
    NotConfirmed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no contact list in session; redirecting to start")]
    MissingContacts,
    #[error("no call form in session; redirecting to start")]
    MissingForm,
    #[error("invalid session payload {name}: {source}")]
    Invalid {
        name: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to read session file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl SessionError {
    /// Missing hand-off state sends the user back rather than showing an error.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            SessionError::MissingContacts | SessionError::MissingForm
        )
    }
}
