/// Payload could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Json(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Json(msg) => write!(f, "malformed detail payload: {msg}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// A detail or tile fetch did not produce a usable response.
///
/// Never fatal: callers degrade to "no data" and retry on the next interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Transport(String),
    Status(u16),
    Decode(ProtocolError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            FetchError::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for FetchError {
    fn from(err: ProtocolError) -> Self {
        FetchError::Decode(err)
    }
}
