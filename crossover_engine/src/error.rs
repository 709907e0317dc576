/// error.rs — Error taxonomy shared by every engine module.
///
/// Only `Configuration` is fatal, and only at startup. Everything else is
/// either "skip this cycle" (`EmptyData`) or logged at the loop boundary.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No candles, or no strategy rows to act on.
    #[error("no data: {0}")]
    EmptyData(&'static str),

    /// A market or trigger order was rejected or could not be sent.
    #[error("{kind} order failed: {reason}")]
    OrderPlacement { kind: &'static str, reason: String },

    /// Missing secret or invalid setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The venue answered with an error payload.
    #[error("venue error {status}: {message}")]
    Venue { status: u16, message: String },

    /// x18 value out of range, not an integer string, or a bad timestamp.
    #[error("malformed venue value: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the process should stop instead of retrying on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// `err` followed by each `source()` below it, joined with ": ".
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut cause = err.source();
    while let Some(e) = cause {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cause = e.source();
    }
    out
}
