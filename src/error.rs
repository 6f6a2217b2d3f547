use thiserror::Error;

/// A snapshot acquisition that did not produce a usable snapshot.
///
/// The scheduler swallows these; the next tick simply tries again against the
/// last successful baseline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("snapshot endpoint returned HTTP {0}")]
    Status(u16),

    #[error("snapshot endpoint answered without ok=true")]
    NotOk,

    #[error("malformed snapshot payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("hour {value} for {field} is out of range 0..=23")]
    Hour { field: &'static str, value: u32 },

    #[error("utc offset of {0} minutes is out of range")]
    UtcOffset(i32),

    #[error("minBaselineBuckets ({min}) exceeds baselineWindow ({window}), no bucket could ever be scored")]
    BaselineTooShort { min: usize, window: usize },
}

/// Failures of the admin and dashboard endpoints. Unlike [`FetchError`] these
/// are meant to reach the operator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("an api key is required to modify the allowlist")]
    MissingApiKey,

    #[error("request rejected with HTTP {status}: check the api key")]
    Unauthorized { status: u16 },

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("server answered without ok=true")]
    NotOk,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum PulseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PulseError> = std::result::Result<T, E>;
