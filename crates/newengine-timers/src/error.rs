use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Timer system error.
///
/// Validation failures never touch scheduler state: the timer is simply not created.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("interval must be a finite, non-negative number of seconds, got {0}")]
    InvalidInterval(f32),

    #[error("repeat must be -1 (infinite) or > 0, got {0}")]
    InvalidRepeat(i32),

    #[error("config io error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type TimerResult<T> = Result<T, TimerError>;
