use gristmill_generate::{GenerateError, ScheduleError};
use gristmill_optimize::{OptimizeError, VerifyError};
use thiserror::Error;

/// Any failure of the compile pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("optimized sequence does not match its input: {0}")]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

pub type Result<T> = std::result::Result<T, Error>;
