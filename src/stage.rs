use crate::error::Error;

/// Outcome of one external stage on one frame.
#[derive(Debug)]
pub enum StageResult<T> {
    Ready(T),
    /// Ran fine, nothing found.
    Empty,
    Failed(Error),
}

impl<T> StageResult<T> {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, StageResult::Ready(_))
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }

    /// The value, if any. Failures are logged and count as no observation.
    pub fn observation(self, stage: &str) -> Option<T> {
        match self {
            StageResult::Ready(value) => Some(value),
            StageResult::Empty => None,
            StageResult::Failed(err) => {
                log::warn!("{} failed, treating as no observation: {}", stage, err);
                None
            }
        }
    }
}

impl<T> StageResult<Vec<T>> {
    /// Empty vectors become `Empty`.
    pub fn from_vec(result: Result<Vec<T>, Error>) -> Self {
        match result {
            Ok(items) if items.is_empty() => StageResult::Empty,
            Ok(items) => StageResult::Ready(items),
            Err(err) => StageResult::Failed(err),
        }
    }
}

impl<T> From<Result<Option<T>, Error>> for StageResult<T> {
    fn from(result: Result<Option<T>, Error>) -> Self {
        match result {
            Ok(Some(value)) => StageResult::Ready(value),
            Ok(None) => StageResult::Empty,
            Err(err) => StageResult::Failed(err),
        }
    }
}
