use thiserror::Error;

/// Errors raised by kernel evaluation, operator dispatch and conditioning.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// An input's dimension disagrees with the declared `input_dim`.
    #[error("shape mismatch in {context}: expected input dimension {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// A closed form was requested for a Matérn order it does not exist for.
    #[error("{kernel} is not supported for Matérn order p = {p} (only p = 3)")]
    UnsupportedSmoothness { kernel: &'static str, p: usize },

    /// `coords2fn` received a random variable it cannot map to a process.
    #[error("unsupported type of random variable for coordinates: {kind}")]
    UnsupportedRandomVariable { kind: &'static str },

    /// Cholesky factorization of a batch's predictive Gram matrix failed.
    #[error("Gram matrix of observation batch {batch} ({size} x {size}) is not positive definite")]
    NotPositiveDefinite { batch: usize, size: usize },

    /// Neither a specialization nor a differentiable representation exists.
    #[error("applying {operator} to {target} is not implemented")]
    NotImplemented {
        operator: String,
        target: &'static str,
    },

    /// Kernel argument index outside `{0, 1}`.
    #[error("argnum must be 0 or 1, got {0}")]
    InvalidArgnum(usize),

    /// Malformed constructor or call arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check that `found` equals the declared dimension.
pub(crate) fn check_dim(context: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            context: context.to_string(),
            expected,
            found,
        })
    }
}

pub(crate) fn check_argnum(argnum: usize) -> Result<()> {
    if argnum > 1 {
        return Err(Error::InvalidArgnum(argnum));
    }
    Ok(())
}
