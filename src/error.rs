use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or querying multi-group data.
///
/// `Configuration` and `DataIntegrity` are reported during initialization,
/// before any particle is tracked. `Programming` marks a broken caller
/// contract on the lookup surface; the non-`try_` lookups turn it into a
/// panic because returning zero would silently bias tallies.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user input: unknown nuclide, bad temperature request,
    /// inconsistent variance reduction settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The cross section library is missing data or holds malformed arrays.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Caller contract violation on the lookup surface.
    #[error("programming error: {0}")]
    Programming(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Error::DataIntegrity(msg.into())
    }

    pub(crate) fn programming(msg: impl Into<String>) -> Self {
        Error::Programming(msg.into())
    }

    /// True for errors that can only be raised before tracking starts.
    pub fn is_setup_error(&self) -> bool {
        !matches!(self, Error::Programming(_))
    }
}
