/// A `reqwest::Error` with the URL stripped, as forked node URLs routinely
/// embed API keys.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReqwestError(reqwest::Error);

impl From<reqwest::Error> for ReqwestError {
    fn from(error: reqwest::Error) -> Self {
        Self(error.without_url())
    }
}

/// A `reqwest_middleware::Error` with the URL stripped from the transport
/// variant.
#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    /// An error from the middleware stack.
    #[error(transparent)]
    Middleware(anyhow::Error),
    /// An error from the underlying transport.
    #[error(transparent)]
    Reqwest(#[from] ReqwestError),
}

impl From<reqwest_middleware::Error> for MiddlewareError {
    fn from(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Middleware(error) => Self::Middleware(error),
            reqwest_middleware::Error::Reqwest(error) => Self::Reqwest(error.into()),
        }
    }
}
