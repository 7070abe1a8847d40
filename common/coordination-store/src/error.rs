use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// True when the failure came from talking to the store rather than from
    /// the data it returned.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Etcd(_) | Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
