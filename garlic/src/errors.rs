use std::io;
use std::path::Path;

use thiserror::Error;

use crate::cert::CertificateError;
use crate::device::LookupError;
use crate::utils::path_lossy;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required env var: {0}")]
    MissingEnv(String),

    #[error("{0}")]
    IO(io::Error),

    #[error("invalid config {0}: {1}")]
    InvalidConfig(String, String),

    #[error("invalid hex string at offset {0}")]
    InvalidHex(usize),

    #[error("bad certificate: {0}")]
    Certificate(#[from] CertificateError),

    #[error("trusted installer {0} is listed more than once with the same certificate")]
    DuplicateInstaller(String),

    #[error("package lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("device query unavailable: {0}")]
    QueryUnavailable(String),

    #[error("failed to get basedirs")]
    NoBaseDirs,

    #[error("file {0} doesn't exist")]
    MissingFile(String),

    #[error("generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn new_cfg<S: ToString + ?Sized>(path: &Path, s: &S) -> Self {
        Self::InvalidConfig(path_lossy(path).into_owned(), s.to_string())
    }

    pub fn new_query<S: ToString + ?Sized>(s: &S) -> Self {
        Self::QueryUnavailable(s.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::IO(err)
    }
}
