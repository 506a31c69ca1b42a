#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The operation exists on the interface but not on this variant,
    /// e.g. bit-level writes on a byte encoder.
    Unsupported(String),
    /// The sink could not allocate a window or the source could not refill.
    IoFailure(String),
    /// The stream ended inside a segment or a header cannot be satisfied
    /// by the remaining bytes.
    Corrupt(String),
    /// A recorded position coordinate is outside its declared range.
    BadPosition(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Unsupported(message) => {
                write!(fmt, "{}", message)
            }
            Error::IoFailure(message) => {
                write!(fmt, "{}", message)
            }
            Error::Corrupt(message) => {
                write!(fmt, "{}", message)
            }
            Error::BadPosition(message) => {
                write!(fmt, "{}", message)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IoFailure(format!("underlying IO error: {}", e))
    }
}

/// A specialized `Result` for RLE stream errors.
pub type Result<T> = std::result::Result<T, Error>;
