use std::fmt;
use std::io;

/// Failures of the injection layer, distinguishable after they travel
/// through `std::io` as the payload of an `io::Error`.
#[derive(Debug)]
pub enum InjectError {
    /// Decoy write failed. No real bytes were sent in this call.
    DecoyWrite(io::Error),
    /// Reading or lowering the hop limit failed. Nothing was sent.
    TtlSet(io::Error),
    /// Decoy went out but the original hop limit could not be put back.
    TtlRestore(io::Error),
    /// The signature option could not be installed; the connection was closed.
    SignatureInstall(io::Error),
    /// The connection does not expose a capability the settings require.
    MissingCapability(&'static str),
}

impl InjectError {
    /// Recovers the injection error carried by an `io::Error`, if any.
    pub fn from_io(err: &io::Error) -> Option<&InjectError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<InjectError>())
    }

    fn kind(&self) -> io::ErrorKind {
        match self {
            InjectError::DecoyWrite(e)
            | InjectError::TtlSet(e)
            | InjectError::TtlRestore(e)
            | InjectError::SignatureInstall(e) => e.kind(),
            InjectError::MissingCapability(_) => io::ErrorKind::Unsupported,
        }
    }
}

impl fmt::Display for InjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectError::DecoyWrite(e) => write!(f, "failed to write decoy: {}", e),
            InjectError::TtlSet(e) => write!(f, "failed to set TTL before writing decoy: {}", e),
            InjectError::TtlRestore(e) => write!(f, "failed to restore TTL after writing decoy: {}", e),
            InjectError::SignatureInstall(e) => write!(f, "failed to set MD5 signature: {}", e),
            InjectError::MissingCapability(what) => write!(f, "connection does not support {}", what),
        }
    }
}

impl std::error::Error for InjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InjectError::DecoyWrite(e)
            | InjectError::TtlSet(e)
            | InjectError::TtlRestore(e)
            | InjectError::SignatureInstall(e) => Some(e),
            InjectError::MissingCapability(_) => None,
        }
    }
}

impl From<InjectError> for io::Error {
    fn from(err: InjectError) -> Self {
        io::Error::new(err.kind(), err)
    }
}
