use std::io;

/// Central error type for the nocturne engine.
#[derive(Debug)]
pub enum ServerError {
    /// Underlying I/O error from the OS or network.
    Io(io::Error),
    /// A connection buffer hit its 1 MiB ceiling.
    BufferOverflow,
    /// The port argument could not be resolved to a TCP port.
    PortResolution(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Io(e) => write!(f, "I/O error: {}", e),
            ServerError::BufferOverflow => write!(f, "Connection buffer exceeded its maximum size"),
            ServerError::PortResolution(s) => write!(f, "Cannot resolve port: {}", s),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
