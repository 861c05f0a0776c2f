//! Error types used across the controller.
//!
//! Every fallible operation in the crate returns the unified [`RigError`]
//! enum so handlers and the dispatch loop can log failures uniformly. The
//! dispatch loop absorbs handler errors (the serial protocol has no way to
//! report detail back to the microcontroller); only serial-link and startup
//! failures propagate far enough to terminate the process.

pub type Result<T> = std::result::Result<T, RigError>;

/// Struct to represent IO errors.
#[derive(Debug)]
pub struct IoErrorStruct {
    /// The type of IO error.
    error_type: String,

    /// The error message.
    msg: String,
}

/// Struct to represent command/address parse errors.
#[derive(Debug)]
pub struct ParseErrorStruct {
    /// The error message.
    msg: String,
}

/// Struct to represent workstation connection errors.
#[derive(Debug)]
pub struct ConnectionErrorStruct {
    /// The peer the connection was attempted against.
    peer: String,

    /// The error message.
    msg: String,
}

/// Struct to represent external tool (camera utility) errors.
#[derive(Debug)]
pub struct SubprocessErrorStruct {
    /// The tool that was invoked.
    tool: String,

    /// What the tool wrote on its error stream, or the spawn error.
    msg: String,
}

/// Enum to represent the different failure kinds of the controller.
#[derive(Debug)]
pub enum RigError {
    IoError(IoErrorStruct),
    ParseError(ParseErrorStruct),
    ConnectionError(ConnectionErrorStruct),
    SubprocessError(SubprocessErrorStruct),
}

impl RigError {
    /// Create a new parse error.
    ///
    /// # Arguments
    /// * `msg` - The error message.
    ///
    /// # Returns
    /// A `RigError` instance representing a parse error.
    pub fn parse_error(msg: &str) -> Self {
        RigError::ParseError(ParseErrorStruct {
            msg: msg.to_string(),
        })
    }

    /// Create a new connection error against the given peer.
    pub fn connection_error(peer: &str, msg: String) -> Self {
        RigError::ConnectionError(ConnectionErrorStruct {
            peer: peer.to_string(),
            msg,
        })
    }

    /// Create a new subprocess error for the given external tool.
    pub fn subprocess_error(tool: &str, msg: String) -> Self {
        RigError::SubprocessError(SubprocessErrorStruct {
            tool: tool.to_string(),
            msg,
        })
    }
}

impl std::fmt::Display for RigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RigError::IoError(io_err) => {
                write!(f, "IO {} Error: {}", io_err.error_type, io_err.msg)
            }
            RigError::ParseError(parse_err) => {
                write!(f, "Parse Error: {}", parse_err.msg)
            }
            RigError::ConnectionError(conn_err) => {
                write!(
                    f,
                    "Connection Error against <{}>: {}",
                    conn_err.peer, conn_err.msg
                )
            }
            RigError::SubprocessError(sub_err) => {
                write!(f, "Subprocess Error from '{}': {}", sub_err.tool, sub_err.msg)
            }
        }
    }
}

impl std::error::Error for RigError {}

impl From<std::io::Error> for RigError {
    fn from(error: std::io::Error) -> Self {
        RigError::IoError(IoErrorStruct {
            error_type: error.kind().to_string(),
            msg: error.to_string(),
        })
    }
}

impl From<serialport::Error> for RigError {
    fn from(error: serialport::Error) -> Self {
        RigError::IoError(IoErrorStruct {
            error_type: "serial".to_string(),
            msg: error.to_string(),
        })
    }
}

impl From<zip::result::ZipError> for RigError {
    fn from(error: zip::result::ZipError) -> Self {
        RigError::IoError(IoErrorStruct {
            error_type: "zip".to_string(),
            msg: error.to_string(),
        })
    }
}
