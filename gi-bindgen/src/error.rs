use thiserror::Error;

/// Broad classification of an [`Error`], used by callers that only care
/// about which stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not well-formed XML.
    Parse,
    /// The document is well-formed but does not have the expected shape.
    Structural,
    /// An experimental interface was found and unstable interfaces are not allowed.
    Policy,
    /// A wire type signature has no known GType mapping.
    UnsupportedType,
    /// The generator was configured with invalid parameters.
    Usage,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("<{0}> must have a name")]
    MissingName(&'static str),

    #[error("node {node:?}: expected exactly one <interface>, found {found}")]
    InterfaceCount { node: String, found: usize },

    #[error("{member}: arg direction must be \"in\" or \"out\", got {direction:?}")]
    Direction { member: String, direction: String },

    #[error("{member}: arg {arg:?} has no type")]
    MissingType { member: String, arg: String },

    #[error("{interface} is {reason}")]
    Unstable { interface: String, reason: String },

    #[error("don't know the GType for {0:?}")]
    UnsupportedType(String),

    #[error("prefix {0:?} must end with '_'")]
    Prefix(String),

    #[error("signal marshaller prefix {0:?} must not end with '_'")]
    MarshalPrefix(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Xml(_) | Error::UnexpectedEof(_) => ErrorKind::Parse,
            Error::MissingName(_)
            | Error::InterfaceCount { .. }
            | Error::Direction { .. }
            | Error::MissingType { .. } => ErrorKind::Structural,
            Error::Unstable { .. } => ErrorKind::Policy,
            Error::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Error::Prefix(_) | Error::MarshalPrefix(_) => ErrorKind::Usage,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
