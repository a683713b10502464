/// Errors raised while configuring, persisting or restoring an index.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration named a key the engine does not know.
    #[error("unknown key '{0}' in options")]
    UnknownOption(String),
    /// A known option carried a value the engine cannot work with.
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    /// The `characters` token pattern did not compile.
    #[error("invalid token pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// Configuration source was not valid JSON for the options schema.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Snapshot bytes could not be decoded.
    #[error("failed to decode index snapshot: {0}")]
    Decode(String),
    /// Index state could not be encoded.
    #[error("failed to encode index snapshot: {0}")]
    Encode(String),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
