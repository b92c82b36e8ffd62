//! Error types for TMX decoding and encoding

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Why a required attribute could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeProblem {
    /// The attribute is not present on the element
    #[error("missing")]
    Missing,
    /// The attribute is present but cannot be converted
    #[error("invalid value '{0}'")]
    Invalid(String),
}

/// Errors raised while converting between markup and the map model
#[derive(Debug, Error)]
pub enum Error {
    /// Structurally wrong node (wrong tag, malformed child composition)
    #[error("Malformed <{tag}>: {message}")]
    Format { tag: String, message: String },

    /// Missing or unsupported format version
    #[error("Unsupported TMX version {0:?} (expected \"1.0\")")]
    Version(Option<String>),

    /// A required attribute is missing or fails conversion
    #[error("Attribute '{name}' on <{tag}>: {problem}")]
    Attribute {
        tag: String,
        name: String,
        problem: AttributeProblem,
    },

    /// Attributes left over after the element's schema was consumed
    #[error("Unexpected attributes on <{tag}>: {}", .names.join(", "))]
    UnexpectedAttribute { tag: String, names: Vec<String> },

    /// A child element not recognized at this nesting level
    #[error("Unknown element <{tag}> inside <{parent}>")]
    UnknownElement { parent: String, tag: String },

    /// A layer whose size disagrees with its map
    #[error("Layer '{layer}' is {found:?} but the map is {expected:?}")]
    LayerSizeMismatch {
        layer: String,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// Tile data length does not match the cell count
    #[error("Tile data has {actual} bytes, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    /// Transport encoding outside the supported set
    #[error("Unsupported data encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Compression outside the supported set
    #[error("Unsupported data compression '{0}'")]
    UnsupportedCompression(String),

    /// An external resource reference cannot be resolved
    #[error("Cannot resolve '{}': {message}", .path.display())]
    Path { path: PathBuf, message: String },

    /// A tileset's declared first GID disagrees with its position in the map
    #[error("Tileset '{tileset}' declares firstgid {declared}, but its position gives {computed}")]
    FirstGidMismatch {
        tileset: String,
        declared: u32,
        computed: u32,
    },

    /// Invalid base64 payload
    #[error("Invalid base64 tile data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// zlib/gzip stream failure
    #[error("Compressed tile data is corrupt: {0}")]
    Compression(#[source] std::io::Error),

    /// Markup text could not be parsed or written
    #[error("XML error: {0}")]
    Xml(String),
}

impl Error {
    /// Shorthand for [`Error::Format`]
    pub fn format(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Format {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::UnknownElement`]
    pub fn unknown_element(parent: impl Into<String>, tag: impl Into<String>) -> Self {
        Error::UnknownElement {
            parent: parent.into(),
            tag: tag.into(),
        }
    }
}
