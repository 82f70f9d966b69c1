//! Error types for the differential codec

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, PlcCodecError>;

/// Codec error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct PlcCodecError {
    kind: PlcCodecErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories surfaced at the `compress`/`decompress` boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlcCodecErrorKind {
    /// Malformed binary input or an unrecognized tag payload
    EncodingFault,
    /// A diff references an index the walk does not reach, or is otherwise
    /// structurally inconsistent with the tree it is applied to
    InvalidDiff,
    /// Decompressed chain cannot be produced
    ChainIntegrityFault,
}

impl PlcCodecError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: PlcCodecErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> PlcCodecErrorKind {
        self.kind
    }

    /// Create an encoding fault
    pub fn encoding_fault(msg: impl Into<String>) -> Self {
        Self::new(PlcCodecErrorKind::EncodingFault, Some(msg.into().into()))
    }

    /// Create an invalid-diff error referencing an offending index
    pub fn invalid_diff_index(index: u32) -> Self {
        PlcCodecError::from(DiffError::IndexNotReached { index })
            .with_help("diff indices must be produced by the same tree's Indexer walk")
    }

    /// Create a generic invalid-diff error
    pub fn invalid_diff(msg: impl Into<String>) -> Self {
        Self::new(PlcCodecErrorKind::InvalidDiff, Some(msg.into().into()))
    }

    /// Create a chain-integrity fault
    pub fn chain_integrity(msg: impl Into<String>) -> Self {
        Self::new(
            PlcCodecErrorKind::ChainIntegrityFault,
            Some(msg.into().into()),
        )
    }
}

impl fmt::Display for PlcCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }

        Ok(())
    }
}

/// Semantic tag layer errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SemTagError {
    /// A tagged payload failed to decode as its declared shape
    #[error("malformed payload for tag {tag}")]
    MalformedPayload {
        /// The tag number
        tag: u8,
        /// Underlying decode error
        #[source]
        source: BoxError,
    },
}

impl From<SemTagError> for PlcCodecError {
    fn from(e: SemTagError) -> Self {
        PlcCodecError::new(PlcCodecErrorKind::EncodingFault, Some(Box::new(e)))
    }
}

/// Structural diff/patch errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DiffError {
    /// The walk did not reach an index the diff references
    #[error("index {index} not reached while walking the tree")]
    IndexNotReached {
        /// The offending index
        index: u32,
    },

    /// A container kind is inconsistent with the diff field applied to it
    #[error("container at index {index} is not a {expected}")]
    ContainerMismatch {
        /// The offending index
        index: u32,
        /// What kind of container the diff field expected
        expected: &'static str,
    },

    /// An insert value is structurally ill-formed (e.g. map insert missing a key)
    #[error("malformed insert value at index {index}")]
    MalformedInsert {
        /// The offending index
        index: u32,
    },
}

impl From<DiffError> for PlcCodecError {
    fn from(e: DiffError) -> Self {
        PlcCodecError::new(PlcCodecErrorKind::InvalidDiff, Some(Box::new(e)))
    }
}
