use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum InkError {
    /// The normalizer was handed zero samples; nothing may be committed.
    EmptyInput,
    /// The raster target has no pixels to draw into.
    MissingCanvasTarget,
    /// A container lacks a record the import cannot proceed without.
    ContainerStructure { missing: String },
    /// A single persisted record could not be decoded.
    Deserialization { path: String, message: String },
    /// A record could not be encoded for export.
    Serialization { path: String, message: String },
    /// The host marked the document read-only.
    ReadOnly,
    PageNotFound { page_id: u32 },
}

impl fmt::Display for InkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "cannot normalize a stroke from zero samples"),
            Self::MissingCanvasTarget => write!(f, "no valid raster target to draw into"),
            Self::ContainerStructure { missing } => {
                write!(f, "container is missing required record: {missing}")
            }
            Self::Deserialization { path, message } => {
                write!(f, "malformed record {path}: {message}")
            }
            Self::Serialization { path, message } => {
                write!(f, "cannot encode record {path}: {message}")
            }
            Self::ReadOnly => write!(f, "document is read-only"),
            Self::PageNotFound { page_id } => write!(f, "page {page_id} does not exist"),
        }
    }
}

impl std::error::Error for InkError {}

pub type InkResult<T> = Result<T, InkError>;
