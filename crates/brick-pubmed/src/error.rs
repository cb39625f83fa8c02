//! Error types for converting one input file

use std::io;

use thiserror::Error;

use crate::dtd::Occurrence;

/// Result type alias for per-file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort the conversion of a single input file.
///
/// None of these ever escape the batch driver: each one becomes a
/// [`FailureRecord`](crate::failure::FailureRecord) for the file that raised it.
#[derive(Error, Debug)]
pub enum Error {
    /// An element in the document has no declaration in the DTD.
    #[error("element <{element}> is not declared in the DTD")]
    SchemaMissing { element: String },

    /// The declaration exists but matches none of the rendering rules.
    #[error(
        "illegal element shape for <{element}>: occurrence '{occurrence}' with {children} declared children"
    )]
    IllegalShape {
        element: String,
        occurrence: Occurrence,
        children: usize,
    },

    /// The XML itself is malformed.
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    /// An article has no usable primary key.
    #[error("article #{index}: {reason}")]
    Identifier { index: usize, reason: String },

    /// I/O error reading the input or writing the output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error serializing a transcoded article.
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error assembling Arrow batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Another input in the same batch maps to the same output file.
    #[error("output {output} is already produced by {claimed_by}")]
    OutputCollision { output: String, claimed_by: String },

    /// Shutdown was requested while the file was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Stable machine-readable name, recorded in failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaMissing { .. } => "schema_missing",
            Self::IllegalShape { .. } => "illegal_shape",
            Self::Parse { .. } => "parse",
            Self::Identifier { .. } => "identifier",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Arrow(_) => "arrow",
            Self::OutputCollision { .. } => "output_collision",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn parse(position: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            Error::SchemaMissing {
                element: "Foo".into(),
            },
            Error::IllegalShape {
                element: "Foo".into(),
                occurrence: Occurrence::None,
                children: 2,
            },
            Error::parse(10, "bad"),
            Error::Identifier {
                index: 0,
                reason: "missing".into(),
            },
            Error::Io(io::Error::other("disk")),
            Error::Arrow(arrow::error::ArrowError::ComputeError("bad".into())),
            Error::OutputCollision {
                output: "a.parquet".into(),
                claimed_by: "a.xml".into(),
            },
            Error::Cancelled,
        ];
        let mut kinds: Vec<_> = errors.iter().map(Error::kind).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn arrow_errors_keep_their_kind() {
        let err: Error = arrow::error::ArrowError::InvalidArgumentError("length mismatch".into()).into();
        assert_eq!(err.kind(), "arrow");
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn display_names_the_element() {
        let err = Error::SchemaMissing {
            element: "MysteryTag".into(),
        };
        assert_eq!(err.to_string(), "element <MysteryTag> is not declared in the DTD");

        let err = Error::IllegalShape {
            element: "Object".into(),
            occurrence: Occurrence::None,
            children: 1,
        };
        assert!(err.to_string().contains("'none'"));
    }
}
