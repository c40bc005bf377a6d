//! Errors raised while converting between tabular and tree representations.

use thiserror::Error;

use crate::alife::validate::ValidationError;
use crate::alife::Id;
use crate::tree::{NewickParseError, TreeError};

/// Errors that can occur when parsing, building, reconciling or flattening
/// phylogenies.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// A cell or document is syntactically malformed
    #[error("Malformed input: {0}")]
    Format(String),
    /// A node has several parents in a code path that only supports one
    #[error("Node {id} has {n_parents} ancestors: sexual lineages not supported.")]
    UnsupportedTopology {
        /// Id of the offending row
        id: Id,
        /// Number of ancestors listed for that row
        n_parents: usize,
    },
    /// The data is structurally or temporally inconsistent
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    /// A requested attribute name collides with a reserved name
    #[error("Attribute name '{0}' is reserved.")]
    NameCollision(String),
    /// The requested or supplied representation is not available
    #[error("Unsupported representation: {0}")]
    UnsupportedFormat(String),
    /// There is nothing to write to the requested destination
    #[error("Cannot serialize an empty phylogeny to a destination.")]
    EmptyTree,
    /// The table does not comply with the alife data standard
    #[error("Invalid alife table")]
    Validation(#[from] ValidationError),
    /// There was a [`TreeError`] while manipulating a tree
    #[error("Tree error")]
    Tree(#[from] TreeError),
    /// There was a [`NewickParseError`] while reading a tree
    #[error("Could not parse tree")]
    Newick(#[from] NewickParseError),
    /// There was a [`std::io::Error`] while reading or writing
    #[error("Problem reading or writing data")]
    Io(#[from] std::io::Error),
    /// There was a [`csv::Error`] while reading or writing a CSV table
    #[error("Problem with CSV data")]
    Csv(#[from] csv::Error),
    /// There was a [`serde_json::Error`] while reading or writing a JSON table
    #[error("Problem with JSON data")]
    Json(#[from] serde_json::Error),
}
