//! Build and manipulate phylogenetic trees.
//!
//! This module defines the two essential structs to represent phylogenetic trees:
//!  - The [`Node`] struct that represents a node of a phylogenetic tree.
//!  - The [`Tree`] struct that holds a collection of [`Node`] objects.
//!
//! Nodes carry a node label and a taxon label, the alife id and origin time
//! of the organism they stand for, and free-form annotations. Trees can be
//! read from and written to Newick ([`Tree::from_newick`]), Nexus
//! ([`nexus`]) and NeXML ([`nexml`]) strings, and converted to and from alife
//! tables ([`Tree::from_alife`], [`Tree::to_alife`]).

mod convert;
pub mod nexml;
pub mod nexus;
mod node;
mod tree_impl;

pub use self::convert::TreeMaterializer;
pub use self::node::{quote_label, unquote_label, Node, NodeError};
pub use self::tree_impl::{NewickParseError, Tree, TreeError};

/// A type that represents Identifiers of [`Node`] objects
/// within phylogenetic [`Tree`] object.
pub type NodeId = usize;

/// A type that represents branch lengths between [`Node`] objects
/// within phylogenetic [`Tree`] object.
pub type EdgeLength = f64;

/// Newick output format
#[derive(Debug, Copy, Clone)]
pub enum NewickFormat {
    /// Output all supported and available fields
    AllFields,
    /// Only output topology
    Topology,
    /// Output all fields except for comments
    NoComments,
    /// Output node names
    OnlyNames,
    /// Output branch lengths
    OnlyLengths,
}
