use std::fmt::{Debug, Display};

use thiserror::Error;

use super::{EdgeLength, NewickFormat, NodeId};
use crate::alife::{Attributes, Id};

/// Errors that can occur when manipulating [`Node`] structs.
#[derive(Error, Debug)]
pub enum NodeError {
    /// We are trying to access the an unexisting child of the node
    #[error("Node {parent} does not have child {child}.")]
    HasNoChild {
        /// Id of the parent the parent node
        parent: NodeId,
        /// Id of the inexistant child node
        child: NodeId,
    },
}

// Characters that force a label to be quoted in newick strings
const NEWICK_SPECIAL: &[char] = &['(', ')', '[', ']', '\'', '"', ':', ';', ',', ' ', '\t', '\n'];

/// Quotes a label for newick output if it contains special characters.
/// ```
/// use alifeconv::tree::quote_label;
///
/// assert_eq!(quote_label("A"), "A");
/// assert_eq!(quote_label("Homo sapiens"), "'Homo sapiens'");
/// assert_eq!(quote_label("it's"), "'it''s'");
/// ```
pub fn quote_label(label: &str) -> String {
    if label.is_empty() || label.contains(NEWICK_SPECIAL) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

/// Removes the quotes around a label, if any.
/// ```
/// use alifeconv::tree::unquote_label;
///
/// assert_eq!(unquote_label("A"), "A");
/// assert_eq!(unquote_label("'it''s'"), "it's");
/// assert_eq!(unquote_label("\"B b\""), "B b");
/// ```
pub fn unquote_label(label: &str) -> String {
    if let Some(inner) = label.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')) {
        inner.replace("''", "'")
    } else if let Some(inner) = label.strip_prefix('"').and_then(|l| l.strip_suffix('"')) {
        inner.to_string()
    } else {
        label.to_string()
    }
}

#[derive(Clone, Default)]
/// A node of the Tree
pub struct Node {
    /// Index of the node
    pub id: NodeId,
    /// Id of the organism in an alife table
    pub alife_id: Option<Id>,
    /// Label of the node
    pub label: Option<String>,
    /// Label of the taxon associated with the node
    pub taxon_label: Option<String>,
    /// Index of the parent node
    pub parent: Option<NodeId>,
    /// Indices of child nodes
    pub children: Vec<NodeId>,
    /// length of branch between parent and node
    pub parent_edge: Option<EdgeLength>,
    /// Absolute time at which the node arose
    pub origin_time: Option<f64>,
    /// Optional comment attached to node
    pub comment: Option<String>,
    /// User defined attributes of the node
    pub annotations: Attributes,
    /// Number of edges to root
    pub(crate) depth: usize,
    // Whether the node is deleted or not
    pub(crate) deleted: bool,
}

impl Node {
    /// Creates a new Node
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new Node with a taxon label
    pub fn new_named(taxon_label: &str) -> Self {
        Self {
            taxon_label: Some(String::from(taxon_label)),
            ..Default::default()
        }
    }

    /// Creates a new Node with a node label
    pub fn new_labeled(label: &str) -> Self {
        Self {
            label: Some(String::from(label)),
            ..Default::default()
        }
    }

    /// Name of the node in newick strings: the taxon label if there is one,
    /// the node label otherwise.
    /// ```
    /// use alifeconv::tree::Node;
    ///
    /// let mut node = Node::new_labeled("internal");
    /// assert_eq!(node.name(), Some("internal"));
    ///
    /// node.taxon_label = Some("A".into());
    /// assert_eq!(node.name(), Some("A"));
    /// ```
    pub fn name(&self) -> Option<&str> {
        self.taxon_label.as_deref().or(self.label.as_deref())
    }

    /// Sets the internal Node id
    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// Set the parent node
    /// See `add_child` for example usage
    pub fn set_parent(&mut self, parent: NodeId, parent_edge: Option<EdgeLength>) {
        self.parent = Some(parent);
        self.parent_edge = parent_edge;
    }

    /// Sets the depth of the node
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Gets the depth of the node
    pub fn get_depth(&self) -> usize {
        self.depth
    }

    /// Empties the node and sets it as deleted
    pub(crate) fn delete(&mut self) {
        *self = Self::new();
        self.deleted = true;
    }

    /// Adds a child to the node
    /// ```
    /// use alifeconv::tree::Node;
    ///
    /// let mut parent = Node::new();
    /// parent.id = 0;
    /// let mut child = Node::new();
    /// child.id = 1;
    ///
    /// child.set_parent(parent.id, Some(0.1));
    /// parent.add_child(child.id);
    ///
    /// assert_eq!(child.parent_edge, Some(0.1));
    /// assert_eq!(parent.children, vec![1]);
    /// ```
    pub fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Replaces a child with another node, at the same position
    pub fn replace_child(&mut self, child: &NodeId, replacement: NodeId) -> Result<(), NodeError> {
        let vec_index = self.child_position(child)?;
        self.children[vec_index] = replacement;

        Ok(())
    }

    fn child_position(&self, child: &NodeId) -> Result<usize, NodeError> {
        self.children
            .iter()
            .position(|node_id| node_id == child)
            .ok_or(NodeError::HasNoChild {
                parent: self.id,
                child: *child,
            })
    }

    /// Check if the node is a tip node
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if the node is a root node
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn format_name(&self) -> String {
        self.name().map(quote_label).unwrap_or_default()
    }

    fn format_length(&self) -> String {
        self.parent_edge
            .map(|v| format!(":{v}"))
            .unwrap_or_default()
    }

    fn format_comment(&self) -> String {
        self.comment
            .clone()
            .map(|v| format!("[{v}]"))
            .unwrap_or_default()
    }

    /// Returns String with node in newick format
    pub fn to_newick(&self, format: NewickFormat) -> String {
        let mut repr = String::new();

        if let NewickFormat::AllFields | NewickFormat::NoComments | NewickFormat::OnlyNames = format
        {
            repr += &self.format_name()
        }

        if let NewickFormat::AllFields | NewickFormat::NoComments | NewickFormat::OnlyLengths = format
        {
            repr += &self.format_length()
        }

        if let NewickFormat::AllFields = format {
            repr += &self.format_comment()
        }

        repr
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.parent.is_some() != other.parent.is_some() {
            return false;
        }

        let parent_edges_equal = match (self.parent_edge, other.parent_edge) {
            (None, None) => true,
            (Some(l1), Some(l2)) => (l1 - l2).abs() < f64::EPSILON,
            _ => false,
        };

        self.label == other.label
            && self.taxon_label == other.taxon_label
            && self.children.len() == other.children.len()
            && parent_edges_equal
    }
}

impl Eq for Node {}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.parent_edge {
            Some(l) => write!(f, "({l:.3}) {:?}", self.name()),
            None => write!(f, "{:?}", self.name()),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}) {:?}/{:?} Id[{}] AlifeId[{:?}] Parent[{:?}] Depth[{:?}] Origin[{:?}] Children({:?})",
            self.parent_edge,
            self.label,
            self.taxon_label,
            self.id,
            self.alife_id,
            self.parent,
            self.depth,
            self.origin_time,
            self.children,
        )
    }
}
