use super::NodeData;
use crate::alife::Attributes;
use crate::errors::ConversionError;

/// Builds a tree representation node by node.
///
/// [`Forest::materialize`](super::Forest::materialize) calls
/// [`construct_node`](TreeAdapter::construct_node) for every node in preorder,
/// then [`attach_child`](TreeAdapter::attach_child) to link it to its parent,
/// and finally [`finish`](TreeAdapter::finish) with the root handles.
pub trait TreeAdapter {
    /// Reference to a constructed node
    type Handle: Clone;
    /// The finished representation
    type Output;
    /// Attribute names the representation uses for its own fields
    const RESERVED: &'static [&'static str] = &[];

    /// Creates a detached node
    fn construct_node(&mut self, data: &NodeData, attrs: &Attributes) -> Self::Handle;

    /// Makes `child` a child of `parent`
    fn attach_child(
        &mut self,
        parent: &Self::Handle,
        child: Self::Handle,
    ) -> Result<(), ConversionError>;

    /// Assembles the representation from its roots
    fn finish(self, roots: Vec<Self::Handle>) -> Result<Self::Output, ConversionError>;
}

/// One node of a representation, as seen during a traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visit {
    /// Position of the parent in the list of visits
    pub parent: Option<usize>,
    /// Payload of the node
    pub data: NodeData,
    /// Extra attributes of the node
    pub attrs: Attributes,
}

/// Lists the nodes of a tree representation in its canonical order.
pub trait TreeTraversal {
    /// Returns every node of the representation. Parents may be listed
    /// before or after their children.
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError>;
}

impl<T: TreeTraversal> TreeTraversal for [T] {
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
        let mut visits = vec![];
        for tree in self.iter() {
            let offset = visits.len();
            visits.extend(tree.traverse()?.into_iter().map(|mut visit| {
                visit.parent = visit.parent.map(|p| p + offset);
                visit
            }));
        }
        Ok(visits)
    }
}

impl<T: TreeTraversal> TreeTraversal for Vec<T> {
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
        self.as_slice().traverse()
    }
}
