//! Trees of shared, linked nodes.
//!
//! Each [`LinkedNode`] is a reference counted handle to its data. A node
//! owns strong handles to its children and keeps a weak back-link to its
//! parent, like the node objects of ete or anytree. Cloning a [`LinkedNode`]
//! clones the handle, not the node.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::alife::{AlifeTable, Attributes, Id};
use crate::errors::ConversionError;
use crate::forest::{
    BuildOptions, ExportOptions, Forest, NodeData, TreeAdapter, TreeTraversal, Visit,
};

/// Data stored in a [`LinkedNode`]
#[derive(Debug, Default)]
pub struct LinkedData {
    /// Id of the organism in an alife table
    pub id: Option<Id>,
    /// Name of the node
    pub name: Option<String>,
    /// Distance to the parent node
    pub dist: Option<f64>,
    /// Absolute time at which the node arose
    pub origin_time: Option<f64>,
    /// User defined features
    pub features: Attributes,
    parent: Weak<RefCell<LinkedData>>,
    children: Vec<LinkedNode>,
}

/// A handle to a node of a linked tree.
#[derive(Debug, Clone, Default)]
pub struct LinkedNode(Rc<RefCell<LinkedData>>);

impl LinkedNode {
    /// Creates a detached node
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached named node with a distance to its future parent
    pub fn named(name: &str, dist: Option<f64>) -> Self {
        Self::from_data(LinkedData {
            name: Some(name.to_string()),
            dist,
            ..Default::default()
        })
    }

    fn from_data(data: LinkedData) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    /// Immutably borrows the node data
    pub fn data(&self) -> Ref<'_, LinkedData> {
        self.0.borrow()
    }

    /// Mutably borrows the node data
    pub fn data_mut(&self) -> RefMut<'_, LinkedData> {
        self.0.borrow_mut()
    }

    /// Makes `child` a child of this node
    /// ```
    /// use alifeconv::linked::LinkedNode;
    ///
    /// let root = LinkedNode::named("root", None);
    /// let child = LinkedNode::named("A", Some(0.5));
    /// root.add_child(&child);
    ///
    /// assert!(child.parent().unwrap().ptr_eq(&root));
    /// assert_eq!(root.children().len(), 1);
    /// assert!(child.is_leaf());
    /// ```
    pub fn add_child(&self, child: &LinkedNode) {
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Returns the parent node, if it is still alive
    pub fn parent(&self) -> Option<LinkedNode> {
        self.0.borrow().parent.upgrade().map(LinkedNode)
    }

    /// Returns handles to the child nodes
    pub fn children(&self) -> Vec<LinkedNode> {
        self.0.borrow().children.clone()
    }

    /// Checks if the node has no children
    pub fn is_leaf(&self) -> bool {
        self.0.borrow().children.is_empty()
    }

    /// Checks if the node has no parent
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Checks if two handles point to the same node
    pub fn ptr_eq(&self, other: &LinkedNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Lists the ancestors of the node, closest first
    pub fn ancestors(&self) -> Vec<LinkedNode> {
        let mut ancestors = vec![];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            ancestors.push(node);
        }
        ancestors
    }

    /// Lists the nodes under this one in level order
    /// ```
    /// use alifeconv::linked::LinkedNode;
    ///
    /// let root = LinkedNode::named("root", None);
    /// let a = LinkedNode::named("A", None);
    /// root.add_child(&a);
    /// root.add_child(&LinkedNode::named("B", None));
    /// a.add_child(&LinkedNode::named("C", None));
    ///
    /// let names: Vec<_> = root
    ///     .levelorder()
    ///     .iter()
    ///     .filter_map(|n| n.data().name.clone())
    ///     .collect();
    /// assert_eq!(names, vec!["root", "A", "B", "C"]);
    /// ```
    pub fn levelorder(&self) -> Vec<LinkedNode> {
        let mut nodes = vec![];
        let mut queue = VecDeque::from([self.clone()]);
        while let Some(node) = queue.pop_front() {
            queue.extend(node.children());
            nodes.push(node);
        }
        nodes
    }

    /// Names of the leaves under this node, in level order
    pub fn leaf_names(&self) -> Vec<Option<String>> {
        self.levelorder()
            .iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.data().name.clone())
            .collect()
    }
}

/// Builds one [`LinkedNode`] tree per root of a [`Forest`].
#[derive(Debug, Default)]
pub struct LinkedMaterializer;

impl TreeAdapter for LinkedMaterializer {
    type Handle = LinkedNode;
    type Output = Vec<LinkedNode>;
    const RESERVED: &'static [&'static str] = &["dist", "name", "origin_time"];

    fn construct_node(&mut self, data: &NodeData, attrs: &Attributes) -> LinkedNode {
        LinkedNode::from_data(LinkedData {
            id: data.id,
            name: data.taxon_label.clone().or_else(|| data.label.clone()),
            dist: data.edge_length,
            origin_time: data.origin_time,
            features: attrs.clone(),
            ..Default::default()
        })
    }

    fn attach_child(&mut self, parent: &LinkedNode, child: LinkedNode) -> Result<(), ConversionError> {
        parent.add_child(&child);
        Ok(())
    }

    fn finish(self, roots: Vec<LinkedNode>) -> Result<Vec<LinkedNode>, ConversionError> {
        Ok(roots)
    }
}

impl TreeTraversal for LinkedNode {
    /// Lists the nodes under this one in level order. Node names are read
    /// as taxon labels.
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
        let mut visits = vec![];
        let mut queue: VecDeque<(LinkedNode, Option<usize>)> = VecDeque::from([(self.clone(), None)]);
        while let Some((node, parent)) = queue.pop_front() {
            let position = visits.len();
            let data = node.data();
            visits.push(Visit {
                parent,
                data: NodeData {
                    id: data.id,
                    origin_time: data.origin_time,
                    edge_length: data.dist,
                    label: None,
                    taxon_label: data.name.clone(),
                },
                attrs: data.features.clone(),
            });
            queue.extend(data.children.iter().map(|child| (child.clone(), Some(position))));
        }
        Ok(visits)
    }
}

/// Conversions between linked trees and alife tables
impl LinkedNode {
    /// Builds one linked tree per independent clade of an alife table,
    /// returning the root nodes.
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::forest::BuildOptions;
    /// use alifeconv::linked::LinkedNode;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(1.0),
    ///     AlifeRecord::new(1, "[0]").with_origin_time(4.0).with_label("A"),
    /// ]);
    /// let options = BuildOptions::default().setup_edge_lengths(true);
    /// let roots = LinkedNode::forest_from_alife(&table, &options).unwrap();
    ///
    /// let child = &roots[0].children()[0];
    /// assert_eq!(child.data().name.as_deref(), Some("A"));
    /// assert_eq!(child.data().dist, Some(3.0));
    /// assert!(child.parent().unwrap().ptr_eq(&roots[0]));
    /// ```
    pub fn forest_from_alife(
        table: &AlifeTable,
        options: &BuildOptions,
    ) -> Result<Vec<Self>, ConversionError> {
        Forest::from_table(table, options)?.materialize(LinkedMaterializer)
    }

    /// Flattens the tree under this node into an alife table, nodes listed
    /// in level order.
    pub fn to_alife(&self, options: &ExportOptions) -> Result<AlifeTable, ConversionError> {
        Forest::from_traversal(self)?.to_table(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alife::{AlifeRecord, AttrValue};

    fn example_tree() -> LinkedNode {
        let root = LinkedNode::named("root", None);
        let a = LinkedNode::named("A", Some(1.0));
        let b = LinkedNode::named("B", Some(2.0));
        let c = LinkedNode::named("C", Some(3.0));
        let d = LinkedNode::named("D", Some(4.0));
        root.add_child(&a);
        root.add_child(&b);
        a.add_child(&c);
        a.add_child(&d);
        root
    }

    #[test]
    fn flatten_in_level_order() {
        let table = example_tree().to_alife(&ExportOptions::default()).unwrap();

        let rows: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.ancestor_list.as_str(), r.origin_time, r.taxon_label.as_deref()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, "[None]", Some(0.0), Some("root")),
                (1, "[0]", Some(1.0), Some("A")),
                (2, "[0]", Some(2.0), Some("B")),
                (3, "[1]", Some(4.0), Some("C")),
                (4, "[1]", Some(5.0), Some("D")),
            ]
        );
    }

    #[test]
    fn existing_ids_are_kept() {
        let root = example_tree();
        root.data_mut().id = Some(10);
        root.children()[1].data_mut().id = Some(20);

        let table = root.to_alife(&ExportOptions::default()).unwrap();
        let rows: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.ancestor_list.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![(10, "[None]"), (1, "[10]"), (20, "[10]"), (3, "[1]"), (4, "[1]")]
        );
    }

    #[test]
    fn build_links_parents() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(3, "[1]").with_taxon_label("leaf"),
            AlifeRecord::new(1, "[None]").with_attr("num_orgs", AttrValue::Int(2)),
            AlifeRecord::new(2, "[1]"),
        ]);
        let options = BuildOptions::default().with_attr("num_orgs");
        let roots = LinkedNode::forest_from_alife(&table, &options).unwrap();

        assert_eq!(roots.len(), 1);
        let root = &roots[0];
        assert_eq!(root.data().id, Some(1));
        assert_eq!(root.data().features.get("num_orgs"), Some(&AttrValue::Int(2)));
        assert_eq!(root.leaf_names(), vec![Some("leaf".to_string()), None]);

        for child in root.children() {
            assert!(child.parent().unwrap().ptr_eq(root));
            assert_eq!(child.ancestors().len(), 1);
        }
    }

    #[test]
    fn reserved_feature_names() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_attr("weight", AttrValue::Float(1.0))
        ]);
        let options = BuildOptions::default().with_renamed_attr("weight", "dist");
        assert!(matches!(
            LinkedNode::forest_from_alife(&table, &options),
            Err(ConversionError::NameCollision(_))
        ));
    }
}
