//! Representation-independent phylogeny reconstruction.
//!
//! A [`Forest`] is an arena of nodes linked by indices. It is built from an
//! [`AlifeTable`] with [`Forest::from_table`] and turned into any tree
//! representation through a [`TreeAdapter`]. Conversely, any representation
//! implementing [`TreeTraversal`] can be read into a [`Forest`] and flattened
//! back into a table with [`Forest::to_table`].

use std::collections::HashMap;

use log::debug;

use crate::alife::{AlifeRecord, AlifeTable, AttrValue, Attributes, Id};
use crate::errors::ConversionError;

mod adapter;
mod flatten;
mod reconcile;

pub use self::adapter::{TreeAdapter, TreeTraversal, Visit};
pub use self::flatten::ExportOptions;

/// Payload carried by every node, whatever the representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    /// Id of the organism, if known
    pub id: Option<Id>,
    /// Absolute time at which the organism arose
    pub origin_time: Option<f64>,
    /// Distance from the parent
    pub edge_length: Option<f64>,
    /// Display label
    pub label: Option<String>,
    /// Taxon label
    pub taxon_label: Option<String>,
}

impl From<&AlifeRecord> for NodeData {
    fn from(record: &AlifeRecord) -> Self {
        Self {
            id: Some(record.id),
            origin_time: record.origin_time,
            edge_length: record.edge_length,
            label: record.label.clone(),
            taxon_label: record.taxon_label.clone(),
        }
    }
}

/// A node of a [`Forest`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestNode {
    /// Payload of the node
    pub data: NodeData,
    /// Index of the parent node
    pub parent: Option<usize>,
    /// Indices of the child nodes
    pub children: Vec<usize>,
}

/// Options for [`Forest::from_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Extra columns to copy onto nodes, as `(column, attribute name)` pairs
    pub setattrs: Vec<(String, String)>,
    /// Derive missing edge lengths from origin times
    pub setup_edge_lengths: bool,
}

impl BuildOptions {
    /// Copies a column onto the nodes under the same name
    pub fn with_attr(self, column: &str) -> Self {
        self.with_renamed_attr(column, column)
    }

    /// Copies a column onto the nodes under another name
    pub fn with_renamed_attr(mut self, column: &str, attribute: &str) -> Self {
        self.setattrs.push((column.to_string(), attribute.to_string()));
        self
    }

    /// Sets whether missing edge lengths are derived from origin times
    pub fn setup_edge_lengths(mut self, setup: bool) -> Self {
        self.setup_edge_lengths = setup;
        self
    }
}

/// An arena holding one or several rooted trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    nodes: Vec<ForestNode>,
    roots: Vec<usize>,
    extensions: HashMap<usize, Attributes>,
}

impl Forest {
    /// Builds a forest from an asexual alife table.
    ///
    /// Every row becomes a node, in row order, and rows may reference
    /// ancestors that appear later in the table. Rows with an empty ancestor
    /// list are roots, kept in order of first appearance.
    ///
    /// # Errors
    /// - [`ConversionError::Format`] for an unparseable ancestor list or an
    ///   unknown column in [`BuildOptions::setattrs`]
    /// - [`ConversionError::UnsupportedTopology`] for rows with several ancestors
    /// - [`ConversionError::InvariantViolation`] for duplicate ids, unknown or
    ///   self-referencing ancestors and cycles
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::forest::{BuildOptions, Forest};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(1.0),
    ///     AlifeRecord::new(1, "[0]").with_origin_time(3.0),
    /// ]);
    /// let options = BuildOptions::default().setup_edge_lengths(true);
    /// let forest = Forest::from_table(&table, &options).unwrap();
    ///
    /// assert_eq!(forest.roots(), &[0]);
    /// assert_eq!(forest.get(1).unwrap().data.edge_length, Some(2.0));
    /// assert_eq!(forest.get(0).unwrap().data.edge_length, Some(1.0));
    /// ```
    pub fn from_table(table: &AlifeTable, options: &BuildOptions) -> Result<Self, ConversionError> {
        if let Some((column, _)) = options.setattrs.iter().find(|(c, _)| !table.has_column(c)) {
            return Err(ConversionError::Format(format!(
                "column '{column}' does not exist in the table"
            )));
        }

        // Phase one: one slot per row, so that ancestors can be referenced
        // in any order.
        let mut slots: HashMap<Id, usize> = HashMap::with_capacity(table.len());
        let mut ancestors = Vec::with_capacity(table.len());
        for (idx, record) in table.iter().enumerate() {
            let parsed = record.ancestors().map_err(|e| match e {
                ConversionError::Format(msg) => {
                    ConversionError::Format(format!("row {}: {msg}", record.id))
                }
                other => other,
            })?;
            if slots.insert(record.id, idx).is_some() {
                return Err(ConversionError::InvariantViolation(format!(
                    "id {} appears several times",
                    record.id
                )));
            }
            ancestors.push(parsed);
        }

        let mut forest = Self {
            nodes: table
                .iter()
                .map(|record| ForestNode {
                    data: NodeData::from(record),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        // Phase two: attributes and links
        for (idx, (record, parents)) in table.iter().zip(ancestors).enumerate() {
            if !options.setattrs.is_empty() {
                let attrs: Attributes = options
                    .setattrs
                    .iter()
                    .filter_map(|(column, name)| record.column(column).map(|v| (name.clone(), v)))
                    .collect();
                forest.extensions.insert(idx, attrs);
            }

            match parents.as_slice() {
                [] => forest.roots.push(idx),
                [parent] if *parent == record.id => {
                    return Err(ConversionError::InvariantViolation(format!(
                        "row {parent} is its own ancestor"
                    )));
                }
                [parent] => {
                    let parent_idx = *slots.get(parent).ok_or_else(|| {
                        ConversionError::InvariantViolation(format!(
                            "row {} references unknown ancestor {parent}",
                            record.id
                        ))
                    })?;
                    forest.nodes[idx].parent = Some(parent_idx);
                    forest.nodes[parent_idx].children.push(idx);
                }
                _ => {
                    return Err(ConversionError::UnsupportedTopology {
                        id: record.id,
                        n_parents: parents.len(),
                    })
                }
            }
        }

        if let Some(lost) = forest.unreachable_node() {
            return Err(ConversionError::InvariantViolation(format!(
                "row {} is part of an ancestry cycle",
                forest.display_id(lost)
            )));
        }

        debug!(
            "Built forest of {} nodes with {} roots",
            forest.len(),
            forest.roots.len()
        );

        if options.setup_edge_lengths {
            forest.setup_edge_lengths()?;
        }

        Ok(forest)
    }

    /// Creates a representation of the forest through an adapter.
    ///
    /// Nodes are constructed in preorder, one root after the other, so a
    /// parent handle always exists when its children are attached.
    ///
    /// # Errors
    /// [`ConversionError::NameCollision`] if an extension attribute has a
    /// name reserved by the adapter.
    pub fn materialize<A: TreeAdapter>(&self, mut adapter: A) -> Result<A::Output, ConversionError> {
        if let Some(name) = self
            .extensions
            .values()
            .flat_map(|attrs| attrs.keys())
            .find(|name| A::RESERVED.contains(&name.as_str()))
        {
            return Err(ConversionError::NameCollision(name.clone()));
        }

        let empty = Attributes::new();
        let mut handles: Vec<Option<A::Handle>> = vec![None; self.nodes.len()];
        let mut roots = Vec::with_capacity(self.roots.len());

        for root in self.roots.iter() {
            for idx in self.preorder(*root) {
                let node = &self.nodes[idx];
                let attrs = self.extensions.get(&idx).unwrap_or(&empty);
                let handle = adapter.construct_node(&node.data, attrs);

                match node.parent.and_then(|p| handles[p].as_ref()) {
                    Some(parent) => adapter.attach_child(parent, handle.clone())?,
                    None => roots.push(handle.clone()),
                }
                handles[idx] = Some(handle);
            }
        }

        adapter.finish(roots)
    }

    /// Number of nodes in the forest
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Checks if the forest has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of the root nodes, in order of first appearance
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Gets a node by index
    pub fn get(&self, idx: usize) -> Option<&ForestNode> {
        self.nodes.get(idx)
    }

    /// Gets the extension attributes of a node
    pub fn attrs(&self, idx: usize) -> Option<&Attributes> {
        self.extensions.get(&idx)
    }

    /// Gets an extension attribute of a node
    pub fn attr(&self, idx: usize, name: &str) -> Option<&AttrValue> {
        self.extensions.get(&idx).and_then(|attrs| attrs.get(name))
    }

    /// Iterates over all the nodes in index order
    pub fn iter(&self) -> std::slice::Iter<'_, ForestNode> {
        self.nodes.iter()
    }

    /// Returns the indices of the subtree under `root` in preorder
    pub fn preorder(&self, root: usize) -> Vec<usize> {
        let mut indices = vec![];
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            indices.push(idx);
            if let Some(node) = self.nodes.get(idx) {
                stack.extend(node.children.iter().rev());
            }
        }
        indices
    }

    // First node that no root leads to
    fn unreachable_node(&self) -> Option<usize> {
        let mut seen = vec![false; self.len()];
        for root in self.roots.iter() {
            self.preorder(*root).into_iter().for_each(|i| seen[i] = true);
        }
        seen.iter().position(|s| !s)
    }

    // Name of a node in error messages
    fn display_id(&self, idx: usize) -> String {
        match self.nodes.get(idx).and_then(|n| n.data.id) {
            Some(id) => id.to_string(),
            None => format!("#{idx}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(Id, &str)]) -> AlifeTable {
        rows.iter()
            .map(|(id, list)| AlifeRecord::new(*id, list))
            .collect()
    }

    fn ids(forest: &Forest, indices: &[usize]) -> Vec<Id> {
        indices
            .iter()
            .filter_map(|i| forest.get(*i).and_then(|n| n.data.id))
            .collect()
    }

    #[test]
    fn build_out_of_order_rows() {
        let t = table(&[(3, "[1]"), (2, "[0]"), (1, "[0]"), (0, "[None]")]);
        let forest = Forest::from_table(&t, &BuildOptions::default()).unwrap();

        assert_eq!(ids(&forest, forest.roots()), vec![0]);
        let root = forest.roots()[0];
        assert_eq!(ids(&forest, &forest.preorder(root)), vec![0, 2, 1, 3]);
    }

    #[test]
    fn one_root_per_empty_ancestor_list() {
        let t = table(&[
            (0, "[None]"),
            (1, "[none]"),
            (2, "[]"),
            (3, "[0]"),
            (4, "[2]"),
            (5, "NONE"),
        ]);
        let forest = Forest::from_table(&t, &BuildOptions::default()).unwrap();

        assert_eq!(ids(&forest, forest.roots()), vec![0, 1, 2, 5]);
    }

    #[test]
    fn empty_table() {
        let forest = Forest::from_table(&AlifeTable::new(), &BuildOptions::default()).unwrap();
        assert!(forest.is_empty());
        assert!(forest.roots().is_empty());
    }

    #[test]
    fn sexual_rows_are_rejected() {
        let t = table(&[(0, "[None]"), (1, "[None]"), (2, "[1,0]")]);
        assert!(matches!(
            Forest::from_table(&t, &BuildOptions::default()),
            Err(ConversionError::UnsupportedTopology { id: 2, n_parents: 2 })
        ));
    }

    #[test]
    fn structural_errors() {
        let cases = [
            table(&[(0, "[None]"), (0, "[0]")]),
            table(&[(0, "[None]"), (1, "[4]")]),
            table(&[(0, "[0]")]),
            table(&[(0, "[None]"), (1, "[2]"), (2, "[1]")]),
        ];
        for t in cases {
            assert!(
                matches!(
                    Forest::from_table(&t, &BuildOptions::default()),
                    Err(ConversionError::InvariantViolation(_))
                ),
                "{t:?}"
            );
        }
    }

    #[test]
    fn malformed_list_names_row() {
        let t = table(&[(0, "[None]"), (7, "[0, 1]")]);
        match Forest::from_table(&t, &BuildOptions::default()) {
            Err(ConversionError::Format(msg)) => assert!(msg.starts_with("row 7")),
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn setattrs_are_copied() {
        let t: AlifeTable = vec![
            AlifeRecord::new(0, "[None]").with_attr("num_orgs", AttrValue::Int(2)),
            AlifeRecord::new(1, "[0]"),
        ]
        .into_iter()
        .collect();

        let options = BuildOptions::default()
            .with_renamed_attr("num_orgs", "count")
            .with_attr("origin_time");
        let forest = Forest::from_table(&t, &options).unwrap();

        assert_eq!(forest.attr(0, "count"), Some(&AttrValue::Int(2)));
        assert_eq!(forest.attr(1, "count"), None);
        assert_eq!(forest.attr(0, "origin_time"), None);

        let missing = BuildOptions::default().with_attr("fitness");
        assert!(matches!(
            Forest::from_table(&t, &missing),
            Err(ConversionError::Format(_))
        ));
    }

    struct Collect;

    impl TreeAdapter for Collect {
        type Handle = Id;
        type Output = Vec<(Option<Id>, Id)>;
        const RESERVED: &'static [&'static str] = &["name"];

        fn construct_node(&mut self, data: &NodeData, _attrs: &Attributes) -> Id {
            data.id.unwrap_or_default()
        }

        fn attach_child(&mut self, _parent: &Id, _child: Id) -> Result<(), ConversionError> {
            Ok(())
        }

        fn finish(self, roots: Vec<Id>) -> Result<Self::Output, ConversionError> {
            Ok(roots.into_iter().map(|r| (None, r)).collect())
        }
    }

    #[test]
    fn materialize_checks_reserved_names() {
        let t: AlifeTable = vec![AlifeRecord::new(0, "[None]").with_label("a")]
            .into_iter()
            .collect();

        let ok = Forest::from_table(&t, &BuildOptions::default()).unwrap();
        assert_eq!(ok.materialize(Collect).unwrap(), vec![(None, 0)]);

        let options = BuildOptions::default().with_renamed_attr("label", "name");
        let clash = Forest::from_table(&t, &options).unwrap();
        assert!(matches!(
            clash.materialize(Collect),
            Err(ConversionError::NameCollision(name)) if name == "name"
        ));
    }
}
