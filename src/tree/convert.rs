//! Conversions between [`Tree`] objects and alife tables.

use std::collections::HashMap;

use super::{Node, NodeId, Tree};
use crate::alife::{AlifeTable, Attributes};
use crate::errors::ConversionError;
use crate::forest::{
    BuildOptions, ExportOptions, Forest, NodeData, TreeAdapter, TreeTraversal, Visit,
};

/// Builds one [`Tree`] per root of a [`Forest`].
#[derive(Debug, Default)]
pub struct TreeMaterializer {
    staging: Tree,
}

impl TreeAdapter for TreeMaterializer {
    type Handle = NodeId;
    type Output = Vec<Tree>;
    const RESERVED: &'static [&'static str] = &["edge_length", "origin_time", "taxon", "taxon_label"];

    fn construct_node(&mut self, data: &NodeData, attrs: &Attributes) -> NodeId {
        self.staging.add(Node {
            alife_id: data.id,
            label: data.label.clone(),
            taxon_label: data.taxon_label.clone().filter(|t| t != "None"),
            parent_edge: data.edge_length,
            origin_time: data.origin_time,
            annotations: attrs.clone(),
            ..Default::default()
        })
    }

    fn attach_child(&mut self, parent: &NodeId, child: NodeId) -> Result<(), ConversionError> {
        let edge = self.staging.get(&child)?.parent_edge;
        self.staging.attach(*parent, child, edge)?;
        Ok(())
    }

    fn finish(self, roots: Vec<NodeId>) -> Result<Vec<Tree>, ConversionError> {
        roots
            .iter()
            .map(|root| {
                self.staging
                    .extract_subtree(root)
                    .map_err(ConversionError::from)
            })
            .collect()
    }
}

impl TreeTraversal for Tree {
    /// Lists the nodes in preorder
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
        let Ok(root) = self.get_root() else {
            return Ok(vec![]);
        };
        let order = self.preorder(&root)?;
        let positions: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(pos, id)| (*id, pos)).collect();

        order
            .iter()
            .map(|id| -> Result<Visit, ConversionError> {
                let node = self.get(id)?;
                Ok(Visit {
                    parent: node.parent.and_then(|p| positions.get(&p).copied()),
                    data: NodeData {
                        id: node.alife_id,
                        origin_time: node.origin_time,
                        edge_length: node.parent_edge,
                        label: node.label.clone(),
                        taxon_label: node.taxon_label.clone(),
                    },
                    attrs: node.annotations.clone(),
                })
            })
            .collect()
    }
}

/// Conversions between [`Tree`] objects and alife tables
///
/// ----
/// ----
impl Tree {
    // ###################
    // # ALIFE DATA      #
    // ###################

    /// Builds one tree per independent clade of an alife table.
    ///
    /// Nodes get the `id`, `origin_time`, `label` and `taxon_label` columns,
    /// `edge_length` becomes the parent edge, and the extra columns named in
    /// `options` become annotations.
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::forest::BuildOptions;
    /// use alifeconv::tree::Tree;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]"),
    ///     AlifeRecord::new(1, "[0]").with_taxon_label("A"),
    ///     AlifeRecord::new(2, "[None]").with_taxon_label("B"),
    /// ]);
    /// let trees = Tree::forest_from_alife(&table, &BuildOptions::default()).unwrap();
    ///
    /// assert_eq!(trees.len(), 2);
    /// assert_eq!(trees[0].to_newick().unwrap(), "(A);");
    /// assert_eq!(trees[1].to_newick().unwrap(), "B;");
    /// ```
    pub fn forest_from_alife(
        table: &AlifeTable,
        options: &BuildOptions,
    ) -> Result<Vec<Self>, ConversionError> {
        Forest::from_table(table, options)?.materialize(TreeMaterializer::default())
    }

    /// Builds a single tree from an alife table, or `None` if the table is empty.
    ///
    /// # Errors
    /// [`ConversionError::InvariantViolation`] if the table holds several
    /// independent clades.
    pub fn from_alife(
        table: &AlifeTable,
        options: &BuildOptions,
    ) -> Result<Option<Self>, ConversionError> {
        let mut trees = Self::forest_from_alife(table, options)?;
        match trees.len() {
            0 | 1 => Ok(trees.pop()),
            n => Err(ConversionError::InvariantViolation(format!(
                "expected a single tree but the table holds {n} independent clades"
            ))),
        }
    }

    /// Flattens the tree into an alife table, nodes listed in preorder.
    ///
    /// Nodes without an alife id get their preorder position as id, and
    /// missing origin times are derived from edge lengths.
    /// ```
    /// use alifeconv::forest::ExportOptions;
    /// use alifeconv::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A:1,B:2)C:0.5;").unwrap();
    /// let table = tree.to_alife(&ExportOptions::default()).unwrap();
    ///
    /// let rows: Vec<_> = table
    ///     .iter()
    ///     .map(|r| (r.id, r.ancestor_list.as_str(), r.origin_time))
    ///     .collect();
    /// assert_eq!(
    ///     rows,
    ///     vec![(0, "[None]", Some(0.5)), (1, "[0]", Some(1.5)), (2, "[0]", Some(2.5))]
    /// );
    /// ```
    pub fn to_alife(&self, options: &ExportOptions) -> Result<AlifeTable, ConversionError> {
        Forest::from_traversal(self)?.to_table(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alife::{AlifeRecord, AttrValue};

    fn example_table() -> AlifeTable {
        AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(0.0),
            AlifeRecord::new(1, "[0]")
                .with_origin_time(1.0)
                .with_label("inner"),
            AlifeRecord::new(2, "[1]")
                .with_origin_time(3.0)
                .with_taxon_label("A")
                .with_attr("num_orgs", AttrValue::Int(4)),
            AlifeRecord::new(3, "[1]")
                .with_origin_time(4.0)
                .with_taxon_label("B"),
        ])
    }

    #[test]
    fn build_tree() {
        let options = BuildOptions::default()
            .setup_edge_lengths(true)
            .with_attr("num_orgs");
        let tree = Tree::from_alife(&example_table(), &options)
            .unwrap()
            .unwrap();

        assert_eq!(tree.to_newick().unwrap(), "((A:2,B:3)inner:1):0;");

        let a = tree.get_by_name("A").unwrap();
        assert_eq!(a.alife_id, Some(2));
        assert_eq!(a.origin_time, Some(3.0));
        assert_eq!(a.get_depth(), 2);
        assert_eq!(a.annotations.get("num_orgs"), Some(&AttrValue::Int(4)));
        assert!(tree.get_by_name("B").unwrap().annotations.is_empty());
    }

    #[test]
    fn round_trip() {
        let options = BuildOptions::default().setup_edge_lengths(true);
        let tree = Tree::from_alife(&example_table(), &options)
            .unwrap()
            .unwrap();
        let table = tree.to_alife(&ExportOptions::default()).unwrap();

        let expected: Vec<_> = example_table()
            .iter()
            .map(|r| (r.id, r.ancestor_list.clone(), r.origin_time, r.taxon_label.clone()))
            .collect();
        let found: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.ancestor_list.clone(), r.origin_time, r.taxon_label.clone()))
            .collect();
        assert_eq!(found, expected);
        assert_eq!(table.records()[2].edge_length, Some(2.0));
    }

    #[test]
    fn single_tree_edge_cases() {
        assert!(Tree::from_alife(&AlifeTable::new(), &BuildOptions::default())
            .unwrap()
            .is_none());

        let two_roots =
            AlifeTable::from_records(vec![AlifeRecord::new(0, "[None]"), AlifeRecord::new(1, "[None]")]);
        assert!(matches!(
            Tree::from_alife(&two_roots, &BuildOptions::default()),
            Err(ConversionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn reserved_attribute_names() {
        for name in ["edge_length", "taxon", "taxon_label", "origin_time"] {
            let options = BuildOptions::default().with_renamed_attr("num_orgs", name);
            assert!(matches!(
                Tree::forest_from_alife(&example_table(), &options),
                Err(ConversionError::NameCollision(_))
            ));
        }
    }

    #[test]
    fn none_taxon_label_is_missing() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_taxon_label("None")
        ]);
        let tree = Tree::from_alife(&table, &BuildOptions::default())
            .unwrap()
            .unwrap();
        assert!(tree.get(&0).unwrap().taxon_label.is_none());
    }

    #[test]
    fn flatten_trees_from_newick() {
        let newick = "((A,B)C,(D,E)F)G;";
        let tree = Tree::from_newick(newick).unwrap();
        let table = tree.to_alife(&ExportOptions::default()).unwrap();

        assert_eq!(table.len(), 7);
        let ids: Vec<_> = table.iter().map(|r| r.id).collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
        assert!(table.iter().all(|r| r.origin_time.is_none()));

        let rebuilt = Tree::from_alife(&table, &BuildOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(rebuilt.to_newick().unwrap(), newick);
    }
}
