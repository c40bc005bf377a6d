//! Flatten a [`Forest`] back into an [`AlifeTable`].

use log::debug;

use super::{Forest, ForestNode, TreeTraversal};
use crate::alife::{make_ancestor_list, AlifeRecord, AlifeTable, Id, RESERVED_COLUMNS};
use crate::errors::ConversionError;

/// Options for [`Forest::to_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Extension attributes to export, as `(attribute, column)` pairs
    pub exportattrs: Vec<(String, String)>,
}

impl ExportOptions {
    /// Exports an attribute as a column of the same name
    pub fn with_attr(self, attribute: &str) -> Self {
        self.with_renamed_attr(attribute, attribute)
    }

    /// Exports an attribute as a column with another name
    pub fn with_renamed_attr(mut self, attribute: &str, column: &str) -> Self {
        self.exportattrs
            .push((attribute.to_string(), column.to_string()));
        self
    }
}

impl Forest {
    /// Reads any representation into a forest.
    ///
    /// Nodes keep the order in which the representation lists them. Missing
    /// origin times are then derived from edge lengths
    /// (see [`Forest::setup_origin_times`]).
    ///
    /// # Errors
    /// [`ConversionError::InvariantViolation`] if a visit names itself or a
    /// missing position as parent, or if parents form a cycle.
    pub fn from_traversal<T: TreeTraversal + ?Sized>(source: &T) -> Result<Self, ConversionError> {
        let visits = source.traverse()?;
        let n_nodes = visits.len();

        let mut forest = Self::default();
        for (idx, visit) in visits.into_iter().enumerate() {
            if let Some(parent) = visit.parent {
                if parent >= n_nodes || parent == idx {
                    return Err(ConversionError::InvariantViolation(format!(
                        "node #{idx} has an invalid parent #{parent}"
                    )));
                }
            }
            if !visit.attrs.is_empty() {
                forest.extensions.insert(idx, visit.attrs);
            }
            forest.nodes.push(ForestNode {
                data: visit.data,
                parent: visit.parent,
                children: vec![],
            });
        }

        for idx in 0..n_nodes {
            match forest.nodes[idx].parent {
                Some(parent) => forest.nodes[parent].children.push(idx),
                None => forest.roots.push(idx),
            }
        }

        if let Some(lost) = forest.unreachable_node() {
            return Err(ConversionError::InvariantViolation(format!(
                "node {} is part of a parent cycle",
                forest.display_id(lost)
            )));
        }

        forest.setup_origin_times();
        Ok(forest)
    }

    /// Flattens the forest into an alife table, one row per node in index order.
    ///
    /// Nodes without an id get their index as id.
    ///
    /// # Errors
    /// [`ConversionError::NameCollision`] if an attribute is exported under
    /// the name of a standard column.
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::forest::{BuildOptions, ExportOptions, Forest};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(4, "[None]"),
    ///     AlifeRecord::new(2, "[4]").with_label("leaf"),
    /// ]);
    /// let forest = Forest::from_table(&table, &BuildOptions::default()).unwrap();
    ///
    /// assert_eq!(forest.to_table(&ExportOptions::default()).unwrap(), table);
    /// ```
    pub fn to_table(&self, options: &ExportOptions) -> Result<AlifeTable, ConversionError> {
        if let Some((_, column)) = options
            .exportattrs
            .iter()
            .find(|(_, column)| RESERVED_COLUMNS.contains(&column.as_str()))
        {
            return Err(ConversionError::NameCollision(column.clone()));
        }

        let ids: Vec<Id> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| node.data.id.unwrap_or(idx as Id))
            .collect();

        let records = self.nodes.iter().enumerate().map(|(idx, node)| {
            let mut record = AlifeRecord::new(ids[idx], &make_ancestor_list(node.parent.map(|p| ids[p])));
            record.origin_time = node.data.origin_time;
            record.edge_length = node.data.edge_length;
            record.label = node.data.label.clone();
            record.taxon_label = node.data.taxon_label.clone();
            record.extra = options
                .exportattrs
                .iter()
                .filter_map(|(attr, column)| {
                    self.attr(idx, attr).map(|v| (column.clone(), v.clone()))
                })
                .collect();
            record
        });

        let table = AlifeTable::from_records(records.collect());
        debug!("Flattened forest into {} rows", table.len());
        Ok(table)
    }
}
