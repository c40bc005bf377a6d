//! Phylogenies as directed graphs.
//!
//! A [`PhyloGraph`] stores one graph node per organism and one edge from
//! every organism to each of its ancestors. Organisms may have several
//! ancestors, so sexual phylogenies are supported. Call
//! [`reversed`](PhyloGraph::reversed) to orient edges from parents to
//! children.

use std::collections::HashMap;

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::adjacency::Adjacency;
use crate::alife::{
    make_ancestor_list, make_sexual_ancestor_list, AlifeRecord, AlifeTable, Attributes, Id,
    RESERVED_COLUMNS,
};
use crate::errors::ConversionError;
use crate::forest::ExportOptions;

/// Node weight of a [`PhyloGraph`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphNode {
    /// Id of the organism
    pub id: Option<Id>,
    /// Absolute time at which the organism arose
    pub origin_time: Option<f64>,
    /// Distance from the parent
    pub edge_length: Option<f64>,
    /// Display label
    pub label: Option<String>,
    /// Taxon label
    pub taxon_label: Option<String>,
    /// Extra columns of the organism
    pub attrs: Attributes,
}

/// Edge weight of a [`PhyloGraph`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GraphEdge {
    /// Length of the edge
    pub length: Option<f64>,
}

/// A phylogeny stored as a directed graph with edges pointing from
/// children to parents.
#[derive(Debug, Clone, Default)]
pub struct PhyloGraph {
    /// The underlying graph
    pub graph: DiGraph<GraphNode, GraphEdge>,
}

impl PhyloGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from an alife table, sexual or not.
    ///
    /// Every column of the table is copied onto the nodes. When
    /// `setup_edge_lengths` is set, edges get the edge length of the child,
    /// or else the difference of origin times. Without any edge lengths or
    /// origin times in the table, edges get a length of 1.
    ///
    /// # Errors
    /// - [`ConversionError::Format`] for an unparseable ancestor list
    /// - [`ConversionError::InvariantViolation`] for duplicate ids,
    ///   ancestors missing from the table, or a child originating before its
    ///   parent when lengths are derived from origin times
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::graph::PhyloGraph;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(0.0),
    ///     AlifeRecord::new(1, "[None]").with_origin_time(1.0),
    ///     AlifeRecord::new(2, "[0,1]").with_origin_time(4.0),
    /// ]);
    /// let graph = PhyloGraph::from_alife(&table, true).unwrap();
    ///
    /// assert_eq!(graph.graph.node_count(), 3);
    /// assert_eq!(graph.parents(2), vec![0, 1]);
    /// assert_eq!(graph.edge_length(2, 1), Some(3.0));
    /// ```
    pub fn from_alife(table: &AlifeTable, setup_edge_lengths: bool) -> Result<Self, ConversionError> {
        let adjacency = Adjacency::from_table(table)?;
        let default_length = table
            .iter()
            .all(|r| r.edge_length.is_none() && r.origin_time.is_none())
            .then_some(1.0);

        let mut graph = DiGraph::with_capacity(table.len(), table.len());
        let mut indices = HashMap::with_capacity(table.len());
        for record in table.iter() {
            let index = graph.add_node(GraphNode {
                id: Some(record.id),
                origin_time: record.origin_time,
                edge_length: record.edge_length,
                label: record.label.clone(),
                taxon_label: record.taxon_label.clone(),
                attrs: record.extra.clone(),
            });
            indices.insert(record.id, index);
        }

        for (id, ancestors) in adjacency.iter() {
            let child = indices[&id];
            for ancestor in ancestors {
                let parent = *indices.get(ancestor).ok_or_else(|| {
                    ConversionError::InvariantViolation(format!(
                        "row {id} references unknown ancestor {ancestor}"
                    ))
                })?;
                let length = if setup_edge_lengths {
                    let (c, p) = (&graph[child], &graph[parent]);
                    match (c.edge_length, c.origin_time, p.origin_time) {
                        (Some(length), _, _) => Some(length),
                        (None, Some(child_time), Some(parent_time)) => {
                            if child_time < parent_time {
                                return Err(ConversionError::InvariantViolation(format!(
                                    "node {id} originates at {child_time}, before its parent {ancestor} at {parent_time}"
                                )));
                            }
                            Some(child_time - parent_time)
                        }
                        _ => default_length,
                    }
                } else {
                    None
                };
                graph.add_edge(child, parent, GraphEdge { length });
            }
        }

        debug!(
            "Built graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self { graph })
    }

    fn index(&self, id: Id) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|idx| self.graph[*idx].id == Some(id))
    }

    /// Ids of the ancestors of an organism, in table order
    pub fn parents(&self, id: Id) -> Vec<Id> {
        let Some(index) = self.index(id) else {
            return vec![];
        };
        let mut parents: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        // petgraph lists the most recent edge first
        parents.sort_by_key(|(edge, _)| *edge);
        parents
            .into_iter()
            .filter_map(|(_, parent)| self.graph[parent].id)
            .collect()
    }

    /// Ids of the immediate descendants of an organism
    pub fn children(&self, id: Id) -> Vec<Id> {
        let Some(index) = self.index(id) else {
            return vec![];
        };
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .filter_map(|child| self.graph[child].id)
            .collect();
        children.sort_unstable();
        children
    }

    /// Length of the edge from `child` to `parent`
    pub fn edge_length(&self, child: Id, parent: Id) -> Option<f64> {
        let edge = self
            .graph
            .find_edge(self.index(child)?, self.index(parent)?)?;
        self.graph[edge].length
    }

    /// Copy of the graph with edges pointing from parents to children
    pub fn reversed(&self) -> DiGraph<GraphNode, GraphEdge> {
        let mut graph = self.graph.clone();
        graph.reverse();
        graph
    }

    /// Flattens the graph into an alife table, one row per node in node
    /// index order.
    ///
    /// Nodes without an id get their index as id. Nodes without an edge
    /// length and with exactly one parent get the length of that edge.
    /// Extra attributes are exported as requested by `options`.
    ///
    /// # Errors
    /// [`ConversionError::NameCollision`] if an attribute is exported under
    /// the name of a standard column.
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::forest::ExportOptions;
    /// use alifeconv::graph::PhyloGraph;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]"),
    ///     AlifeRecord::new(1, "[None]"),
    ///     AlifeRecord::new(2, "[0,1]"),
    /// ]);
    /// let graph = PhyloGraph::from_alife(&table, false).unwrap();
    /// let rows = graph.to_alife(&ExportOptions::default()).unwrap();
    ///
    /// assert_eq!(rows.records()[2].ancestor_list, "[0,1]");
    /// assert_eq!(rows.records()[2].ancestor_id, None);
    /// assert_eq!(rows.records()[0].ancestor_id, Some(0));
    /// ```
    pub fn to_alife(&self, options: &ExportOptions) -> Result<AlifeTable, ConversionError> {
        if let Some((_, column)) = options
            .exportattrs
            .iter()
            .find(|(_, column)| RESERVED_COLUMNS.contains(&column.as_str()))
        {
            return Err(ConversionError::NameCollision(column.clone()));
        }

        let ids: HashMap<NodeIndex, Id> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph[idx].id.unwrap_or(idx.index() as Id)))
            .collect();

        let records = self.graph.node_indices().map(|idx| {
            let node = &self.graph[idx];
            let mut edges: Vec<_> = self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .collect();
            edges.sort_by_key(|edge| edge.id());
            let parents: Vec<Id> = edges.iter().map(|edge| ids[&edge.target()]).collect();

            let id = ids[&idx];
            let mut record = match parents.as_slice() {
                [] | [_] => AlifeRecord::new(id, &make_ancestor_list(parents.first().copied())),
                _ => AlifeRecord::new(id, &make_sexual_ancestor_list(&parents)),
            };
            record.ancestor_id = match parents.as_slice() {
                [] => Some(id),
                [parent] => Some(*parent),
                _ => None,
            };
            record.origin_time = node.origin_time;
            record.edge_length = match edges.as_slice() {
                [edge] => node.edge_length.or(edge.weight().length),
                _ => node.edge_length,
            };
            record.label = node.label.clone();
            record.taxon_label = node.taxon_label.clone();
            record.extra = options
                .exportattrs
                .iter()
                .filter_map(|(attr, column)| node.attrs.get(attr).map(|v| (column.clone(), v.clone())))
                .collect();
            record
        });

        Ok(AlifeTable::from_records(records.collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alife::AttrValue;

    fn asexual_table() -> AlifeTable {
        AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(0.0),
            AlifeRecord::new(1, "[0]").with_origin_time(2.0).with_label("A"),
            AlifeRecord::new(2, "[0]")
                .with_origin_time(3.0)
                .with_edge_length(10.0),
            AlifeRecord::new(3, "[1]")
                .with_origin_time(2.5)
                .with_attr("num_orgs", AttrValue::Int(3)),
        ])
    }

    #[test]
    fn build_asexual_graph() {
        let graph = PhyloGraph::from_alife(&asexual_table(), true).unwrap();

        assert_eq!(graph.graph.node_count(), 4);
        assert_eq!(graph.graph.edge_count(), 3);
        assert_eq!(graph.parents(3), vec![1]);
        assert_eq!(graph.children(0), vec![1, 2]);
        assert_eq!(graph.edge_length(1, 0), Some(2.0));
        assert_eq!(graph.edge_length(2, 0), Some(10.0));
        assert_eq!(graph.edge_length(3, 1), Some(0.5));
        assert_eq!(graph.edge_length(0, 1), None);

        let reversed = graph.reversed();
        assert_eq!(reversed.edge_count(), 3);
        assert!(reversed
            .neighbors_directed(NodeIndex::new(0), Direction::Outgoing)
            .any(|n| n == NodeIndex::new(2)));
    }

    #[test]
    fn edge_lengths_are_optional() {
        let graph = PhyloGraph::from_alife(&asexual_table(), false).unwrap();
        assert_eq!(graph.edge_length(1, 0), None);

        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[0]"),
        ]);
        let graph = PhyloGraph::from_alife(&table, true).unwrap();
        assert_eq!(graph.edge_length(1, 0), Some(1.0));
    }

    #[test]
    fn child_older_than_parent() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(5.0),
            AlifeRecord::new(1, "[0]").with_origin_time(2.0),
        ]);
        assert!(matches!(
            PhyloGraph::from_alife(&table, true),
            Err(ConversionError::InvariantViolation(_))
        ));

        let graph = PhyloGraph::from_alife(&table, false).unwrap();
        assert_eq!(graph.edge_length(1, 0), None);
    }

    #[test]
    fn unknown_ancestor() {
        let table = AlifeTable::from_records(vec![AlifeRecord::new(1, "[0]")]);
        assert!(matches!(
            PhyloGraph::from_alife(&table, false),
            Err(ConversionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn flatten_graph() {
        let graph = PhyloGraph::from_alife(&asexual_table(), true).unwrap();
        let table = graph
            .to_alife(&ExportOptions::default().with_attr("num_orgs"))
            .unwrap();

        let rows: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.ancestor_list.as_str(), r.ancestor_id, r.edge_length))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, "[None]", Some(0), None),
                (1, "[0]", Some(0), Some(2.0)),
                (2, "[0]", Some(0), Some(10.0)),
                (3, "[1]", Some(1), Some(0.5)),
            ]
        );
        assert_eq!(table.records()[1].label.as_deref(), Some("A"));
        assert_eq!(
            table.records()[3].extra.get("num_orgs"),
            Some(&AttrValue::Int(3))
        );

        assert!(matches!(
            graph.to_alife(&ExportOptions::default().with_renamed_attr("num_orgs", "label")),
            Err(ConversionError::NameCollision(_))
        ));
    }

    #[test]
    fn fallback_ids() {
        let mut graph = PhyloGraph::new();
        let root = graph.graph.add_node(GraphNode::default());
        let child = graph.graph.add_node(GraphNode {
            taxon_label: Some("leaf".into()),
            ..Default::default()
        });
        graph.graph.add_edge(child, root, GraphEdge { length: Some(1.5) });

        let table = graph.to_alife(&ExportOptions::default()).unwrap();
        assert_eq!(table.records()[1].id, 1);
        assert_eq!(table.records()[1].ancestor_list, "[0]");
        assert_eq!(table.records()[1].edge_length, Some(1.5));
    }

    #[test]
    fn sexual_round_trip() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[None]"),
            AlifeRecord::new(2, "[1,0]"),
            AlifeRecord::new(3, "[2]"),
        ]);
        let graph = PhyloGraph::from_alife(&table, false).unwrap();
        assert_eq!(graph.parents(2), vec![1, 0]);

        let flattened = graph.to_alife(&ExportOptions::default()).unwrap();
        let lists: Vec<_> = flattened.iter().map(|r| r.ancestor_list.as_str()).collect();
        assert_eq!(lists, vec!["[None]", "[None]", "[1,0]", "[2]"]);
    }
}
