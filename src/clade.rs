//! Owned recursive trees, where every clade holds its child clades.
//!
//! This is the shape of Biopython's `Phylo` trees: a [`Clade`] has a
//! `name` and a `branch_length` and owns its sub-clades directly.

use crate::alife::{AlifeTable, Attributes, Id};
use crate::errors::ConversionError;
use crate::forest::{
    BuildOptions, ExportOptions, Forest, NodeData, TreeAdapter, TreeTraversal, Visit,
};

/// A node of a recursive tree, owning its children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clade {
    /// Id of the organism in an alife table
    pub id: Option<Id>,
    /// Name of the clade
    pub name: Option<String>,
    /// Length of the branch leading to the clade
    pub branch_length: Option<f64>,
    /// Absolute time at which the clade arose
    pub origin_time: Option<f64>,
    /// User defined attributes
    pub attrs: Attributes,
    /// Child clades
    pub clades: Vec<Clade>,
}

impl Clade {
    /// Creates an empty clade
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a named clade with a branch length
    pub fn named(name: &str, branch_length: Option<f64>) -> Self {
        Self {
            name: Some(name.to_string()),
            branch_length,
            ..Default::default()
        }
    }

    /// Adds child clades
    pub fn with_clades(mut self, clades: Vec<Clade>) -> Self {
        self.clades.extend(clades);
        self
    }

    /// Checks if the clade has no children
    pub fn is_terminal(&self) -> bool {
        self.clades.is_empty()
    }

    /// Lists the clades of the tree in preorder
    /// ```
    /// use alifeconv::clade::Clade;
    ///
    /// let tree = Clade::named("root", None).with_clades(vec![
    ///     Clade::named("A", None).with_clades(vec![Clade::named("B", None)]),
    ///     Clade::named("C", None),
    /// ]);
    /// let names: Vec<_> = tree
    ///     .find_clades()
    ///     .iter()
    ///     .filter_map(|c| c.name.as_deref())
    ///     .collect();
    ///
    /// assert_eq!(names, vec!["root", "A", "B", "C"]);
    /// ```
    pub fn find_clades(&self) -> Vec<&Clade> {
        let mut clades = vec![];
        let mut stack = vec![self];
        while let Some(clade) = stack.pop() {
            clades.push(clade);
            stack.extend(clade.clades.iter().rev());
        }
        clades
    }

    /// Number of terminal clades under this one
    pub fn count_terminals(&self) -> usize {
        self.find_clades()
            .iter()
            .filter(|clade| clade.is_terminal())
            .count()
    }
}

/// Builds one [`Clade`] per root of a [`Forest`].
///
/// Clade names are taken from taxon labels, or from labels for nodes
/// without a taxon.
#[derive(Debug, Default)]
pub struct CladeMaterializer {
    staging: Vec<Option<Clade>>,
    children: Vec<Vec<usize>>,
}

impl TreeAdapter for CladeMaterializer {
    type Handle = usize;
    type Output = Vec<Clade>;
    const RESERVED: &'static [&'static str] = &["name", "branch_length", "origin_time"];

    fn construct_node(&mut self, data: &NodeData, attrs: &Attributes) -> usize {
        self.staging.push(Some(Clade {
            id: data.id,
            name: data.taxon_label.clone().or_else(|| data.label.clone()),
            branch_length: data.edge_length,
            origin_time: data.origin_time,
            attrs: attrs.clone(),
            clades: vec![],
        }));
        self.children.push(vec![]);
        self.staging.len() - 1
    }

    fn attach_child(&mut self, parent: &usize, child: usize) -> Result<(), ConversionError> {
        self.children
            .get_mut(*parent)
            .ok_or_else(|| ConversionError::InvariantViolation(format!("unknown clade {parent}")))?
            .push(child);
        Ok(())
    }

    fn finish(mut self, roots: Vec<usize>) -> Result<Vec<Clade>, ConversionError> {
        // Nodes are constructed parents first, so walking backwards
        // assembles every child before its parent.
        for idx in (0..self.staging.len()).rev() {
            let clades = self.children[idx]
                .iter()
                .map(|child| {
                    self.staging[*child].take().ok_or_else(|| {
                        ConversionError::InvariantViolation(format!("clade {child} has several parents"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(clade) = self.staging[idx].as_mut() {
                clade.clades = clades;
            }
        }

        roots
            .iter()
            .map(|root| {
                self.staging[*root].take().ok_or_else(|| {
                    ConversionError::InvariantViolation(format!("root clade {root} is a child"))
                })
            })
            .collect()
    }
}

impl TreeTraversal for Clade {
    /// Lists the clades in preorder. The clade name is read as a taxon label.
    fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
        let mut visits = vec![];
        let mut stack: Vec<(&Clade, Option<usize>)> = vec![(self, None)];
        while let Some((clade, parent)) = stack.pop() {
            let position = visits.len();
            visits.push(Visit {
                parent,
                data: NodeData {
                    id: clade.id,
                    origin_time: clade.origin_time,
                    edge_length: clade.branch_length,
                    label: None,
                    taxon_label: clade.name.clone(),
                },
                attrs: clade.attrs.clone(),
            });
            stack.extend(clade.clades.iter().rev().map(|child| (child, Some(position))));
        }
        Ok(visits)
    }
}

/// Conversions between [`Clade`] trees and alife tables
impl Clade {
    /// Builds one clade tree per independent clade of an alife table.
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::clade::Clade;
    /// use alifeconv::forest::BuildOptions;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(0.0),
    ///     AlifeRecord::new(1, "[0]").with_origin_time(2.0).with_taxon_label("A"),
    ///     AlifeRecord::new(2, "[None]"),
    /// ]);
    /// let options = BuildOptions::default().setup_edge_lengths(true);
    /// let trees = Clade::forest_from_alife(&table, &options).unwrap();
    ///
    /// assert_eq!(trees.len(), 2);
    /// assert_eq!(trees[0].clades[0].name.as_deref(), Some("A"));
    /// assert_eq!(trees[0].clades[0].branch_length, Some(2.0));
    /// ```
    pub fn forest_from_alife(
        table: &AlifeTable,
        options: &BuildOptions,
    ) -> Result<Vec<Self>, ConversionError> {
        Forest::from_table(table, options)?.materialize(CladeMaterializer::default())
    }

    /// Builds a single clade tree, or `None` if the table is empty.
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

    /// Flattens the tree into an alife table, clades listed in preorder.
    pub fn to_alife(&self, options: &ExportOptions) -> Result<AlifeTable, ConversionError> {
        Forest::from_traversal(self)?.to_table(options)
    }
}
