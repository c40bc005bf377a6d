//! The tabular "alife standard" phylogeny representation.
//!
//! A phylogeny is stored as one [`AlifeRecord`] per organism, each record
//! naming its ancestors through the textual `ancestor_list` column.
//! The [`AlifeTable`] struct holds an ordered collection of such records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod ancestor_list;
pub mod io;
pub mod validate;

pub use self::ancestor_list::{
    make_ancestor_id, make_ancestor_list, make_sexual_ancestor_list, parse_ancestor_list,
};
pub use self::validate::{validate, ValidationError, ValidationMode};

use crate::errors::ConversionError;

/// A type that represents the identifier of a row (organism) in an [`AlifeTable`]
pub type Id = u64;

/// Extra, user-defined values attached to a row or a node, keyed by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Names of the columns every [`AlifeRecord`] carries natively.
pub const RESERVED_COLUMNS: [&str; 7] = [
    "id",
    "ancestor_list",
    "ancestor_id",
    "origin_time",
    "edge_length",
    "label",
    "taxon_label",
];

/// Column names accepted as synonyms of `edge_length` when reading tables.
pub const EDGE_LENGTH_ALIASES: [&str; 3] = ["branch_length", "dist", "length"];

/// A typed value stored in a non-standard column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// `true` or `false`
    Bool(bool),
    /// A signed integer
    Int(i64),
    /// A floating point number
    Float(f64),
    /// Anything else
    Text(String),
}

impl AttrValue {
    /// Infers the type of a textual cell, trying booleans, integers
    /// and floats before falling back to text.
    /// ```
    /// use alifeconv::alife::AttrValue;
    ///
    /// assert_eq!(AttrValue::from_cell("12"), AttrValue::Int(12));
    /// assert_eq!(AttrValue::from_cell("0.5"), AttrValue::Float(0.5));
    /// assert_eq!(AttrValue::from_cell("True"), AttrValue::Bool(true));
    /// assert_eq!(AttrValue::from_cell("abc"), AttrValue::Text("abc".into()));
    /// ```
    pub fn from_cell(cell: &str) -> Self {
        match cell {
            "true" | "True" | "TRUE" => return Self::Bool(true),
            "false" | "False" | "FALSE" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(v) = cell.parse::<i64>() {
            Self::Int(v)
        } else if let Ok(v) = cell.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Text(cell.to_string())
        }
    }

    /// Returns the value as a float if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One row of an alife standard phylogeny table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlifeRecord {
    /// Unique identifier of the organism
    pub id: Id,
    /// Textual list of ancestor ids, e.g. `[3]`, `[None]` or `[1,2]`
    pub ancestor_list: String,
    /// Integer ancestor id, equal to `id` for roots (asexual phylogenies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor_id: Option<Id>,
    /// Absolute time at which the organism arose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_time: Option<f64>,
    /// Distance from the parent to this organism
    #[serde(
        default,
        alias = "branch_length",
        alias = "dist",
        alias = "length",
        skip_serializing_if = "Option::is_none"
    )]
    pub edge_length: Option<f64>,
    /// Display label
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Taxon label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_label: Option<String>,
    /// Any other column
    #[serde(flatten)]
    pub extra: Attributes,
}

impl AlifeRecord {
    /// Creates a record with only the mandatory columns set
    /// ```
    /// use alifeconv::alife::AlifeRecord;
    ///
    /// let record = AlifeRecord::new(1, "[0]");
    /// assert_eq!(record.ancestor_list, "[0]");
    /// assert!(record.origin_time.is_none());
    /// ```
    pub fn new(id: Id, ancestor_list: &str) -> Self {
        Self {
            id,
            ancestor_list: ancestor_list.to_string(),
            ..Default::default()
        }
    }

    /// Sets the origin time of the record
    pub fn with_origin_time(mut self, origin_time: f64) -> Self {
        self.origin_time = Some(origin_time);
        self
    }

    /// Sets the edge length of the record
    pub fn with_edge_length(mut self, edge_length: f64) -> Self {
        self.edge_length = Some(edge_length);
        self
    }

    /// Sets the label of the record
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Sets the taxon label of the record
    pub fn with_taxon_label(mut self, taxon_label: &str) -> Self {
        self.taxon_label = Some(taxon_label.to_string());
        self
    }

    /// Adds an extra column value to the record
    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Parses the `ancestor_list` of this record
    pub fn ancestors(&self) -> Result<Vec<Id>, ConversionError> {
        parse_ancestor_list(&self.ancestor_list)
    }

    /// Gets the value of any column, standard or extra, by name
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AttrValue};
    ///
    /// let record = AlifeRecord::new(3, "[1]")
    ///     .with_origin_time(2.0)
    ///     .with_attr("num_orgs", AttrValue::Int(10));
    ///
    /// assert_eq!(record.column("id"), Some(AttrValue::Int(3)));
    /// assert_eq!(record.column("origin_time"), Some(AttrValue::Float(2.0)));
    /// assert_eq!(record.column("num_orgs"), Some(AttrValue::Int(10)));
    /// assert_eq!(record.column("label"), None);
    /// ```
    pub fn column(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(AttrValue::Int(self.id as i64)),
            "ancestor_list" => Some(AttrValue::Text(self.ancestor_list.clone())),
            "ancestor_id" => self.ancestor_id.map(|v| AttrValue::Int(v as i64)),
            "origin_time" => self.origin_time.map(AttrValue::Float),
            "edge_length" => self.edge_length.map(AttrValue::Float),
            "label" => self.label.clone().map(AttrValue::Text),
            "taxon_label" => self.taxon_label.clone().map(AttrValue::Text),
            _ => self.extra.get(name).cloned(),
        }
    }

    /// Replaces NaN floats with missing values
    pub(crate) fn normalize(&mut self) {
        self.origin_time = self.origin_time.filter(|v| !v.is_nan());
        self.edge_length = self.edge_length.filter(|v| !v.is_nan());
    }
}

/// An ordered collection of [`AlifeRecord`] rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlifeTable {
    records: Vec<AlifeRecord>,
}

impl AlifeTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self { records: vec![] }
    }

    /// Creates a table from a list of records, normalizing NaN values to missing
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(f64::NAN),
    ///     AlifeRecord::new(1, "[0]"),
    /// ]);
    /// assert_eq!(table.len(), 2);
    /// assert!(table.records()[0].origin_time.is_none());
    /// ```
    pub fn from_records(records: Vec<AlifeRecord>) -> Self {
        let mut table = Self { records };
        table.records.iter_mut().for_each(AlifeRecord::normalize);
        table
    }

    /// Appends a record to the table
    pub fn push(&mut self, mut record: AlifeRecord) {
        record.normalize();
        self.records.push(record);
    }

    /// Returns the records of the table
    pub fn records(&self) -> &[AlifeRecord] {
        &self.records
    }

    /// Returns an iterator over the records of the table
    pub fn iter(&self) -> std::slice::Iter<'_, AlifeRecord> {
        self.records.iter()
    }

    /// Consumes the table and returns its records
    pub fn into_records(self) -> Vec<AlifeRecord> {
        self.records
    }

    /// Number of rows in the table
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Gets the record with a given id
    pub fn get(&self, id: Id) -> Option<&AlifeRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Checks if a standard or extra column exists in the table
    pub fn has_column(&self, name: &str) -> bool {
        RESERVED_COLUMNS.contains(&name) || self.iter().any(|r| r.extra.contains_key(name))
    }

    /// Names of the non-standard columns present in at least one row
    pub fn extra_columns(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|record| record.extra.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Do any organisms in the phylogeny have more than one immediate ancestor?
    ///
    /// Detection is all-or-nothing: a single comma in any `ancestor_list`
    /// makes the whole table sexual.
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]"),
    ///     AlifeRecord::new(1, "[None]"),
    ///     AlifeRecord::new(2, "[0,1]"),
    /// ]);
    /// assert!(table.is_sexual());
    /// assert!(!table.is_asexual());
    /// ```
    pub fn is_sexual(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.ancestor_list.contains(','))
    }

    /// Do all organisms in the phylogeny have one or no immediate ancestor?
    /// A table with a fully populated `ancestor_id` column is asexual by construction.
    pub fn is_asexual(&self) -> bool {
        self.has_ancestor_ids() || !self.is_sexual()
    }

    /// Checks if every row has an `ancestor_id` value
    pub fn has_ancestor_ids(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.ancestor_id.is_some())
    }

    /// Returns a copy of the table with the `ancestor_id` column filled in.
    /// Roots get their own id as ancestor id.
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]"),
    ///     AlifeRecord::new(1, "[0]"),
    /// ])
    /// .with_ancestor_ids()
    /// .unwrap();
    ///
    /// let ids: Vec<_> = table.iter().map(|r| r.ancestor_id).collect();
    /// assert_eq!(ids, vec![Some(0), Some(0)]);
    /// ```
    pub fn with_ancestor_ids(&self) -> Result<Self, ConversionError> {
        let mut table = self.clone();
        for record in table.records.iter_mut() {
            let ancestors = record.ancestors()?;
            record.ancestor_id = Some(make_ancestor_id(record.id, &ancestors)?);
        }
        Ok(table)
    }
}

impl FromIterator<AlifeRecord> for AlifeTable {
    fn from_iter<I: IntoIterator<Item = AlifeRecord>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AlifeTable {
    type Item = &'a AlifeRecord;
    type IntoIter = std::slice::Iter<'a, AlifeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asexual_detection() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[0]"),
        ]);
        assert!(table.is_asexual());
        assert!(!table.is_sexual());
    }

    #[test]
    fn ancestor_id_column_marks_table_asexual() {
        let mut records = vec![AlifeRecord::new(0, "[None]"), AlifeRecord::new(1, "[0,0]")];
        records[0].ancestor_id = Some(0);
        records[1].ancestor_id = Some(0);
        let table = AlifeTable::from_records(records);

        assert!(table.is_sexual());
        assert!(table.is_asexual());
    }

    #[test]
    fn ancestor_ids_of_sexual_table_fail() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[None]"),
            AlifeRecord::new(2, "[0,1]"),
        ]);
        assert!(matches!(
            table.with_ancestor_ids(),
            Err(ConversionError::UnsupportedTopology { id: 2, n_parents: 2 })
        ));
    }

    #[test]
    fn extra_columns_are_sorted_union() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_attr("num_orgs", AttrValue::Int(3)),
            AlifeRecord::new(1, "[0]").with_attr("fitness", AttrValue::Float(0.5)),
        ]);
        assert_eq!(table.extra_columns(), vec!["fitness", "num_orgs"]);
    }
}
