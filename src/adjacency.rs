//! Adjacency lists mapping every organism to its ancestors.

use std::collections::BTreeMap;

use crate::alife::{AlifeTable, Id};
use crate::errors::ConversionError;

/// Map from organism id to the ids of its immediate ancestors.
///
/// Unlike [`Forest`](crate::forest::Forest), organisms may have several
/// ancestors, so sexual phylogenies can be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Adjacency(BTreeMap<Id, Vec<Id>>);

impl Adjacency {
    /// Extracts the ancestor lists of every row of a table.
    ///
    /// # Errors
    /// - [`ConversionError::Format`] for an unparseable ancestor list
    /// - [`ConversionError::InvariantViolation`] for duplicate ids
    ///
    /// # Example
    /// ```
    /// use alifeconv::adjacency::Adjacency;
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]"),
    ///     AlifeRecord::new(1, "[None]"),
    ///     AlifeRecord::new(2, "[0,1]"),
    /// ]);
    /// let adjacency = Adjacency::from_table(&table).unwrap();
    ///
    /// assert_eq!(adjacency.get(2), Some(&[0, 1][..]));
    /// assert_eq!(adjacency.roots(), vec![0, 1]);
    /// ```
    pub fn from_table(table: &AlifeTable) -> Result<Self, ConversionError> {
        let mut map = BTreeMap::new();
        for record in table.iter() {
            let ancestors = record.ancestors().map_err(|e| match e {
                ConversionError::Format(msg) => {
                    ConversionError::Format(format!("row {}: {msg}", record.id))
                }
                other => other,
            })?;
            if map.insert(record.id, ancestors).is_some() {
                return Err(ConversionError::InvariantViolation(format!(
                    "id {} appears several times",
                    record.id
                )));
            }
        }
        Ok(Self(map))
    }

    /// Ancestors of an organism
    pub fn get(&self, id: Id) -> Option<&[Id]> {
        self.0.get(&id).map(Vec::as_slice)
    }

    /// Ids of the organisms without ancestors
    pub fn roots(&self) -> Vec<Id> {
        self.0
            .iter()
            .filter(|(_, ancestors)| ancestors.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of the immediate descendants of an organism
    pub fn children(&self, id: Id) -> Vec<Id> {
        self.0
            .iter()
            .filter(|(_, ancestors)| ancestors.contains(&id))
            .map(|(child, _)| *child)
            .collect()
    }

    /// Iterates over `(id, ancestors)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (Id, &[Id])> {
        self.0.iter().map(|(id, ancestors)| (*id, ancestors.as_slice()))
    }

    /// Number of organisms
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if there are no organisms
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks if any organism has more than one ancestor
    pub fn is_sexual(&self) -> bool {
        self.0.values().any(|ancestors| ancestors.len() > 1)
    }

    /// Consumes the adjacency and returns the underlying map
    pub fn into_inner(self) -> BTreeMap<Id, Vec<Id>> {
        self.0
    }
}

impl From<BTreeMap<Id, Vec<Id>>> for Adjacency {
    fn from(map: BTreeMap<Id, Vec<Id>>) -> Self {
        Self(map)
    }
}
