//! Check that an [`AlifeTable`] complies with the alife data standard.

use std::collections::HashSet;

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{make_ancestor_id, parse_ancestor_list, AlifeTable, Id};
use crate::errors::ConversionError;

/// Reasons why a table does not comply with the alife data standard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two rows share the same id
    #[error("Id {0} is not unique.")]
    DuplicateId(Id),
    /// An ancestor list is not a bracketed list of ids
    #[error("Ancestor list '{list}' of row {id} is malformed.")]
    MalformedAncestorList {
        /// Id of the offending row
        id: Id,
        /// Raw ancestor list
        list: String,
    },
    /// An ancestor list references an id absent from the table
    #[error("Row {id} references unknown ancestor {ancestor}.")]
    UnknownAncestor {
        /// Id of the offending row
        id: Id,
        /// Id of the missing ancestor
        ancestor: Id,
    },
    /// The `ancestor_id` and `ancestor_list` columns disagree
    #[error("Row {id} has ancestor_id {ancestor_id} but ancestor list '{list}'.")]
    InconsistentAncestorId {
        /// Id of the offending row
        id: Id,
        /// Value of the `ancestor_id` column
        ancestor_id: Id,
        /// Raw ancestor list
        list: String,
    },
}

/// What to do when a table does not comply with the alife data standard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
pub enum ValidationMode {
    /// Fail with [`ConversionError::Validation`]
    Error,
    /// Log a warning and proceed
    #[default]
    Warn,
    /// Proceed silently
    Ignore,
}

impl ValidationMode {
    /// Validates `table` and reacts to failures according to the mode
    pub fn check(self, table: &AlifeTable) -> Result<(), ConversionError> {
        if self == Self::Ignore {
            return Ok(());
        }
        match validate(table) {
            Ok(()) => Ok(()),
            Err(e) if self == Self::Warn => {
                warn!("Table does not comply with the alife data standard: {e}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_ancestors_asexual(table: &AlifeTable, ids: &HashSet<Id>) -> Result<(), ValidationError> {
    for record in table {
        let ancestors = parse_ancestor_list(&record.ancestor_list).map_err(|_| {
            ValidationError::MalformedAncestorList {
                id: record.id,
                list: record.ancestor_list.clone(),
            }
        })?;
        let expected = make_ancestor_id(record.id, &ancestors).map_err(|_| {
            ValidationError::MalformedAncestorList {
                id: record.id,
                list: record.ancestor_list.clone(),
            }
        })?;

        let ancestor_id = record.ancestor_id.unwrap_or(expected);
        if ancestor_id != expected {
            return Err(ValidationError::InconsistentAncestorId {
                id: record.id,
                ancestor_id,
                list: record.ancestor_list.clone(),
            });
        }
        if !ids.contains(&ancestor_id) {
            return Err(ValidationError::UnknownAncestor {
                id: record.id,
                ancestor: ancestor_id,
            });
        }
    }
    Ok(())
}

fn validate_ancestors_sexual(table: &AlifeTable, ids: &HashSet<Id>) -> Result<(), ValidationError> {
    for record in table {
        let ancestors = parse_ancestor_list(&record.ancestor_list).map_err(|_| {
            ValidationError::MalformedAncestorList {
                id: record.id,
                list: record.ancestor_list.clone(),
            }
        })?;
        if let Some(ancestor) = ancestors.into_iter().find(|a| !ids.contains(a)) {
            return Err(ValidationError::UnknownAncestor {
                id: record.id,
                ancestor,
            });
        }
    }
    Ok(())
}

/// Is the phylogeny compliant with the alife data standard?
///
/// Mandatory columns are guaranteed by the [`AlifeTable`] type, so this checks
/// that ids are unique, that ancestor lists are bracketed lists of ids and that
/// every referenced ancestor exists. Tables are checked as sexual as soon as one
/// ancestor list contains a comma.
///
/// # Example
/// ```
/// use alifeconv::alife::{validate, AlifeRecord, AlifeTable, ValidationError};
///
/// let table = AlifeTable::from_records(vec![
///     AlifeRecord::new(0, "[None]"),
///     AlifeRecord::new(1, "[2]"),
/// ]);
/// assert_eq!(
///     validate(&table),
///     Err(ValidationError::UnknownAncestor { id: 1, ancestor: 2 })
/// );
/// ```
pub fn validate(table: &AlifeTable) -> Result<(), ValidationError> {
    let mut ids = HashSet::new();
    for record in table {
        if !ids.insert(record.id) {
            return Err(ValidationError::DuplicateId(record.id));
        }
    }

    if let Some(record) = table
        .iter()
        .find(|r| !(r.ancestor_list.starts_with('[') && r.ancestor_list.ends_with(']')))
    {
        return Err(ValidationError::MalformedAncestorList {
            id: record.id,
            list: record.ancestor_list.clone(),
        });
    }

    if table.is_asexual() {
        validate_ancestors_asexual(table, &ids)
    } else {
        validate_ancestors_sexual(table, &ids)
    }
}

/// Boolean form of [`validate`]
pub fn is_valid(table: &AlifeTable) -> bool {
    validate(table).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alife::AlifeRecord;

    fn table(rows: &[(Id, &str)]) -> AlifeTable {
        rows.iter()
            .map(|(id, list)| AlifeRecord::new(*id, list))
            .collect()
    }

    #[test]
    fn valid_tables() {
        let cases = [
            table(&[]),
            table(&[(0, "[None]"), (1, "[0]"), (2, "[0]"), (3, "[1]")]),
            table(&[(3, "[1]"), (1, "[none]"), (4, "[]")]),
            table(&[(0, "[None]"), (1, "[None]"), (2, "[0,1]")]),
        ];
        for t in cases {
            assert!(is_valid(&t), "{t:?}");
        }
    }

    #[test]
    fn invalid_tables() {
        let cases = [
            (
                table(&[(0, "[None]"), (0, "[0]")]),
                ValidationError::DuplicateId(0),
            ),
            (
                table(&[(0, "none")]),
                ValidationError::MalformedAncestorList {
                    id: 0,
                    list: "none".into(),
                },
            ),
            (
                table(&[(0, "[None]"), (1, "[a]")]),
                ValidationError::MalformedAncestorList {
                    id: 1,
                    list: "[a]".into(),
                },
            ),
            (
                table(&[(0, "[None]"), (1, "[None]"), (2, "[0,5]")]),
                ValidationError::UnknownAncestor { id: 2, ancestor: 5 },
            ),
        ];
        for (t, expected) in cases {
            assert_eq!(validate(&t), Err(expected));
        }
    }

    #[test]
    fn inconsistent_ancestor_id() {
        let mut records = vec![AlifeRecord::new(0, "[None]"), AlifeRecord::new(1, "[0]")];
        records[0].ancestor_id = Some(0);
        records[1].ancestor_id = Some(1);
        let t = AlifeTable::from_records(records);

        assert!(matches!(
            validate(&t),
            Err(ValidationError::InconsistentAncestorId { id: 1, .. })
        ));
    }

    #[test]
    fn validation_modes() {
        let t = table(&[(0, "[None]"), (1, "[7]")]);

        assert!(ValidationMode::Ignore.check(&t).is_ok());
        assert!(ValidationMode::Warn.check(&t).is_ok());
        assert!(matches!(
            ValidationMode::Error.check(&t),
            Err(ConversionError::Validation(_))
        ));
    }
}
