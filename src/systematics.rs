//! Taxon bookkeeping in the manner of phylotrack's `Systematics` manager.
//!
//! A [`Systematics`] object records every taxon that ever existed, with its
//! ancestor, its origin and destruction times and its organism counts. It is
//! persisted through CSV snapshots with [`Systematics::snapshot`] and
//! [`Systematics::load_from_file`], and alife tables are converted through a
//! temporary snapshot file.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::File;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::alife::{make_ancestor_list, parse_ancestor_list, AlifeTable, Id};
use crate::errors::ConversionError;

// Ancestor list written for taxa without ancestor
const SNAPSHOT_NO_ANCESTOR: &str = "[\"NONE\"]";

const SNAPSHOT_COLUMNS: [&str; 9] = [
    "id",
    "ancestor_list",
    "origin_time",
    "destruction_time",
    "num_orgs",
    "tot_orgs",
    "num_offspring",
    "total_offspring",
    "depth",
];

/// One taxon of a [`Systematics`] manager
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxon {
    /// Id of the taxon
    pub id: Id,
    /// Id of the ancestor taxon
    pub parent: Option<Id>,
    /// Time at which the taxon arose
    pub origin_time: Option<f64>,
    /// Time at which the last organism of the taxon died
    pub destruction_time: Option<f64>,
    /// Number of living organisms
    pub num_orgs: u64,
    /// Number of organisms that ever lived
    pub tot_orgs: u64,
    /// Number of immediate descendant taxa
    pub num_offspring: usize,
    /// Number of descendant taxa
    pub total_offspring: usize,
    /// Number of ancestors up to the root
    pub depth: usize,
}

impl Taxon {
    /// Checks if the taxon still has living organisms
    pub fn is_active(&self) -> bool {
        self.destruction_time.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    id: Id,
    ancestor_list: String,
    #[serde(default)]
    origin_time: Option<f64>,
    #[serde(default)]
    destruction_time: Option<f64>,
    #[serde(default)]
    num_orgs: Option<u64>,
    #[serde(default)]
    tot_orgs: Option<u64>,
    #[serde(default)]
    num_offspring: Option<usize>,
    #[serde(default)]
    total_offspring: Option<usize>,
    #[serde(default)]
    depth: Option<usize>,
}

/// A collection of taxa indexed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Systematics {
    taxa: BTreeMap<Id, Taxon>,
}

impl Systematics {
    /// Creates an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new taxon and returns its id
    /// ```
    /// use alifeconv::systematics::Systematics;
    ///
    /// let mut sys = Systematics::new();
    /// let root = sys.add_taxon(None, Some(0.0)).unwrap();
    /// let child = sys.add_taxon(Some(root), Some(1.0)).unwrap();
    ///
    /// assert_eq!(sys.get(root).unwrap().num_offspring, 1);
    /// assert_eq!(sys.get(child).unwrap().depth, 1);
    /// ```
    pub fn add_taxon(&mut self, parent: Option<Id>, origin_time: Option<f64>) -> Result<Id, ConversionError> {
        let id = self.taxa.keys().next_back().map_or(0, |last| last + 1);
        let depth = match parent {
            Some(p) => {
                let parent = self.taxa.get(&p).ok_or_else(|| {
                    ConversionError::InvariantViolation(format!("unknown ancestor taxon {p}"))
                })?;
                parent.depth + 1
            }
            None => 0,
        };

        self.taxa.insert(
            id,
            Taxon {
                id,
                parent,
                origin_time,
                num_orgs: 1,
                tot_orgs: 1,
                depth,
                ..Default::default()
            },
        );
        self.update_offspring_counts();

        Ok(id)
    }

    /// Marks a taxon as extinct at a given time
    pub fn destroy_taxon(&mut self, id: Id, time: f64) -> Result<(), ConversionError> {
        let taxon = self
            .taxa
            .get_mut(&id)
            .ok_or_else(|| ConversionError::InvariantViolation(format!("unknown taxon {id}")))?;
        taxon.destruction_time = Some(time);
        taxon.num_orgs = 0;
        Ok(())
    }

    /// Gets a taxon by id
    pub fn get(&self, id: Id) -> Option<&Taxon> {
        self.taxa.get(&id)
    }

    /// Iterates over taxa in id order
    pub fn taxa(&self) -> impl Iterator<Item = &Taxon> {
        self.taxa.values()
    }

    /// Number of taxa that ever existed
    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    /// Checks if no taxon was ever recorded
    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    /// Number of taxa with living organisms
    pub fn num_active(&self) -> usize {
        self.taxa.values().filter(|t| t.is_active()).count()
    }

    /// Ids of the taxa without ancestor
    pub fn roots(&self) -> Vec<Id> {
        self.taxa
            .values()
            .filter(|t| t.parent.is_none())
            .map(|t| t.id)
            .collect()
    }

    // Recomputes the offspring counts and depths of every taxon
    fn update_offspring_counts(&mut self) {
        let mut children: HashMap<Id, Vec<Id>> = HashMap::new();
        for taxon in self.taxa.values() {
            if let Some(parent) = taxon.parent {
                children.entry(parent).or_default().push(taxon.id);
            }
        }

        let mut order = vec![];
        let mut queue: VecDeque<(Id, usize)> = self.roots().into_iter().map(|r| (r, 0)).collect();
        while let Some((id, depth)) = queue.pop_front() {
            order.push(id);
            if let Some(taxon) = self.taxa.get_mut(&id) {
                taxon.depth = depth;
                taxon.num_offspring = children.get(&id).map_or(0, Vec::len);
                taxon.total_offspring = 0;
            }
            queue.extend(children.get(&id).into_iter().flatten().map(|c| (*c, depth + 1)));
        }

        for id in order.into_iter().rev() {
            let Some((parent, total)) = self
                .taxa
                .get(&id)
                .and_then(|t| t.parent.map(|p| (p, t.total_offspring)))
            else {
                continue;
            };
            if let Some(parent) = self.taxa.get_mut(&parent) {
                parent.total_offspring += total + 1;
            }
        }
    }

    /// Loads the taxa of a CSV file with `id` and `ancestor_list` columns,
    /// replacing the current ones.
    ///
    /// Origin and destruction times and organism counts are read when the
    /// file has them. Otherwise taxa without descendants are assumed to be
    /// alive with a single organism. Offspring counts and depths are always
    /// recomputed.
    ///
    /// # Errors
    /// - [`ConversionError::Format`] for unreadable files or ancestor lists
    /// - [`ConversionError::UnsupportedTopology`] for taxa with several ancestors
    /// - [`ConversionError::InvariantViolation`] for duplicate ids, unknown
    ///   ancestors and cycles
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), ConversionError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut taxa = BTreeMap::new();

        for row in reader.deserialize() {
            let row: SnapshotRow = row?;
            let parent = match parse_ancestor_list(&row.ancestor_list)?.as_slice() {
                [] => None,
                [parent] => Some(*parent),
                parents => {
                    return Err(ConversionError::UnsupportedTopology {
                        id: row.id,
                        n_parents: parents.len(),
                    })
                }
            };
            let taxon = Taxon {
                id: row.id,
                parent,
                origin_time: row.origin_time.filter(|t| !t.is_nan()),
                destruction_time: row.destruction_time.filter(|t| !t.is_nan()),
                num_orgs: row.num_orgs.unwrap_or_default(),
                tot_orgs: row.tot_orgs.or(row.num_orgs).unwrap_or_default(),
                ..Default::default()
            };
            if taxa.insert(row.id, taxon).is_some() {
                return Err(ConversionError::InvariantViolation(format!(
                    "taxon {} appears several times",
                    row.id
                )));
            }
        }

        if let Some(taxon) = taxa
            .values()
            .find(|t| t.parent.is_some_and(|p| !taxa.contains_key(&p)))
        {
            return Err(ConversionError::InvariantViolation(format!(
                "taxon {} has an unknown ancestor",
                taxon.id
            )));
        }

        self.taxa = taxa;
        self.update_offspring_counts();

        let reachable: usize = self
            .taxa
            .values()
            .filter(|t| t.parent.is_none())
            .map(|t| t.total_offspring + 1)
            .sum();
        if reachable != self.taxa.len() {
            self.taxa.clear();
            return Err(ConversionError::InvariantViolation(
                "taxa are part of an ancestry cycle".to_string(),
            ));
        }

        // Assume leaves are extant when no counts are given
        for taxon in self.taxa.values_mut() {
            if taxon.tot_orgs == 0 && taxon.num_offspring == 0 && taxon.is_active() {
                taxon.num_orgs = 1;
                taxon.tot_orgs = 1;
            }
        }

        debug!("Loaded {} taxa from {}", self.taxa.len(), path.display());
        Ok(())
    }

    /// Writes every taxon to a CSV file. Taxa without ancestor get
    /// `["NONE"]` as ancestor list.
    pub fn snapshot(&self, path: &Path) -> Result<(), ConversionError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(SNAPSHOT_COLUMNS)?;
        for taxon in self.taxa.values() {
            writer.serialize(SnapshotRow {
                id: taxon.id,
                ancestor_list: match taxon.parent {
                    Some(parent) => format!("[{parent}]"),
                    None => SNAPSHOT_NO_ANCESTOR.to_string(),
                },
                origin_time: taxon.origin_time,
                destruction_time: taxon.destruction_time,
                num_orgs: Some(taxon.num_orgs),
                tot_orgs: Some(taxon.tot_orgs),
                num_offspring: Some(taxon.num_offspring),
                total_offspring: Some(taxon.total_offspring),
                depth: Some(taxon.depth),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Conversions between [`Systematics`] and alife tables, through a
/// temporary snapshot file.
impl Systematics {
    /// Loads the taxa of an asexual alife table.
    ///
    /// Edge lengths, labels and extra columns are not kept.
    /// ```
    /// use alifeconv::alife::{AlifeRecord, AlifeTable};
    /// use alifeconv::systematics::Systematics;
    ///
    /// let table = AlifeTable::from_records(vec![
    ///     AlifeRecord::new(0, "[None]").with_origin_time(0.0),
    ///     AlifeRecord::new(1, "[0]").with_origin_time(5.0),
    ///     AlifeRecord::new(2, "[0]"),
    /// ]);
    /// let sys = Systematics::from_alife(&table).unwrap();
    ///
    /// assert_eq!(sys.len(), 3);
    /// assert_eq!(sys.get(0).unwrap().total_offspring, 2);
    /// assert_eq!(sys.get(1).unwrap().origin_time, Some(5.0));
    /// ```
    pub fn from_alife(table: &AlifeTable) -> Result<Self, ConversionError> {
        let file = NamedTempFile::new()?;
        table.write_csv(file.as_file())?;

        let mut systematics = Self::new();
        systematics.load_from_file(file.path())?;
        Ok(systematics)
    }

    /// Flattens the taxa into an alife table, in id order.
    ///
    /// Destruction times, organism counts, offspring counts and depths
    /// become extra columns.
    pub fn to_alife(&self) -> Result<AlifeTable, ConversionError> {
        let file = NamedTempFile::new()?;
        self.snapshot(file.path())?;

        let table = AlifeTable::read_csv(File::open(file.path())?)?;
        Ok(table
            .into_records()
            .into_iter()
            .map(|mut record| {
                if record.ancestor_list == SNAPSHOT_NO_ANCESTOR {
                    record.ancestor_list = make_ancestor_list(None);
                }
                record
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alife::{AlifeRecord, AttrValue};

    fn example_table() -> AlifeTable {
        AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(0.0),
            AlifeRecord::new(1, "[0]").with_origin_time(1.0),
            AlifeRecord::new(2, "[1]").with_origin_time(2.0),
            AlifeRecord::new(3, "[1]").with_origin_time(2.5),
            AlifeRecord::new(4, "[0]").with_origin_time(3.0),
        ])
    }

    #[test]
    fn load_table() {
        let sys = Systematics::from_alife(&example_table()).unwrap();

        assert_eq!(sys.len(), 5);
        assert_eq!(sys.roots(), vec![0]);
        assert_eq!(sys.num_active(), 5);

        let root = sys.get(0).unwrap();
        assert_eq!(root.num_offspring, 2);
        assert_eq!(root.total_offspring, 4);
        assert_eq!(root.num_orgs, 0);

        let leaf = sys.get(3).unwrap();
        assert_eq!(leaf.depth, 2);
        assert_eq!(leaf.num_orgs, 1);
        assert_eq!(leaf.parent, Some(1));
    }

    #[test]
    fn round_trip() {
        let table = Systematics::from_alife(&example_table())
            .unwrap()
            .to_alife()
            .unwrap();

        let rows: Vec<_> = table
            .iter()
            .map(|r| (r.id, r.ancestor_list.as_str(), r.origin_time))
            .collect();
        let expected: Vec<_> = example_table()
            .iter()
            .map(|r| (r.id, r.ancestor_list.clone(), r.origin_time))
            .collect();
        let expected: Vec<_> = expected
            .iter()
            .map(|(id, list, time)| (*id, list.as_str(), *time))
            .collect();
        assert_eq!(rows, expected);
        assert_eq!(table.records()[1].extra.get("depth"), Some(&AttrValue::Int(1)));
        assert_eq!(table.records()[0].extra.get("total_offspring"), Some(&AttrValue::Int(4)));
    }

    #[test]
    fn build_and_snapshot() {
        let mut sys = Systematics::new();
        let root = sys.add_taxon(None, Some(0.0)).unwrap();
        let a = sys.add_taxon(Some(root), Some(1.0)).unwrap();
        let b = sys.add_taxon(Some(a), Some(2.0)).unwrap();
        sys.destroy_taxon(a, 3.0).unwrap();

        assert_eq!(sys.get(root).unwrap().total_offspring, 2);
        assert_eq!(sys.get(b).unwrap().depth, 2);
        assert_eq!(sys.num_active(), 2);
        assert!(sys.add_taxon(Some(42), None).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.csv");
        sys.snapshot(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("id,ancestor_list,origin_time,destruction_time"));
        assert!(text.contains("\"[\"\"NONE\"\"]\""));

        let mut loaded = Systematics::new();
        loaded.load_from_file(&path).unwrap();
        assert_eq!(loaded, sys);
    }

    #[test]
    fn empty_systematics() {
        let sys = Systematics::from_alife(&AlifeTable::new()).unwrap();
        assert!(sys.is_empty());
        assert!(sys.to_alife().unwrap().is_empty());
    }

    #[test]
    fn invalid_tables() {
        let sexual = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[None]"),
            AlifeRecord::new(2, "[0,1]"),
        ]);
        assert!(matches!(
            Systematics::from_alife(&sexual),
            Err(ConversionError::UnsupportedTopology { .. })
        ));

        let cycle = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[2]"),
            AlifeRecord::new(2, "[1]"),
        ]);
        assert!(matches!(
            Systematics::from_alife(&cycle),
            Err(ConversionError::InvariantViolation(_))
        ));

        let unknown = AlifeTable::from_records(vec![AlifeRecord::new(1, "[0]")]);
        assert!(matches!(
            Systematics::from_alife(&unknown),
            Err(ConversionError::InvariantViolation(_))
        ));
    }
}
