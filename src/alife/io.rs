//! Read and write [`AlifeTable`] as CSV or JSON.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use clap::ValueEnum;
use csv::StringRecord;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{AlifeRecord, AlifeTable, AttrValue, Attributes, Id, EDGE_LENGTH_ALIASES};
use crate::errors::ConversionError;

/// On-disk encodings of an [`AlifeTable`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum TableFormat {
    /// Comma separated values with a header row
    #[default]
    Csv,
    /// A JSON array of records
    Json,
}

impl TableFormat {
    /// Guesses the format from a file extension, defaulting to CSV
    /// ```
    /// use alifeconv::alife::io::TableFormat;
    ///
    /// assert_eq!(TableFormat::from_path("phylo.json"), TableFormat::Json);
    /// assert_eq!(TableFormat::from_path("phylo.csv"), TableFormat::Csv);
    /// assert_eq!(TableFormat::from_path("-"), TableFormat::Csv);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

// Positions of the known columns in a CSV header
struct Columns {
    id: usize,
    ancestor_list: usize,
    ancestor_id: Option<usize>,
    origin_time: Option<usize>,
    edge_lengths: Vec<(usize, String)>,
    label: Option<usize>,
    taxon_label: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ConversionError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let mandatory = |name: &str| {
            find(name).ok_or_else(|| {
                ConversionError::Format(format!("missing mandatory column '{name}'"))
            })
        };

        let id = mandatory("id")?;
        let ancestor_list = mandatory("ancestor_list")?;
        let ancestor_id = find("ancestor_id");
        let origin_time = find("origin_time");
        let taxon_label = find("taxon_label");
        let label = find("label").or_else(|| find("name"));

        let edge_lengths: Vec<_> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| *h == "edge_length" || EDGE_LENGTH_ALIASES.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let known: Vec<usize> = [Some(id), Some(ancestor_list), ancestor_id, origin_time]
            .into_iter()
            .chain([label, taxon_label])
            .flatten()
            .chain(edge_lengths.iter().map(|(i, _)| *i))
            .collect();

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !known.contains(i))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        Ok(Self {
            id,
            ancestor_list,
            ancestor_id,
            origin_time,
            edge_lengths,
            label,
            taxon_label,
            extra,
        })
    }
}

fn cell(record: &StringRecord, column: Option<usize>) -> Option<&str> {
    column
        .and_then(|i| record.get(i))
        .filter(|value| !value.is_empty())
}

fn parse_id(value: &str, column: &str) -> Result<Id, ConversionError> {
    value
        .parse()
        .map_err(|_| ConversionError::Format(format!("invalid {column} '{value}'")))
}

fn parse_float(value: Option<&str>, column: &str) -> Result<Option<f64>, ConversionError> {
    value
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| ConversionError::Format(format!("invalid {column} '{v}'")))
        })
        .transpose()
        .map(|v| v.filter(|f| !f.is_nan()))
}

fn float_cell(value: f64) -> String {
    format!("{value:?}")
}

fn attr_cell(value: &AttrValue) -> String {
    match value {
        AttrValue::Float(v) => float_cell(*v),
        other => other.to_string(),
    }
}

impl AlifeTable {
    /// Reads a table from CSV data with a header row.
    ///
    /// The `id` and `ancestor_list` columns are mandatory. Empty cells are
    /// missing values, `branch_length`, `dist` and `length` are read as
    /// `edge_length` and `name` as `label`. Other columns are kept as
    /// type-inferred extra attributes.
    ///
    /// # Example
    /// ```
    /// use alifeconv::alife::AlifeTable;
    ///
    /// let data = "id,ancestor_list,branch_length\n0,[None],\n1,[0],2.5\n";
    /// let table = AlifeTable::read_csv(data.as_bytes()).unwrap();
    ///
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.records()[1].edge_length, Some(2.5));
    /// ```
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, ConversionError> {
        let mut reader = csv::Reader::from_reader(reader);
        let columns = Columns::from_headers(reader.headers()?)?;

        let mut table = Self::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;

            let id = cell(&record, Some(columns.id))
                .ok_or_else(|| ConversionError::Format(format!("row {row} has no id")))?;
            let id = parse_id(id, "id")?;

            let ancestor_list = cell(&record, Some(columns.ancestor_list)).ok_or_else(|| {
                ConversionError::Format(format!("row {row} has no ancestor_list"))
            })?;

            let ancestor_id = cell(&record, columns.ancestor_id)
                .map(|v| parse_id(v, "ancestor_id"))
                .transpose()?;

            let mut edge_length: Option<(f64, &str)> = None;
            for (i, name) in columns.edge_lengths.iter() {
                let Some(value) = parse_float(cell(&record, Some(*i)), name)? else {
                    continue;
                };
                match edge_length {
                    Some((previous, other)) if previous != value => {
                        return Err(ConversionError::Format(format!(
                            "columns '{other}' and '{name}' disagree on the edge length of row {id}"
                        )));
                    }
                    _ => edge_length = Some((value, name.as_str())),
                }
            }

            let extra: Attributes = columns
                .extra
                .iter()
                .filter_map(|(i, name)| {
                    cell(&record, Some(*i)).map(|v| (name.clone(), AttrValue::from_cell(v)))
                })
                .collect();

            table.push(AlifeRecord {
                id,
                ancestor_list: ancestor_list.to_string(),
                ancestor_id,
                origin_time: parse_float(cell(&record, columns.origin_time), "origin_time")?,
                edge_length: edge_length.map(|(v, _)| v),
                label: cell(&record, columns.label).map(String::from),
                taxon_label: cell(&record, columns.taxon_label).map(String::from),
                extra,
            });
        }

        debug!("Read {} rows from CSV", table.len());
        Ok(table)
    }

    /// Writes the table as CSV.
    ///
    /// `id` and `ancestor_list` are always written, other standard columns only
    /// when at least one row has a value. Extra columns follow in name order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ConversionError> {
        let mut writer = csv::Writer::from_writer(writer);

        let has_ancestor_id = self.iter().any(|r| r.ancestor_id.is_some());
        let has_origin_time = self.iter().any(|r| r.origin_time.is_some());
        let has_edge_length = self.iter().any(|r| r.edge_length.is_some());
        let has_label = self.iter().any(|r| r.label.is_some());
        let has_taxon_label = self.iter().any(|r| r.taxon_label.is_some());
        let extra = self.extra_columns();

        let mut header = vec!["id", "ancestor_list"];
        for (present, name) in [
            (has_ancestor_id, "ancestor_id"),
            (has_origin_time, "origin_time"),
            (has_edge_length, "edge_length"),
            (has_label, "label"),
            (has_taxon_label, "taxon_label"),
        ] {
            if present {
                header.push(name);
            }
        }
        header.extend(extra.iter().map(String::as_str));
        writer.write_record(&header)?;

        for record in self.iter() {
            let mut row = vec![record.id.to_string(), record.ancestor_list.clone()];
            if has_ancestor_id {
                row.push(record.ancestor_id.map(|v| v.to_string()).unwrap_or_default());
            }
            if has_origin_time {
                row.push(record.origin_time.map(float_cell).unwrap_or_default());
            }
            if has_edge_length {
                row.push(record.edge_length.map(float_cell).unwrap_or_default());
            }
            if has_label {
                row.push(record.label.clone().unwrap_or_default());
            }
            if has_taxon_label {
                row.push(record.taxon_label.clone().unwrap_or_default());
            }
            for name in extra.iter() {
                row.push(record.extra.get(name).map(attr_cell).unwrap_or_default());
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Reads a table from a JSON array of records
    /// ```
    /// use alifeconv::alife::AlifeTable;
    ///
    /// let data = r#"[{"id": 0, "ancestor_list": "[None]", "name": "root"}]"#;
    /// let table = AlifeTable::read_json(data.as_bytes()).unwrap();
    /// assert_eq!(table.records()[0].label.as_deref(), Some("root"));
    /// ```
    pub fn read_json<R: Read>(reader: R) -> Result<Self, ConversionError> {
        let records: Vec<AlifeRecord> = serde_json::from_reader(reader)?;
        debug!("Read {} rows from JSON", records.len());
        Ok(Self::from_records(records))
    }

    /// Writes the table as a pretty-printed JSON array of records
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), ConversionError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads a table in the given format
    pub fn read_from<R: Read>(reader: R, format: TableFormat) -> Result<Self, ConversionError> {
        match format {
            TableFormat::Csv => Self::read_csv(reader),
            TableFormat::Json => Self::read_json(reader),
        }
    }

    /// Writes the table in the given format
    pub fn write_to<W: Write>(&self, writer: W, format: TableFormat) -> Result<(), ConversionError> {
        match format {
            TableFormat::Csv => self.write_csv(writer),
            TableFormat::Json => self.write_json(writer),
        }
    }

    /// Loads a table from a file, guessing the format from its extension
    pub fn from_file(path: &Path) -> Result<Self, ConversionError> {
        let file = File::open(path)?;
        Self::read_from(file, TableFormat::from_path(path))
    }

    /// Writes the table to a file, guessing the format from its extension
    pub fn to_file(&self, path: &Path) -> Result<(), ConversionError> {
        let file = File::create(path)?;
        self.write_to(file, TableFormat::from_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_csv_columns() {
        let data = "\
id,ancestor_list,origin_time,dist,name,taxon_label,num_orgs,flag
0,[None],0.0,,root,,3,true
1,[0],1.5,1.5,,t1,,
2,[0],nan,,,,1,false
";
        let table = AlifeTable::read_csv(data.as_bytes()).unwrap();
        let records = table.records();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].label.as_deref(), Some("root"));
        assert_eq!(records[0].extra.get("num_orgs"), Some(&AttrValue::Int(3)));
        assert_eq!(records[0].extra.get("flag"), Some(&AttrValue::Bool(true)));
        assert_eq!(records[1].edge_length, Some(1.5));
        assert_eq!(records[1].taxon_label.as_deref(), Some("t1"));
        assert!(records[1].extra.is_empty());
        assert!(records[2].origin_time.is_none());
    }

    #[test]
    fn missing_mandatory_columns() {
        for data in ["id,origin_time\n0,1\n", "ancestor_list\n[None]\n"] {
            assert!(matches!(
                AlifeTable::read_csv(data.as_bytes()),
                Err(ConversionError::Format(_))
            ));
        }
    }

    #[test]
    fn conflicting_edge_length_aliases() {
        let agree = "id,ancestor_list,edge_length,branch_length\n0,[None],1.0,1\n";
        let table = AlifeTable::read_csv(agree.as_bytes()).unwrap();
        assert_eq!(table.records()[0].edge_length, Some(1.0));

        let partial = "id,ancestor_list,edge_length,branch_length\n0,[None],,2\n";
        let table = AlifeTable::read_csv(partial.as_bytes()).unwrap();
        assert_eq!(table.records()[0].edge_length, Some(2.0));

        let disagree = "id,ancestor_list,edge_length,branch_length\n0,[None],1.0,2.0\n";
        assert!(matches!(
            AlifeTable::read_csv(disagree.as_bytes()),
            Err(ConversionError::Format(_))
        ));
    }

    #[test]
    fn csv_round_trip() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]")
                .with_origin_time(0.0)
                .with_attr("fitness", AttrValue::Float(2.0)),
            AlifeRecord::new(1, "[0]")
                .with_origin_time(3.0)
                .with_edge_length(3.0)
                .with_label("a, b"),
        ]);

        let mut buffer = vec![];
        table.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("id,ancestor_list,origin_time,edge_length,label,fitness\n"));
        assert!(!text.contains("taxon_label"));

        let read = AlifeTable::read_csv(buffer.as_slice()).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn json_round_trip() {
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]").with_attr("note", AttrValue::Text("x".into())),
            AlifeRecord::new(1, "[0]").with_edge_length(0.5),
        ]);

        let mut buffer = vec![];
        table.write_json(&mut buffer).unwrap();
        let read = AlifeTable::read_json(buffer.as_slice()).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = AlifeTable::from_records(vec![
            AlifeRecord::new(0, "[None]"),
            AlifeRecord::new(1, "[0]").with_taxon_label("A"),
        ]);

        for name in ["phylo.csv", "phylo.json"] {
            let path = dir.path().join(name);
            table.to_file(&path).unwrap();
            assert_eq!(AlifeTable::from_file(&path).unwrap(), table);
        }
    }
}
