//! Text serialization schemas for trees, and the sources they are read from.
//!
//! Every schema is read into and written from [`Tree`] objects. Documents
//! without trees (`;`, a Nexus `TREES` block without `TREE` commands, a NeXML
//! document without nodes) are read as an empty list.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::ConversionError;
use crate::tree::{nexml, nexus, Tree};

/// Text formats trees can be serialized to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// One `;` terminated tree per statement
    Newick,
    /// The `TREES` block of a Nexus document
    Nexus,
    /// Trees of a NeXML document
    Nexml,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Newick => "newick",
            Self::Nexus => "nexus",
            Self::Nexml => "nexml",
        };
        write!(f, "{name}")
    }
}

impl Schema {
    /// Guesses the schema from a file extension
    /// ```
    /// use alifeconv::schema::Schema;
    ///
    /// assert_eq!(Schema::from_path("tree.nwk"), Some(Schema::Newick));
    /// assert_eq!(Schema::from_path("trees.NEX"), Some(Schema::Nexus));
    /// assert_eq!(Schema::from_path("trees.xml"), Some(Schema::Nexml));
    /// assert_eq!(Schema::from_path("phylo.csv"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "nwk" | "newick" | "tree" | "tre" | "treefile" => Some(Self::Newick),
            "nex" | "nexus" | "nxs" => Some(Self::Nexus),
            "xml" | "nexml" => Some(Self::Nexml),
            _ => None,
        }
    }

    /// Parses every tree of a document
    pub fn read_trees(self, text: &str) -> Result<Vec<Tree>, ConversionError> {
        let trees = match self {
            Self::Newick => Tree::from_newick_multi(text)?,
            Self::Nexus => nexus::read_nexus(text)?,
            Self::Nexml => nexml::read_nexml(text)?,
        };
        debug!("Read {} tree(s) from {self} data", trees.len());
        Ok(trees)
    }

    /// Writes trees as a document of this schema. An empty list gives the
    /// schema's empty document.
    ///
    /// # Example
    /// ```
    /// use alifeconv::schema::{Schema, WriteOptions};
    /// use alifeconv::tree::Tree;
    ///
    /// let trees = vec![Tree::from_newick("((A:1)B:2,C:1);").unwrap()];
    /// let options = WriteOptions::default().suppress_unifurcations(true);
    ///
    /// let text = Schema::Newick.write_trees(&trees, &options).unwrap();
    /// assert_eq!(text, "(A:3,C:1);\n");
    /// assert_eq!(Schema::Newick.write_trees(&[], &options).unwrap(), ";\n");
    /// ```
    pub fn write_trees(self, trees: &[Tree], options: &WriteOptions) -> Result<String, ConversionError> {
        let compressed;
        let trees = if options.suppress_unifurcations {
            compressed = trees
                .iter()
                .map(|tree| {
                    let mut tree = tree.clone();
                    tree.compress()?;
                    Ok(tree)
                })
                .collect::<Result<Vec<_>, ConversionError>>()?;
            compressed.as_slice()
        } else {
            trees
        };

        let text = match self {
            Self::Newick if trees.is_empty() => ";\n".to_string(),
            Self::Newick => {
                let newick = trees.iter().map(Tree::to_newick).collect::<Result<Vec<_>, _>>()?;
                newick.iter().join("\n") + "\n"
            }
            Self::Nexus => nexus::write_nexus(trees)?,
            Self::Nexml => nexml::write_nexml(trees)?,
        };
        Ok(text)
    }

    // Rough check that inline text holds data of this schema
    fn looks_like(self, text: &str) -> bool {
        let text = text.trim_start();
        match self {
            Self::Newick => text.trim_end().ends_with(';'),
            Self::Nexus => text.to_ascii_uppercase().starts_with("#NEXUS"),
            Self::Nexml => text.starts_with('<'),
        }
    }
}

/// Options used when serializing trees
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Collapse internal nodes with a single child, summing edge lengths
    pub suppress_unifurcations: bool,
}

impl WriteOptions {
    /// Sets whether unifurcations are collapsed
    pub fn suppress_unifurcations(mut self, suppress: bool) -> Self {
        self.suppress_unifurcations = suppress;
        self
    }
}

/// Where serialized trees are read from.
pub enum TreeSource {
    /// A file
    Path(PathBuf),
    /// Inline data
    Text(String),
    /// Any reader, consumed to the end
    Reader(Box<dyn Read>),
    /// Either a file path or inline data. Existing files win.
    Ambiguous(String),
}

impl fmt::Debug for TreeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Ambiguous(value) => f.debug_tuple("Ambiguous").field(value).finish(),
        }
    }
}

impl From<PathBuf> for TreeSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for TreeSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<String> for TreeSource {
    fn from(value: String) -> Self {
        Self::Ambiguous(value)
    }
}

impl From<&str> for TreeSource {
    fn from(value: &str) -> Self {
        Self::Ambiguous(value.to_string())
    }
}

impl TreeSource {
    /// Reads the whole source into a string.
    ///
    /// Ambiguous values naming an existing file are read from that file,
    /// anything else is taken as inline data, with a warning if it does not
    /// look like `schema` data.
    ///
    /// # Errors
    /// [`ConversionError::UnsupportedFormat`] for URLs, which are not fetched.
    pub fn read_to_string(self, schema: Schema) -> Result<String, ConversionError> {
        match self {
            Self::Path(path) => Ok(fs::read_to_string(path)?),
            Self::Text(text) => Ok(text),
            Self::Reader(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Ok(text)
            }
            Self::Ambiguous(value) => {
                if Path::new(&value).is_file() {
                    debug!("Reading {schema} data from file {value}");
                    return Ok(fs::read_to_string(&value)?);
                }
                if ["http://", "https://", "ftp://"]
                    .iter()
                    .any(|scheme| value.starts_with(scheme))
                {
                    return Err(ConversionError::UnsupportedFormat(format!(
                        "cannot fetch remote source {value}"
                    )));
                }
                if !schema.looks_like(&value) {
                    warn!("'{value}' is not an existing file and does not look like {schema} data");
                }
                Ok(value)
            }
        }
    }

    /// Reads and parses every tree of the source
    /// ```
    /// use alifeconv::schema::{Schema, TreeSource};
    ///
    /// let trees = TreeSource::from("(A,B)C;(D,E)F;").read_trees(Schema::Newick).unwrap();
    /// assert_eq!(trees.len(), 2);
    /// ```
    pub fn read_trees(self, schema: Schema) -> Result<Vec<Tree>, ConversionError> {
        schema.read_trees(&self.read_to_string(schema)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn example_trees() -> Vec<Tree> {
        vec![
            Tree::from_newick("((A:1,B:2)C:0.5,D:3)E;").unwrap(),
            Tree::from_newick("('x y':1,z:2);").unwrap(),
        ]
    }

    #[test]
    fn round_trip_every_schema() {
        let trees = example_trees();
        let options = WriteOptions::default();
        for schema in [Schema::Newick, Schema::Nexus, Schema::Nexml] {
            let text = schema.write_trees(&trees, &options).unwrap();
            let read = schema.read_trees(&text).unwrap();
            assert_eq!(read.len(), 2, "{schema}");
            for (original, copy) in trees.iter().zip(read.iter()) {
                assert_eq!(original.to_newick().unwrap(), copy.to_newick().unwrap(), "{schema}");
            }
        }
    }

    #[test]
    fn empty_documents() {
        let options = WriteOptions::default();
        for schema in [Schema::Newick, Schema::Nexus, Schema::Nexml] {
            let text = schema.write_trees(&[], &options).unwrap();
            assert!(schema.read_trees(&text).unwrap().is_empty(), "{schema}");
        }
        assert!(Schema::Newick.read_trees(";").unwrap().is_empty());
    }

    #[test]
    fn suppress_unifurcations() {
        let trees = vec![Tree::from_newick("(((A:1)B:1)C:1,D:1)E:1;").unwrap()];
        let kept = Schema::Newick
            .write_trees(&trees, &WriteOptions::default())
            .unwrap();
        assert_eq!(kept, "(((A:1)B:1)C:1,D:1)E:1;\n");

        let options = WriteOptions::default().suppress_unifurcations(true);
        let suppressed = Schema::Newick.write_trees(&trees, &options).unwrap();
        assert_eq!(suppressed, "(A:3,D:1)E:1;\n");
    }

    #[test]
    fn ambiguous_sources() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(A,B);").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let trees = TreeSource::Ambiguous(path).read_trees(Schema::Newick).unwrap();
        assert_eq!(trees.len(), 1);

        let trees = TreeSource::from("(C,D);").read_trees(Schema::Newick).unwrap();
        assert_eq!(trees[0].n_leaves(), 2);

        assert!(matches!(
            TreeSource::from("https://example.org/tree.nwk").read_trees(Schema::Newick),
            Err(ConversionError::UnsupportedFormat(_))
        ));
        assert!(TreeSource::from("not a tree").read_trees(Schema::Newick).is_err());
    }

    #[test]
    fn explicit_sources() {
        let reader = Box::new("(A,(B,C));".as_bytes());
        let trees = TreeSource::Reader(reader).read_trees(Schema::Newick).unwrap();
        assert_eq!(trees[0].n_leaves(), 3);

        let text = "#NEXUS\nBEGIN TREES;\n TREE t = (A,B);\nEND;\n".to_string();
        let trees = TreeSource::Text(text).read_trees(Schema::Nexus).unwrap();
        assert_eq!(trees.len(), 1);

        let missing = TreeSource::Path(PathBuf::from("/does/not/exist.nwk"));
        assert!(matches!(
            missing.read_trees(Schema::Newick),
            Err(ConversionError::Io(_))
        ));
    }
}
