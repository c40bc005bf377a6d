#![warn(missing_docs)]
//! Convert phylogenies between the alife data standard and phylogenetic tree
//! representations.
//!
//! The alife data standard stores a phylogeny as a table with one row per
//! organism and an `ancestor_list` column linking each organism to its
//! parents. This crate rebuilds trees from such tables and flattens trees
//! back into tables:
//!  - [`alife`] holds the table types, ancestor list parsing, CSV/JSON I/O
//!    and validation.
//!  - [`forest`] rebuilds a forest from a table and flattens any tree back
//!    into one, reconciling edge lengths and origin times.
//!  - [`tree`], [`clade`], [`linked`], [`adjacency`], `graph` and
//!    `systematics` are the supported tree representations.
//!  - [`schema`] reads and writes Newick, Nexus and NeXML documents.
//!  - [`rosetta`] converts between all of the above and caches the results.
//!
//! ```
//! use alifeconv::alife::AlifeTable;
//! use alifeconv::rosetta::Rosetta;
//! use alifeconv::schema::Schema;
//!
//! let csv = "id,ancestor_list,origin_time,taxon_label
//! 0,[None],0,
//! 1,[0],2,A
//! 2,[0],3,B
//! ";
//! let table = AlifeTable::read_csv(csv.as_bytes()).unwrap();
//! let rosetta = Rosetta::new(table).unwrap();
//!
//! let newick = rosetta.to_schema(Schema::Newick).unwrap().unwrap();
//! assert_eq!(newick, "(A:2,B:3):0;\n");
//! ```

pub mod adjacency;
pub mod alife;
pub mod clade;
pub mod errors;
pub mod forest;
#[cfg(feature = "graph")]
pub mod graph;
pub mod linked;
pub mod rosetta;
pub mod schema;
#[cfg(feature = "systematics")]
pub mod systematics;
pub mod tree;
