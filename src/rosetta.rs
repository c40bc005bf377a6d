//! A phylogeny that can be viewed in every supported representation.
//!
//! [`Rosetta`] stores a phylogeny as an alife table. Every other
//! representation is built from that table on first request and cached, so
//! repeated requests return the same shared value.
//!
//! ```
//! use std::rc::Rc;
//!
//! use alifeconv::alife::{AlifeRecord, AlifeTable};
//! use alifeconv::rosetta::Rosetta;
//! use alifeconv::schema::Schema;
//!
//! let table = AlifeTable::from_records(vec![
//!     AlifeRecord::new(0, "[None]").with_origin_time(0.0),
//!     AlifeRecord::new(1, "[0]").with_origin_time(1.0).with_taxon_label("A"),
//!     AlifeRecord::new(2, "[0]").with_origin_time(3.0).with_taxon_label("B"),
//! ]);
//! let rosetta = Rosetta::new(table).unwrap();
//!
//! let trees = rosetta.as_trees().unwrap();
//! assert!(Rc::ptr_eq(&trees, &rosetta.as_trees().unwrap()));
//! assert_eq!(rosetta.materializations(), 1);
//!
//! let newick = rosetta.to_schema(Schema::Newick).unwrap();
//! assert_eq!(newick.as_deref(), Some("(A:1,B:3):0;\n"));
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::adjacency::Adjacency;
use crate::alife::{AlifeTable, ValidationMode};
use crate::clade::Clade;
use crate::errors::ConversionError;
use crate::forest::{BuildOptions, ExportOptions, Forest};
#[cfg(feature = "graph")]
use crate::graph::PhyloGraph;
use crate::linked::LinkedNode;
use crate::schema::{Schema, TreeSource, WriteOptions};
#[cfg(feature = "systematics")]
use crate::systematics::Systematics;
use crate::tree::Tree;

/// The representations a [`Rosetta`] converts between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Representation {
    /// [`AlifeTable`]
    Alife,
    /// [`Tree`] arenas
    Trees,
    /// Recursive [`Clade`] trees
    Clades,
    /// [`LinkedNode`] trees
    Linked,
    /// Directed graphs
    Graph,
    /// [`Adjacency`] lists
    Adjacency,
    /// Systematics managers
    Systematics,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alife => "alife",
            Self::Trees => "trees",
            Self::Clades => "clades",
            Self::Linked => "linked",
            Self::Graph => "graph",
            Self::Adjacency => "adjacency",
            Self::Systematics => "systematics",
        };
        write!(f, "{name}")
    }
}

impl Representation {
    /// Representations compiled into the crate
    pub fn available() -> Vec<Self> {
        let mut available = vec![
            Self::Alife,
            Self::Trees,
            Self::Clades,
            Self::Linked,
            Self::Adjacency,
        ];
        if cfg!(feature = "graph") {
            available.push(Self::Graph);
        }
        if cfg!(feature = "systematics") {
            available.push(Self::Systematics);
        }
        available
    }
}

/// The set of representations a [`Rosetta`] may convert from and to.
///
/// The default registry holds every representation compiled into the crate.
/// The alife table is always available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry(BTreeSet<Representation>);

impl Default for Registry {
    fn default() -> Self {
        Self(Representation::available().into_iter().collect())
    }
}

impl Registry {
    /// A registry with only the alife table
    pub fn empty() -> Self {
        Self(BTreeSet::from([Representation::Alife]))
    }

    /// Registers a representation
    pub fn with(mut self, representation: Representation) -> Self {
        self.0.insert(representation);
        self
    }

    /// Unregisters a representation
    pub fn without(mut self, representation: Representation) -> Self {
        if representation != Representation::Alife {
            self.0.remove(&representation);
        }
        self
    }

    /// Checks if a representation is registered
    pub fn contains(&self, representation: Representation) -> bool {
        self.0.contains(&representation)
    }

    fn check(&self, representation: Representation) -> Result<(), ConversionError> {
        if self.contains(representation) {
            Ok(())
        } else {
            Err(ConversionError::UnsupportedFormat(format!(
                "representation '{representation}' is not registered"
            )))
        }
    }
}

/// Options of a [`Rosetta`]
#[derive(Debug, Clone, Default)]
pub struct RosettaOptions {
    /// How tables that do not comply with the alife standard are handled
    pub validation: ValidationMode,
    /// Representations that may be used
    pub registry: Registry,
}

impl RosettaOptions {
    /// Sets the validation mode
    pub fn validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Sets the registry
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }
}

/// A phylogeny in any supported representation.
pub enum RosettaInput {
    /// An alife table
    Alife(AlifeTable),
    /// Trees in the arena representation
    Trees(Vec<Tree>),
    /// Recursive clade trees
    Clades(Vec<Clade>),
    /// Roots of linked trees
    Linked(Vec<LinkedNode>),
    /// A directed graph
    #[cfg(feature = "graph")]
    Graph(PhyloGraph),
    /// A systematics manager
    #[cfg(feature = "systematics")]
    Systematics(Systematics),
}

impl RosettaInput {
    /// The representation of the phylogeny
    pub fn representation(&self) -> Representation {
        match self {
            Self::Alife(_) => Representation::Alife,
            Self::Trees(_) => Representation::Trees,
            Self::Clades(_) => Representation::Clades,
            Self::Linked(_) => Representation::Linked,
            #[cfg(feature = "graph")]
            Self::Graph(_) => Representation::Graph,
            #[cfg(feature = "systematics")]
            Self::Systematics(_) => Representation::Systematics,
        }
    }

    /// Identifies the representation of a type-erased phylogeny.
    ///
    /// # Errors
    /// [`ConversionError::UnsupportedFormat`] if the value is of none of the
    /// supported types.
    pub fn from_any(value: Box<dyn Any>) -> Result<Self, ConversionError> {
        fn take<T: 'static>(
            value: Box<dyn Any>,
            wrap: impl FnOnce(T) -> RosettaInput,
        ) -> Result<RosettaInput, Box<dyn Any>> {
            value.downcast::<T>().map(|v| wrap(*v))
        }

        let value = match take(value, Self::Alife)
            .or_else(|v| take(v, Self::Trees))
            .or_else(|v| take(v, |tree: Tree| Self::Trees(vec![tree])))
            .or_else(|v| take(v, Self::Clades))
            .or_else(|v| take(v, |clade: Clade| Self::Clades(vec![clade])))
            .or_else(|v| take(v, Self::Linked))
            .or_else(|v| take(v, |node: LinkedNode| Self::Linked(vec![node])))
        {
            Ok(input) => return Ok(input),
            Err(value) => value,
        };
        #[cfg(feature = "graph")]
        let value = match take(value, Self::Graph) {
            Ok(input) => return Ok(input),
            Err(value) => value,
        };
        #[cfg(feature = "systematics")]
        let value = match take(value, Self::Systematics) {
            Ok(input) => return Ok(input),
            Err(value) => value,
        };

        Err(ConversionError::UnsupportedFormat(format!(
            "no conversion for values of {:?}",
            (*value).type_id()
        )))
    }

    fn into_table(self) -> Result<AlifeTable, ConversionError> {
        let options = ExportOptions::default();
        match self {
            Self::Alife(table) => Ok(table),
            Self::Trees(trees) => Forest::from_traversal(&trees)?.to_table(&options),
            Self::Clades(clades) => Forest::from_traversal(&clades)?.to_table(&options),
            Self::Linked(roots) => Forest::from_traversal(&roots)?.to_table(&options),
            #[cfg(feature = "graph")]
            Self::Graph(graph) => graph.to_alife(&options),
            #[cfg(feature = "systematics")]
            Self::Systematics(systematics) => systematics.to_alife(),
        }
    }
}

impl From<AlifeTable> for RosettaInput {
    fn from(table: AlifeTable) -> Self {
        Self::Alife(table)
    }
}

impl From<Tree> for RosettaInput {
    fn from(tree: Tree) -> Self {
        Self::Trees(vec![tree])
    }
}

impl From<Vec<Tree>> for RosettaInput {
    fn from(trees: Vec<Tree>) -> Self {
        Self::Trees(trees)
    }
}

impl From<Clade> for RosettaInput {
    fn from(clade: Clade) -> Self {
        Self::Clades(vec![clade])
    }
}

impl From<Vec<Clade>> for RosettaInput {
    fn from(clades: Vec<Clade>) -> Self {
        Self::Clades(clades)
    }
}

impl From<LinkedNode> for RosettaInput {
    fn from(root: LinkedNode) -> Self {
        Self::Linked(vec![root])
    }
}

impl From<Vec<LinkedNode>> for RosettaInput {
    fn from(roots: Vec<LinkedNode>) -> Self {
        Self::Linked(roots)
    }
}

#[cfg(feature = "graph")]
impl From<PhyloGraph> for RosettaInput {
    fn from(graph: PhyloGraph) -> Self {
        Self::Graph(graph)
    }
}

#[cfg(feature = "systematics")]
impl From<Systematics> for RosettaInput {
    fn from(systematics: Systematics) -> Self {
        Self::Systematics(systematics)
    }
}

/// Converts a phylogeny between representations, caching every
/// representation it builds.
///
/// The alife table is fixed at construction. Other representations are
/// built from it with edge lengths derived from origin times.
pub struct Rosetta {
    table: Rc<AlifeTable>,
    options: RosettaOptions,
    cache: RefCell<HashMap<Representation, Rc<dyn Any>>>,
    materializations: Cell<usize>,
}

impl fmt::Debug for Rosetta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rosetta")
            .field("table", &self.table)
            .field("options", &self.options)
            .field("cached", &self.cache.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Rosetta {
    /// Creates a converter with default options
    pub fn new(input: impl Into<RosettaInput>) -> Result<Self, ConversionError> {
        Self::with_options(input, RosettaOptions::default())
    }

    /// Flattens the input into an alife table and validates it.
    ///
    /// # Errors
    /// - [`ConversionError::UnsupportedFormat`] if the input representation
    ///   is not registered
    /// - [`ConversionError::Validation`] if the table is invalid and
    ///   validation is set to [`ValidationMode::Error`]
    /// - any error raised while flattening the input
    pub fn with_options(
        input: impl Into<RosettaInput>,
        options: RosettaOptions,
    ) -> Result<Self, ConversionError> {
        let input = input.into();
        let representation = input.representation();
        options.registry.check(representation)?;

        let table = input.into_table()?;
        debug!("Stored {representation} input as a table of {} rows", table.len());
        options.validation.check(&table)?;

        Ok(Self {
            table: Rc::new(table),
            options,
            cache: RefCell::new(HashMap::new()),
            materializations: Cell::new(0),
        })
    }

    /// Creates a converter from a value of any supported type.
    /// ```
    /// use alifeconv::errors::ConversionError;
    /// use alifeconv::rosetta::{Rosetta, RosettaOptions};
    /// use alifeconv::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A,B);").unwrap();
    /// let rosetta = Rosetta::from_any(Box::new(tree), RosettaOptions::default()).unwrap();
    /// assert_eq!(rosetta.as_alife().len(), 3);
    ///
    /// let unknown = Rosetta::from_any(Box::new(42), RosettaOptions::default());
    /// assert!(matches!(unknown, Err(ConversionError::UnsupportedFormat(_))));
    /// ```
    pub fn from_any(value: Box<dyn Any>, options: RosettaOptions) -> Result<Self, ConversionError> {
        Self::with_options(RosettaInput::from_any(value)?, options)
    }

    /// Reads trees from a serialized source.
    pub fn from_schema(
        source: TreeSource,
        schema: Schema,
        options: RosettaOptions,
    ) -> Result<Self, ConversionError> {
        let trees = source.read_trees(schema)?;
        Self::with_options(trees, options)
    }

    /// Options of the converter
    pub fn options(&self) -> &RosettaOptions {
        &self.options
    }

    /// Number of representations built so far
    pub fn materializations(&self) -> usize {
        self.materializations.get()
    }

    fn cached<T: 'static>(
        &self,
        representation: Representation,
        build: impl FnOnce(&AlifeTable) -> Result<T, ConversionError>,
    ) -> Result<Rc<T>, ConversionError> {
        self.options.registry.check(representation)?;

        if let Some(value) = self.cache.borrow().get(&representation) {
            return Rc::clone(value).downcast::<T>().map_err(|_| {
                ConversionError::InvariantViolation(format!(
                    "cached {representation} value has an unexpected type"
                ))
            });
        }

        let value = Rc::new(build(&self.table)?);
        self.materializations.set(self.materializations.get() + 1);
        debug!("Built {representation} representation");
        self.cache
            .borrow_mut()
            .insert(representation, Rc::clone(&value) as Rc<dyn Any>);

        Ok(value)
    }

    fn build_options() -> BuildOptions {
        BuildOptions::default().setup_edge_lengths(true)
    }

    /// The phylogeny as an alife table
    pub fn as_alife(&self) -> Rc<AlifeTable> {
        Rc::clone(&self.table)
    }

    /// The phylogeny as [`Tree`] arenas, one per independent clade
    pub fn as_trees(&self) -> Result<Rc<Vec<Tree>>, ConversionError> {
        self.cached(Representation::Trees, |table| {
            Tree::forest_from_alife(table, &Self::build_options())
        })
    }

    /// The phylogeny as recursive [`Clade`] trees
    pub fn as_clades(&self) -> Result<Rc<Vec<Clade>>, ConversionError> {
        self.cached(Representation::Clades, |table| {
            Clade::forest_from_alife(table, &Self::build_options())
        })
    }

    /// The roots of the phylogeny as [`LinkedNode`] trees
    pub fn as_linked(&self) -> Result<Rc<Vec<LinkedNode>>, ConversionError> {
        self.cached(Representation::Linked, |table| {
            LinkedNode::forest_from_alife(table, &Self::build_options())
        })
    }

    /// The phylogeny as a directed graph. Sexual phylogenies are supported.
    #[cfg(feature = "graph")]
    pub fn as_graph(&self) -> Result<Rc<PhyloGraph>, ConversionError> {
        self.cached(Representation::Graph, |table| PhyloGraph::from_alife(table, true))
    }

    /// The ancestors of every organism
    pub fn as_adjacency(&self) -> Result<Rc<Adjacency>, ConversionError> {
        self.cached(Representation::Adjacency, Adjacency::from_table)
    }

    /// The phylogeny as a systematics manager
    #[cfg(feature = "systematics")]
    pub fn as_systematics(&self) -> Result<Rc<Systematics>, ConversionError> {
        self.cached(Representation::Systematics, Systematics::from_alife)
    }

    /// Serializes the phylogeny, or returns `None` if it is empty
    pub fn to_schema(&self, schema: Schema) -> Result<Option<String>, ConversionError> {
        self.to_schema_with(schema, &WriteOptions::default())
    }

    /// Serializes the phylogeny with explicit write options
    pub fn to_schema_with(
        &self,
        schema: Schema,
        options: &WriteOptions,
    ) -> Result<Option<String>, ConversionError> {
        if self.table.is_empty() {
            return Ok(None);
        }
        let trees = self.as_trees()?;
        schema.write_trees(&trees, options).map(Some)
    }

    /// Writes the serialized phylogeny to a destination.
    ///
    /// # Errors
    /// [`ConversionError::EmptyTree`] if the phylogeny is empty.
    pub fn write_schema(
        &self,
        schema: Schema,
        writer: &mut dyn Write,
        options: &WriteOptions,
    ) -> Result<(), ConversionError> {
        let text = self
            .to_schema_with(schema, options)?
            .ok_or(ConversionError::EmptyTree)?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }
}
