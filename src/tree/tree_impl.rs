use std::collections::HashMap;
use std::{fs, path::Path};

use thiserror::Error;

use super::node::{Node, NodeError};
use super::{EdgeLength, NewickFormat, NodeId};

/// Errors that can occur when reading, writing and manipulating [`Tree`] structs.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The tree is empty and we are trying to do something that require at least one node
    #[error("This tree is empty.")]
    IsEmpty,
    /// No root node was found in the tree and we are trying to do something
    /// that requires a root node
    #[error("No root node found")]
    RootNotFound,
    /// The requested node with index [`NodeId`] does not exist in the tree
    #[error("There is no node with index: {0}")]
    NodeNotFound(NodeId),
    /// The node with index [`NodeId`] could not be compressed
    #[error("Could not compress node {0}, it does not have exactly one parent and one child")]
    CouldNotCompressNode(NodeId),
    /// There was a [`std::io::Error`] when writin the tree to a file
    #[error("Error writing tree to file")]
    IoError(#[from] std::io::Error),
    /// There was a [`NodeError`] when operating on a node
    #[error("Could operate on Node")]
    NodeError(#[from] NodeError),
}

/// Errors that can occur when parsing newick files.
#[derive(Error, Debug)]
pub enum NewickParseError {
    /// There is whitespace in one of the branch lengths
    #[error("Cannot have whitespace in number field.")]
    WhiteSpaceInNumber,
    /// There is an unclosed bracket in the newick String
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// There is an unclosed quoted label in the newick String
    #[error("Missing a closing quote.")]
    UnclosedQuote,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missin a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtre but have no parent node.
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// There was a [`TreeError`] when building a tree fromthe newick string
    #[error("Problem with building the tree.")]
    TreeError(#[from] TreeError),
    /// There was a [`std::num::ParseFloatError`] when parsing branch lengths
    #[error("Could not parse a branch length")]
    FloatError(#[from] std::num::ParseFloatError),
    /// There was a [`std::io::Error`] when reading a newick file
    #[error("Problem reading file")]
    IoError(#[from] std::io::Error),
}

/// A Phylogenetic tree
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

/// Base methods to add and get [`Node`] objects to and from the [`Tree`].
///
/// ----
/// ----
impl Tree {
    /// Create a new empty Tree object
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    // ############################
    // # ADDING AND GETTING NODES #
    // ############################

    /// Add a new node to the tree.
    pub fn add(&mut self, node: Node) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        self.nodes.push(node);

        idx
    }

    /// Add a child to one of the tree's nodes.
    ///
    /// # Example
    /// ```
    /// use alifeconv::tree::{Tree,Node};
    ///
    /// // Create the tree and add a root node
    /// let mut tree = Tree::new();
    /// let root_id = tree.add(Node::new());
    ///
    /// // Add children to the root
    /// let left = tree.add_child(Node::new(), root_id, None).unwrap();
    /// let right = tree.add_child(Node::new(), root_id, Some(0.1)).unwrap();
    ///
    /// assert_eq!(tree.get(&root_id).unwrap().children.len(), 2);
    ///
    /// // The depths of child nodes are derived from the parent node
    /// assert_eq!(tree.get(&left).unwrap().get_depth(), 1);
    /// assert_eq!(tree.get(&right).unwrap().get_depth(), 1);
    ///
    /// assert_eq!(tree.get(&right).unwrap().parent_edge, Some(0.1));
    /// ```
    pub fn add_child(
        &mut self,
        node: Node,
        parent: NodeId,
        edge: Option<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        let id = self.add(node);
        self.attach(parent, id, edge)?;

        Ok(id)
    }

    /// Links an existing detached node to a parent node
    pub(crate) fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        edge: Option<EdgeLength>,
    ) -> Result<(), TreeError> {
        let depth = self.get(&parent)?.depth + 1;

        let node = self.get_mut(&child)?;
        node.set_parent(parent, edge);
        node.set_depth(depth);
        self.get_mut(&parent)?.add_child(child);

        Ok(())
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&Node, TreeError> {
        match self.nodes.get(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node, TreeError> {
        match self.nodes.get_mut(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a reference to a node in the tree by name (taxon label or label).
    /// Note that this does not check for name unicity, if several nodes
    /// match a name this funciton will return the first match in the tree.
    /// ```
    /// use alifeconv::tree::{Tree, Node};
    ///
    /// let mut tree = Tree::new();
    /// let root_idx = tree.add(Node::new_labeled("root"));
    /// let child_idx = tree.add_child(Node::new_named("child"), root_idx, None).unwrap();
    ///
    /// assert_eq!(tree.get_by_name("child"), Some(tree.get(&child_idx).unwrap()));
    /// assert_eq!(tree.get_by_name("root"), Some(tree.get(&root_idx).unwrap()));
    /// ```
    pub fn get_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| !node.deleted && node.name() == Some(name))
    }

    /// Search nodes in the tree with a closure.
    pub fn search_nodes(&self, cond: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| !node.deleted && cond(node))
            .map(|node| node.id)
            .collect()
    }

    /// Gets the root node.
    pub fn get_root(&self) -> Result<NodeId, TreeError> {
        self.nodes
            .iter()
            .filter(|&node| !node.deleted && node.parent.is_none())
            .map(|node| node.id)
            .next()
            .ok_or(TreeError::RootNotFound)
    }

    /// Returns a [`Vec`] containing the Node IDs of leaf nodes of the tree
    /// ```
    /// use alifeconv::tree::{Tree, Node};
    ///
    /// let mut tree = Tree::new();
    /// let root_idx = tree.add(Node::new());
    /// let left = tree.add_child(Node::new(), root_idx, None).unwrap();
    /// let right = tree.add_child(Node::new(), root_idx, None).unwrap();
    ///
    /// assert_eq!(tree.get_leaves(), vec![left, right]);
    /// ```
    pub fn get_leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|&node| !node.deleted && node.is_tip())
            .map(|node| node.id)
            .collect()
    }

    /// Returns the taxon labels of the leaf nodes of the tree
    pub fn get_leaf_names(&self) -> Vec<Option<String>> {
        self.nodes
            .iter()
            .filter(|&node| !node.deleted && node.is_tip())
            .map(|node| node.taxon_label.clone())
            .collect()
    }

    /// Returns the number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.iter().filter(|node| !node.deleted).count()
    }

    /// Returns the number of leaves in the tree
    pub fn n_leaves(&self) -> usize {
        self.get_leaves().len()
    }

    /// Checks if the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Methods to traverse the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Returns a vector containing node ids in the same order as the
    /// [preorder](https://en.wikipedia.org/wiki/Tree_traversal#Pre-order,_NLR) tree traversal
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;").unwrap();
    /// let preorder: Vec<_> = tree.preorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .filter_map(|id| tree.get(id).unwrap().name().map(String::from))
    ///     .collect();
    ///
    /// assert_eq!(preorder, vec!["F", "B", "A", "D", "C", "E", "G", "I", "H"])
    /// ```
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut indices = vec![];
        let mut stack = vec![*root];
        while let Some(idx) = stack.pop() {
            indices.push(idx);
            stack.extend(self.get(&idx)?.children.iter().rev());
        }

        Ok(indices)
    }
}

/// Methods to alter the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ##################
    // # ALTER THE TREE #
    // ##################

    // Removes a single node, fusing its parent and child edges
    fn compress_node(&mut self, id: &NodeId) -> Result<(), TreeError> {
        let node = self.get(id)?;

        let (Some(parent), [child]) = (node.parent, node.children.as_slice()) else {
            return Err(TreeError::CouldNotCompressNode(*id));
        };
        let child = *child;
        let parent_edge = node.parent_edge;
        let child_edge = self.get(&child)?.parent_edge;

        let new_edge = match (parent_edge, child_edge) {
            (Some(p), Some(c)) => Some(p + c),
            (Some(l), None) | (None, Some(l)) => Some(l),
            (None, None) => None,
        };

        self.get_mut(&child)?.set_parent(parent, new_edge);
        self.get_mut(&parent)?.replace_child(id, child)?;
        self.get_mut(id)?.delete();

        Ok(())
    }

    /// Compress the tree (i.e. remove nodes with exactly 1 parent and 1 child and fuse branches together).
    /// A root with a single child is replaced by that child.
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;").unwrap();
    /// // Compress F->G->I->H to F->H
    /// tree.compress().unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A,(C,E)D)B,H)F;");
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:2)C:3)D:1;").unwrap();
    /// tree.compress().unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(A:1,B:2)C:4;");
    /// ```
    pub fn compress(&mut self) -> Result<(), TreeError> {
        let to_compress: Vec<_> = self
            .nodes
            .iter()
            .filter(|node| !node.deleted && node.parent.is_some() && node.children.len() == 1)
            .map(|node| node.id)
            .collect();

        for id in to_compress {
            self.compress_node(&id)?;
        }

        if self.is_empty() {
            return Ok(());
        }

        loop {
            let root = self.get_root()?;
            let node = self.get(&root)?;
            let [child] = node.children.as_slice() else {
                break;
            };
            let child = *child;
            let root_edge = node.parent_edge;

            let child_node = self.get_mut(&child)?;
            child_node.parent = None;
            child_node.parent_edge = match (root_edge, child_node.parent_edge) {
                (Some(p), Some(c)) => Some(p + c),
                (Some(l), None) | (None, Some(l)) => Some(l),
                (None, None) => None,
            };
            self.get_mut(&root)?.delete();
        }

        self.reset_depths()
    }

    pub(crate) fn reset_depths(&mut self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        for id in self.preorder(&root)? {
            let depth = match self.get(&id)?.parent {
                Some(parent) => self.get(&parent)?.depth + 1,
                None => 0,
            };
            self.get_mut(&id)?.set_depth(depth);
        }
        Ok(())
    }
}

// Splits text into `;` terminated statements, ignoring semicolons inside
// quoted labels and comments. Also returns the unterminated remainder.
pub(crate) fn split_statements(text: &str) -> Result<(Vec<&str>, &str), NewickParseError> {
    let mut statements = vec![];
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut in_comment = false;

    for (i, c) in text.char_indices() {
        match (quote, in_comment, c) {
            (Some(q), _, c) if c == q => quote = None,
            (Some(_), _, _) => {}
            (None, true, ']') => in_comment = false,
            (None, true, _) => {}
            (None, false, '\'' | '"') => quote = Some(c),
            (None, false, '[') => in_comment = true,
            (None, false, ';') => {
                statements.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(NewickParseError::UnclosedQuote);
    }

    Ok((statements, &text[start..]))
}

fn split_newick(text: &str) -> Result<Vec<&str>, NewickParseError> {
    let (statements, rest) = split_statements(text)?;
    if !rest.trim().is_empty() {
        return Err(NewickParseError::NoClosingSemicolon);
    }

    Ok(statements)
}

/// Methods to read and write [`Tree`] objects to and from files or [`String`] objects.
///
/// ----
/// ----
impl Tree {
    // ########################
    // # READ AND WRITE TREES #
    // ########################

    /// Generate newick representation of tree
    fn to_newick_impl(&self, root: &NodeId, format: NewickFormat) -> Result<String, TreeError> {
        let root = self.get(root)?;
        if root.children.is_empty() {
            Ok(root.to_newick(format))
        } else {
            let children = root
                .children
                .iter()
                .map(|child_idx| self.to_newick_impl(child_idx, format))
                .collect::<Result<Vec<String>, TreeError>>()?;

            Ok("(".to_string() + &children.join(",") + ")" + &root.to_newick(format))
        }
    }

    /// Writes the tree as a newick formatted string.
    /// Taxon labels are written for nodes that have one, node labels otherwise.
    /// # Example
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F:0.6;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), newick);
    /// ```
    pub fn to_newick(&self) -> Result<String, TreeError> {
        self.to_formatted_newick(NewickFormat::AllFields)
    }

    /// Writes the tree as a newick formatted string with a specified
    /// output format from [`NewickFormat`].
    /// # Example
    /// ```
    /// use alifeconv::tree::{Tree, NewickFormat};
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F:0.6;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.to_formatted_newick(NewickFormat::Topology).unwrap(), "(,,(,));");
    /// assert_eq!(
    ///     tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
    ///     "(A,B,(C,D)E)F;"
    /// );
    /// ```
    pub fn to_formatted_newick(&self, format: NewickFormat) -> Result<String, TreeError> {
        let root = self.get_root()?;
        Ok(self.to_newick_impl(&root, format)? + ";")
    }

    /// Read a newick formatted string and build a [`Tree`] struct from it.
    ///
    /// Quoted labels (with `'` or `"`) are unquoted, `''` inside single quotes
    /// stands for a literal quote. Leaf names are read as taxon labels and
    /// internal node names as node labels. A lone `;` is an empty tree.
    ///
    /// # Example
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let newick = "(A:0.1,'B b':0.2,(C:0.3,D:0.4)E:0.5)F;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.size(), 6);
    /// assert_eq!(tree.n_leaves(), 4);
    /// assert!(tree.get_by_name("B b").unwrap().is_tip());
    /// assert_eq!(tree.get_by_name("E").unwrap().label.as_deref(), Some("E"));
    ///
    /// assert!(Tree::from_newick(";").unwrap().is_empty());
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        #[derive(Debug, PartialEq)]
        enum Field {
            Name,
            Length,
            Comment,
        }

        fn push(field: &mut Option<String>, c: char) {
            match field.as_mut() {
                Some(value) => value.push(c),
                None => *field = Some(c.into()),
            }
        }

        let mut tree = Tree::new();

        let mut parsing = Field::Name;
        let mut current_name: Option<String> = None;
        let mut current_length: Option<String> = None;
        let mut current_comment: Option<String> = None;
        let mut current_index: Option<NodeId> = None;
        let mut parent_stack: Vec<NodeId> = Vec::new();

        let mut open_delimiters = Vec::new();
        let mut quote: Option<char> = None;

        let mut chars = newick.chars().peekable();
        while let Some(c) = chars.next() {
            // Add character in quotes to name
            if let Some(q) = quote {
                if c != q {
                    push(&mut current_name, c);
                } else if q == '\'' && chars.peek() == Some(&'\'') {
                    chars.next();
                    push(&mut current_name, c);
                } else {
                    quote = None;
                }
                continue;
            }

            // Add current character to comment
            if parsing == Field::Comment && c != ']' {
                push(&mut current_comment, c);
                continue;
            }

            // Skip unquoted whitespace
            if c.is_whitespace() {
                continue;
            }

            match c {
                '"' | '\'' if parsing == Field::Name => {
                    quote = Some(c);
                    if current_name.is_none() {
                        current_name = Some(String::new());
                    }
                }
                '[' => {
                    parsing = Field::Comment;
                }
                ']' => {
                    parsing = Field::Name;
                }
                '(' => {
                    // Start subtree
                    match parent_stack.last() {
                        None => parent_stack.push(tree.add(Node::new())),
                        Some(parent) => {
                            parent_stack.push(tree.add_child(Node::new(), *parent, None)?)
                        }
                    };
                    open_delimiters.push(0);
                }
                ':' => {
                    // Start parsing length
                    parsing = Field::Length;
                }
                ',' | ')' => {
                    // Finish the current node
                    let index = match current_index {
                        Some(index) => index,
                        None => {
                            let parent =
                                parent_stack.last().ok_or(NewickParseError::NoSubtreeParent)?;
                            tree.add_child(Node::new(), *parent, None)?
                        }
                    };

                    let node = tree.get_mut(&index)?;
                    node.label = current_name.take();
                    node.parent_edge = current_length
                        .take()
                        .map(|l| l.parse::<EdgeLength>())
                        .transpose()?;
                    node.comment = current_comment.take();

                    current_index = None;
                    parsing = Field::Name;

                    if c == ')' {
                        // Close subtree
                        open_delimiters.pop();
                        match parent_stack.pop() {
                            Some(parent) => current_index = Some(parent),
                            None => return Err(NewickParseError::NoSubtreeParent),
                        }
                    }
                }
                ';' => {
                    // Finish parsing the Tree
                    if !open_delimiters.is_empty() {
                        return Err(NewickParseError::UnclosedBracket);
                    }

                    let index = match current_index {
                        Some(index) => index,
                        None if current_name.is_none()
                            && current_length.is_none()
                            && current_comment.is_none() =>
                        {
                            return Ok(tree);
                        }
                        None => tree.add(Node::new()),
                    };

                    let node = tree.get_mut(&index)?;
                    node.label = current_name;
                    node.comment = current_comment;
                    node.parent_edge = current_length
                        .map(|l| l.parse::<EdgeLength>())
                        .transpose()?;

                    // Leaf names are taxa
                    for node in tree.nodes.iter_mut().filter(|node| node.is_tip()) {
                        node.taxon_label = node.label.take();
                    }

                    return Ok(tree);
                }
                _ => {
                    // Parse characters in fields
                    match parsing {
                        Field::Name => push(&mut current_name, c),
                        Field::Length => {
                            if c.is_whitespace() {
                                return Err(NewickParseError::WhiteSpaceInNumber);
                            }
                            push(&mut current_length, c)
                        }
                        Field::Comment => unreachable!("comments are consumed above"),
                    };
                }
            }
        }

        if quote.is_some() {
            return Err(NewickParseError::UnclosedQuote);
        }
        Err(NewickParseError::NoClosingSemicolon)
    }

    /// Reads every `;` terminated tree of a newick string. Empty statements
    /// are skipped.
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let trees = Tree::from_newick_multi("(A,B)C;\n;\n('x;y',D);").unwrap();
    /// assert_eq!(trees.len(), 2);
    /// assert!(trees[1].get_by_name("x;y").is_some());
    ///
    /// assert!(Tree::from_newick_multi("").unwrap().is_empty());
    /// ```
    pub fn from_newick_multi(text: &str) -> Result<Vec<Self>, NewickParseError> {
        let mut trees = vec![];
        for statement in split_newick(text)? {
            let tree = Self::from_newick(statement)?;
            if !tree.is_empty() {
                trees.push(tree);
            }
        }
        Ok(trees)
    }

    /// Writes the tree to a newick file
    pub fn to_file(&self, path: &Path) -> Result<(), TreeError> {
        fs::write(path, self.to_newick()? + "\n")?;
        Ok(())
    }

    /// Creates a tree from a newick file
    pub fn from_file(path: &Path) -> Result<Self, NewickParseError> {
        let newick_string = fs::read_to_string(path)?;
        Self::from_newick(&newick_string)
    }

    /// Copies the subtree rooted at a node into a new tree
    /// ```
    /// use alifeconv::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
    /// let sub_root = tree.get_by_name("E").unwrap().id;
    /// let subtree = tree.extract_subtree(&sub_root).unwrap();
    ///
    /// assert_eq!(subtree.to_newick().unwrap(), "(C:0.3,D:0.4)E:0.5;");
    /// ```
    pub fn extract_subtree(&self, root: &NodeId) -> Result<Self, TreeError> {
        let mut subtree = Tree::new();
        let mut new_ids: HashMap<NodeId, NodeId> = HashMap::new();

        for old_id in self.preorder(root)? {
            let mut node = self.get(&old_id)?.clone();
            node.children = vec![];
            let parent = node.parent.take();
            let edge = node.parent_edge;
            node.depth = 0;
            let new_id = subtree.add(node);
            if let Some(new_parent) = parent.and_then(|p| new_ids.get(&p)) {
                subtree.attach(*new_parent, new_id, edge)?;
            }
            new_ids.insert(old_id, new_id);
        }

        Ok(subtree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generates example tree from the tree traversal wikipedia page
    /// https://en.wikipedia.org/wiki/Tree_traversal#Depth-first_search
    fn build_simple_tree() -> Result<Tree, TreeError> {
        let mut tree = Tree::new();
        tree.add(Node::new_labeled("F")); // 0
        tree.add_child(Node::new_labeled("B"), 0, None)?; // 1
        tree.add_child(Node::new_labeled("G"), 0, None)?; // 2
        tree.add_child(Node::new_named("A"), 1, None)?; // 3
        tree.add_child(Node::new_labeled("D"), 1, None)?; // 4
        tree.add_child(Node::new_labeled("I"), 2, None)?; // 5
        tree.add_child(Node::new_named("C"), 4, None)?; // 6
        tree.add_child(Node::new_named("E"), 4, None)?; // 7
        tree.add_child(Node::new_named("H"), 5, None)?; // 8

        Ok(tree)
    }

    #[test]
    fn preorder_traversal() {
        let tree = build_simple_tree().unwrap();
        let root = tree.get_root().unwrap();

        assert_eq!(tree.preorder(&root).unwrap(), vec![0, 1, 3, 4, 6, 7, 2, 5, 8]);
    }

    #[test]
    fn test_newick_from_built_tree() {
        let tree = build_simple_tree().unwrap();
        assert_eq!(tree.to_newick().unwrap(), "((A,(C,E)D)B,((H)I)G)F;");
        assert_eq!(
            Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;")
                .unwrap()
                .to_newick()
                .unwrap(),
            "((A,(C,E)D)B,((H)I)G)F;"
        );
    }

    #[test]
    fn read_newick() {
        let newick_strings = vec![
            "((D,E)B,(F,G)C)A;",
            "((D:0.3,E:0.4)B:0.1,(F:0.5,G:0.6)C:0.2)A;",
            "(D:0.3,E:0.4,F:0.5);",
            "(:0.3,:0.4,:0.5);",
            "A;",
            "A:0.5;",
            "((D,E)B[comment],(F,G)C)A;",
            "('a b':0.1,'c''d':0.2)'root node';",
        ];
        for newick in newick_strings {
            let tree = Tree::from_newick(newick).unwrap();
            assert_eq!(newick, tree.to_newick().unwrap());
        }
    }

    #[test]
    fn read_double_quoted_names() {
        let tree = Tree::from_newick("(\"a,b\",c);").unwrap();
        assert!(tree.get_by_name("a,b").is_some());
        assert_eq!(tree.to_newick().unwrap(), "('a,b',c);");
    }

    #[test]
    fn read_newick_errors() {
        assert!(matches!(
            Tree::from_newick("((A,B),C;"),
            Err(NewickParseError::UnclosedBracket)
        ));
        assert!(matches!(
            Tree::from_newick("(A,B)"),
            Err(NewickParseError::NoClosingSemicolon)
        ));
        assert!(matches!(
            Tree::from_newick("('A,B);"),
            Err(NewickParseError::UnclosedQuote)
        ));
        assert!(matches!(
            Tree::from_newick("A,B);"),
            Err(NewickParseError::NoSubtreeParent)
        ));
        assert!(matches!(
            Tree::from_newick("(A:x,B);"),
            Err(NewickParseError::FloatError(_))
        ));
    }

    #[test]
    fn split_newick_statements() {
        assert_eq!(
            split_newick("(A,B);\n(C,'D;E')[;];").unwrap(),
            vec!["(A,B);", "\n(C,'D;E')[;];"]
        );
        assert!(matches!(
            split_newick("(A,B);(C"),
            Err(NewickParseError::NoClosingSemicolon)
        ));
    }

    #[test]
    fn compress_tree() {
        let cases = [
            ("((A:1,B:2)C:3)D:1;", "(A:1,B:2)C:4;"),
            ("(((A:1)B:2)C:3)D;", "A:6;"),
            ("((A:1,(B)E:2)C:3)D;", "(A:1,B:2)C:3;"),
            ("(A,B)C;", "(A,B)C;"),
        ];
        for (input, expected) in cases {
            let mut tree = Tree::from_newick(input).unwrap();
            tree.compress().unwrap();
            assert_eq!(tree.to_newick().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn compress_resets_depths() {
        let mut tree = Tree::from_newick("((A,B)C)D;").unwrap();
        tree.compress().unwrap();

        let root = tree.get_root().unwrap();
        assert_eq!(tree.get(&root).unwrap().get_depth(), 0);
        for leaf in tree.get_leaves() {
            assert_eq!(tree.get(&leaf).unwrap().get_depth(), 1);
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.nwk");
        let tree = Tree::from_newick("((A:0.1,B:0.2)C:0.3,D:0.4)E;").unwrap();

        tree.to_file(&path).unwrap();
        let read = Tree::from_file(&path).unwrap();
        assert_eq!(read.to_newick().unwrap(), tree.to_newick().unwrap());
    }
}
