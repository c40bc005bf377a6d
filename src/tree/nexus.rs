//! Read and write trees in the Nexus format.
//!
//! Only the `TAXA` and `TREES` blocks are supported. Other blocks are
//! skipped when reading.

use std::collections::HashMap;

use itertools::Itertools;

use super::tree_impl::split_statements;
use super::{quote_label, unquote_label, Tree, TreeError};
use crate::errors::ConversionError;

/// Outputs a Nexus formatted string holding several trees.
///
/// Taxon labels of all trees are listed once, in order of first appearance,
/// in the `TAXA` block.
///
/// # Example
/// ```
/// use alifeconv::tree::{nexus, Tree};
///
/// let tree = Tree::from_newick("(A:1,'B b':2);").unwrap();
/// let nexus = nexus::write_nexus(&[tree]).unwrap();
///
/// assert!(nexus.starts_with("#NEXUS\n"));
/// assert!(nexus.contains("TAXLABELS A 'B b';"));
/// assert!(nexus.contains("TREE tree1 = [&R] (A:1,'B b':2);"));
/// ```
pub fn write_nexus(trees: &[Tree]) -> Result<String, TreeError> {
    let labels: Vec<String> = trees
        .iter()
        .flat_map(|tree| tree.get_leaf_names())
        .flatten()
        .unique()
        .collect();

    let mut nexus = String::from("#NEXUS\n");
    if !labels.is_empty() {
        let n = labels.len();
        let labels = labels.iter().map(|label| quote_label(label)).join(" ");
        nexus += &format!(
            "BEGIN TAXA;
    DIMENSIONS NTAX={n};
    TAXLABELS {labels};
END;
"
        );
    }

    nexus += "BEGIN TREES;\n";
    for (i, tree) in trees.iter().enumerate() {
        let nwk = tree.to_newick()?;
        nexus += &format!("    TREE tree{} = [&R] {nwk}\n", i + 1);
    }
    nexus += "END;\n";

    Ok(nexus)
}

// Parses the body of a TRANSLATE command: `key label, key label, ...`
fn parse_translate(body: &str) -> Result<HashMap<String, String>, ConversionError> {
    let mut entries = vec![];
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in body.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c)
            }
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c)
            }
            (None, ',') => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    entries.push(current);

    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, label) = entry.split_once(char::is_whitespace).ok_or_else(|| {
                ConversionError::Format(format!("invalid TRANSLATE entry '{entry}'"))
            })?;
            Ok((unquote_label(key), unquote_label(label.trim())))
        })
        .collect()
}

// Parses a `TREE name = [&R] newick;` command
fn parse_tree_command(command: &str) -> Result<Tree, ConversionError> {
    let (_, definition) = command
        .split_once('=')
        .ok_or_else(|| ConversionError::Format(format!("invalid TREE command '{command}'")))?;

    let mut newick = definition.trim_start();
    while let Some(rest) = newick.strip_prefix("[&") {
        let end = rest
            .find(']')
            .ok_or_else(|| ConversionError::Format("unclosed tree comment".to_string()))?;
        newick = rest[end + 1..].trim_start();
    }

    // `()` is the conventional placeholder for an empty tree
    if newick.chars().filter(|c| !c.is_whitespace()).eq("();".chars()) {
        return Ok(Tree::new());
    }

    Ok(Tree::from_newick(newick)?)
}

fn keyword(command: &str) -> String {
    command
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Reads the trees of the `TREES` block of a Nexus string.
///
/// Taxon labels are translated through the `TRANSLATE` table when there is
/// one, and rooting comments (`[&R]`, `[&U]`) are ignored. A document without
/// trees yields an empty list.
///
/// # Example
/// ```
/// use alifeconv::tree::nexus;
///
/// let text = "#NEXUS
/// BEGIN TREES;
///     TRANSLATE 1 Homo, 2 'Pan paniscus';
///     TREE t1 = [&U] (1:0.5,2:0.5);
/// END;
/// ";
/// let trees = nexus::read_nexus(text).unwrap();
///
/// assert_eq!(trees.len(), 1);
/// assert_eq!(trees[0].to_newick().unwrap(), "(Homo:0.5,'Pan paniscus':0.5);");
/// ```
pub fn read_nexus(text: &str) -> Result<Vec<Tree>, ConversionError> {
    if !text.trim_start().to_ascii_uppercase().starts_with("#NEXUS") {
        return Err(ConversionError::Format(
            "Nexus documents must start with #NEXUS".to_string(),
        ));
    }

    let (commands, _) = split_statements(text)?;

    let mut trees = vec![];
    let mut translate: HashMap<String, String> = HashMap::new();
    let mut in_trees_block = false;

    for command in commands.into_iter().map(str::trim) {
        // The first command also holds the header
        let command = command.strip_prefix("#NEXUS").unwrap_or(command).trim();
        let command = command.strip_prefix("#nexus").unwrap_or(command).trim();

        match keyword(command).as_str() {
            "BEGIN" => {
                let block = command["BEGIN".len()..].trim().trim_end_matches(';');
                in_trees_block = block.eq_ignore_ascii_case("TREES");
            }
            "END" | "ENDBLOCK" => in_trees_block = false,
            "TRANSLATE" if in_trees_block => {
                let body = command["TRANSLATE".len()..].trim_end_matches(';');
                translate = parse_translate(body)?;
            }
            "TREE" if in_trees_block => {
                let mut tree = parse_tree_command(command)?;
                if !translate.is_empty() {
                    for id in tree.search_nodes(|node| node.taxon_label.is_some()) {
                        let node = tree.get_mut(&id)?;
                        if let Some(label) = node.taxon_label.as_ref().and_then(|l| translate.get(l)) {
                            node.taxon_label = Some(label.clone());
                        }
                    }
                }
                if !tree.is_empty() {
                    trees.push(tree);
                }
            }
            _ => {}
        }
    }

    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nexus_round_trip() {
        let trees = vec![
            Tree::from_newick("((A:1,B:2)C:0.5,D:3);").unwrap(),
            Tree::from_newick("(E,'F f');").unwrap(),
        ];
        let text = write_nexus(&trees).unwrap();

        assert!(text.contains("DIMENSIONS NTAX=5;"));
        assert!(text.contains("TAXLABELS A B D E 'F f';"));

        let read = read_nexus(&text).unwrap();
        assert_eq!(read.len(), 2);
        for (original, copy) in trees.iter().zip(read.iter()) {
            assert_eq!(original.to_newick().unwrap(), copy.to_newick().unwrap());
        }
    }

    #[test]
    fn other_blocks_and_case_are_ignored() {
        let text = "#nexus
begin taxa;
    dimensions ntax=2;
    taxlabels A B;
end;
begin characters;
    matrix A 01 B 10;
end;
begin trees;
    tree one = (A,B);
end;
";
        let trees = read_nexus(text).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].n_leaves(), 2);
    }

    #[test]
    fn empty_documents() {
        assert!(read_nexus("#NEXUS\n").unwrap().is_empty());
        assert!(read_nexus("#NEXUS\nBEGIN TREES;\nEND;\n").unwrap().is_empty());
        assert!(read_nexus("#NEXUS\nBEGIN TREES;\n  TREE emptyTree = ();\nEND;")
            .unwrap()
            .is_empty());
        assert!(matches!(
            read_nexus("(A,B);"),
            Err(ConversionError::Format(_))
        ));
    }

    #[test]
    fn empty_tree_list() {
        let text = write_nexus(&[]).unwrap();
        assert!(!text.contains("TAXA"));
        assert!(read_nexus(&text).unwrap().is_empty());
    }
}
