//! Read and write trees in the [NeXML](http://nexml.github.io/) format.
//!
//! Only the subset needed to store phylogenies is supported: an `otus` block
//! holding taxon labels and `FloatTree` elements made of nodes, edges and
//! root edges. Characters matrices and metadata are ignored when reading.

use std::collections::HashMap;

use itertools::Itertools;

use super::{EdgeLength, Node, NodeId, Tree, TreeError};
use crate::errors::ConversionError;

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nex:nexml xmlns:nex="http://www.nexml.org/2009" xmlns="http://www.nexml.org/2009" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="0.9">
"#;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped += "&amp;",
            '<' => escaped += "&lt;",
            '>' => escaped += "&gt;",
            '"' => escaped += "&quot;",
            '\'' => escaped += "&apos;",
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape(text: &str) -> Result<String, ConversionError> {
    let mut unescaped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        unescaped += &rest[..start];
        let end = rest[start..]
            .find(';')
            .ok_or_else(|| malformed(format!("unterminated entity in '{text}'")))?;
        let entity = &rest[start + 1..start + end];
        let c = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                .and_then(Result::ok)
                .and_then(char::from_u32)
                .ok_or_else(|| malformed(format!("unknown entity '&{entity};'")))?,
        };
        unescaped.push(c);
        rest = &rest[start + end + 1..];
    }
    unescaped += rest;

    Ok(unescaped)
}

fn malformed(message: String) -> ConversionError {
    ConversionError::Format(format!("invalid NeXML: {message}"))
}

/// Outputs a NeXML document holding several trees.
///
/// Taxon labels are stored as `otu` elements referenced by the nodes, node
/// labels as `label` attributes and branch lengths as `edge` lengths. The
/// branch length of a root is written as a `rootedge`.
///
/// # Example
/// ```
/// use alifeconv::tree::{nexml, Tree};
///
/// let tree = Tree::from_newick("(A:1,B:2)C:0.5;").unwrap();
/// let xml = nexml::write_nexml(&[tree]).unwrap();
///
/// assert!(xml.contains(r#"<otu id="otu1" label="A"/>"#));
/// assert!(xml.contains(r#"<node id="t1n1" label="C" root="true"/>"#));
/// assert!(xml.contains(r#"<rootedge id="t1re1" target="t1n1" length="0.5"/>"#));
/// assert!(xml.contains(r#"<edge id="t1e2" source="t1n1" target="t1n2" length="1"/>"#));
/// ```
pub fn write_nexml(trees: &[Tree]) -> Result<String, TreeError> {
    let labels: Vec<String> = trees
        .iter()
        .flat_map(|tree| {
            tree.search_nodes(|node| node.taxon_label.is_some())
                .into_iter()
                .filter_map(move |id| tree.get(&id).ok()?.taxon_label.clone())
        })
        .unique()
        .collect();
    let otus: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i + 1))
        .collect();

    let mut xml = String::from(HEADER);

    xml += "  <otus id=\"otus1\">\n";
    for (i, label) in labels.iter().enumerate() {
        xml += &format!("    <otu id=\"otu{}\" label=\"{}\"/>\n", i + 1, escape(label));
    }
    xml += "  </otus>\n";

    if !trees.is_empty() {
        xml += "  <trees id=\"trees1\" otus=\"otus1\">\n";
        for (t, tree) in trees.iter().enumerate() {
            let t = t + 1;
            xml += &format!("    <tree id=\"tree{t}\" xsi:type=\"nex:FloatTree\">\n");

            let order = match tree.get_root() {
                Ok(root) => tree.preorder(&root)?,
                Err(_) => vec![],
            };
            // 1-based positions in preorder give stable element ids
            let positions: HashMap<NodeId, usize> =
                order.iter().enumerate().map(|(i, id)| (*id, i + 1)).collect();

            let mut edges = vec![];
            for id in order.iter() {
                let node = tree.get(id)?;
                let n = positions[id];
                let mut element = format!("      <node id=\"t{t}n{n}\"");
                if let Some(label) = &node.label {
                    element += &format!(" label=\"{}\"", escape(label));
                }
                if let Some(otu) = node.taxon_label.as_deref().and_then(|l| otus.get(l)) {
                    element += &format!(" otu=\"otu{otu}\"");
                }
                if node.is_root() {
                    element += " root=\"true\"";
                }
                xml += &element;
                xml += "/>\n";

                let length = node
                    .parent_edge
                    .map(|l| format!(" length=\"{l}\""))
                    .unwrap_or_default();
                match node.parent.and_then(|p| positions.get(&p)) {
                    Some(p) => edges.push(format!(
                        "      <edge id=\"t{t}e{n}\" source=\"t{t}n{p}\" target=\"t{t}n{n}\"{length}/>\n"
                    )),
                    None if node.parent_edge.is_some() => edges.push(format!(
                        "      <rootedge id=\"t{t}re{n}\" target=\"t{t}n{n}\"{length}/>\n"
                    )),
                    None => {}
                }
            }
            xml += &edges.concat();
            xml += "    </tree>\n";
        }
        xml += "  </trees>\n";
    }

    xml += "</nex:nexml>\n";

    Ok(xml)
}

// An opening, closing or empty element
#[derive(Debug)]
struct Tag<'a> {
    name: &'a str,
    attrs: HashMap<&'a str, String>,
    closing: bool,
    empty: bool,
}

impl Tag<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str, ConversionError> {
        self.attr(name)
            .ok_or_else(|| malformed(format!("<{}> element without '{name}' attribute", self.name)))
    }
}

// Position of the '>' closing the tag starting at the beginning of `text`
fn tag_end(text: &str) -> Result<usize, ConversionError> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Ok(i),
            _ => {}
        }
    }
    Err(malformed("unclosed tag".to_string()))
}

// Position of the '>' closing a `<!DOCTYPE ...>` style declaration,
// past any bracketed internal subset
fn declaration_end(text: &str) -> Result<usize, ConversionError> {
    let mut quote = None;
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    Err(malformed("unterminated markup declaration".to_string()))
}

fn parse_tag(body: &str) -> Result<Tag<'_>, ConversionError> {
    let closing = body.starts_with('/');
    let empty = body.ends_with('/');
    let body = body.trim_start_matches('/').trim_end_matches('/').trim();

    let (name, mut rest) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));
    // Drop namespace prefixes on element names
    let name = name.rsplit(':').next().unwrap_or(name);

    let mut attrs = HashMap::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let (key, value) = rest
            .split_once('=')
            .ok_or_else(|| malformed(format!("invalid attributes in <{name}>")))?;
        let value = value.trim_start();
        let quote = value
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| malformed(format!("unquoted attribute value in <{name}>")))?;
        let end = value[1..]
            .find(quote)
            .ok_or_else(|| malformed(format!("unclosed attribute value in <{name}>")))?;

        attrs.insert(key.trim(), unescape(&value[1..end + 1])?);
        rest = &value[end + 2..];
    }

    Ok(Tag {
        name,
        attrs,
        closing,
        empty,
    })
}

// Lists the element tags of a document, skipping the prolog,
// comments and character data.
fn scan_tags(text: &str) -> Result<Vec<Tag<'_>>, ConversionError> {
    let mut tags = vec![];
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        rest = &rest[start..];
        let skip_until = if rest.starts_with("<!--") {
            Some("-->")
        } else if rest.starts_with("<![CDATA[") {
            Some("]]>")
        } else if rest.starts_with("<?") {
            Some("?>")
        } else {
            None
        };

        if let Some(terminator) = skip_until {
            let end = rest
                .find(terminator)
                .ok_or_else(|| malformed("unterminated markup declaration".to_string()))?;
            rest = &rest[end + terminator.len()..];
            continue;
        }
        if rest.starts_with("<!") {
            rest = &rest[declaration_end(rest)? + 1..];
            continue;
        }

        let end = tag_end(rest)?;
        tags.push(parse_tag(&rest[1..end])?);
        rest = &rest[end + 1..];
    }

    Ok(tags)
}

// Nodes and edges of the tree being read
#[derive(Debug, Default)]
struct TreeBuilder {
    id: String,
    tree: Tree,
    nodes: HashMap<String, NodeId>,
    edges: Vec<(String, String, Option<EdgeLength>)>,
    root_edges: Vec<(String, Option<EdgeLength>)>,
}

impl TreeBuilder {
    fn node(&self, id: &str) -> Result<NodeId, ConversionError> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| malformed(format!("edge of tree '{}' targets unknown node '{id}'", self.id)))
    }

    fn build(mut self) -> Result<Tree, ConversionError> {
        for (source, target, length) in std::mem::take(&mut self.edges) {
            let (parent, child) = (self.node(&source)?, self.node(&target)?);
            if self.tree.get(&child)?.parent.is_some() {
                return Err(malformed(format!("node '{target}' has several parents")));
            }
            self.tree.attach(parent, child, length)?;
        }
        for (target, length) in std::mem::take(&mut self.root_edges) {
            let root = self.node(&target)?;
            self.tree.get_mut(&root)?.parent_edge = length;
        }

        let n_roots = self.tree.search_nodes(|node| node.is_root()).len();
        if n_roots > 1 {
            return Err(malformed(format!(
                "tree '{}' has {n_roots} root nodes",
                self.id
            )));
        }
        if !self.tree.is_empty() {
            self.tree.reset_depths()?;
        }

        Ok(self.tree)
    }
}

fn parse_length(tag: &Tag) -> Result<Option<EdgeLength>, ConversionError> {
    tag.attr("length")
        .map(|l| {
            l.trim()
                .parse::<EdgeLength>()
                .map_err(|_| malformed(format!("invalid edge length '{l}'")))
        })
        .transpose()
}

/// Reads the trees of a NeXML document.
///
/// Node labels are read from `label` attributes and taxon labels from the
/// referenced `otu` elements. Empty trees are skipped.
///
/// The reader scans element tags only. Comments, CDATA sections,
/// processing instructions and `<!DOCTYPE>` declarations are skipped,
/// including any internal subset, but entities declared there are not
/// expanded: attribute values may only use the predefined XML entities and
/// character references. Text content is ignored, so labels must be given
/// as attributes.
///
/// # Example
/// ```
/// use alifeconv::tree::nexml;
///
/// let xml = r#"<?xml version="1.0"?>
/// <nexml xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
///   <otus id="os"><otu id="o1" label="A"/><otu id="o2" label="B"/></otus>
///   <trees id="ts" otus="os">
///     <tree id="t" xsi:type="FloatTree">
///       <node id="r" root="true"/>
///       <node id="a" otu="o1"/>
///       <node id="b" otu="o2"/>
///       <edge id="e1" source="r" target="a" length="1.5"/>
///       <edge id="e2" source="r" target="b" length="2"/>
///     </tree>
///   </trees>
/// </nexml>"#;
/// let trees = nexml::read_nexml(xml).unwrap();
///
/// assert_eq!(trees.len(), 1);
/// assert_eq!(trees[0].to_newick().unwrap(), "(A:1.5,B:2);");
/// ```
pub fn read_nexml(text: &str) -> Result<Vec<Tree>, ConversionError> {
    let tags = scan_tags(text)?;
    if !tags.iter().any(|tag| tag.name == "nexml") {
        return Err(malformed("missing <nexml> root element".to_string()));
    }

    let mut otus = HashMap::new();
    let mut trees = vec![];
    let mut current: Option<TreeBuilder> = None;

    for tag in tags.iter() {
        match (tag.name, tag.closing, current.as_mut()) {
            ("otu", false, _) => {
                if let Some(label) = tag.attr("label") {
                    otus.insert(tag.required("id")?, label.to_string());
                }
            }
            // <tree/> holds no nodes
            ("tree", false, None) if tag.empty => {}
            ("tree", false, None) => {
                current = Some(TreeBuilder {
                    id: tag.attr("id").unwrap_or_default().to_string(),
                    ..Default::default()
                });
            }
            ("tree", true, Some(_)) => {
                if let Some(builder) = current.take() {
                    let tree = builder.build()?;
                    if !tree.is_empty() {
                        trees.push(tree);
                    }
                }
            }
            ("tree", _, _) => return Err(malformed("nested or unopened <tree>".to_string())),
            ("node", false, Some(builder)) => {
                let id = tag.required("id")?;
                let taxon_label = match tag.attr("otu") {
                    Some(otu) => Some(
                        otus.get(otu)
                            .cloned()
                            .ok_or_else(|| malformed(format!("unknown otu '{otu}'")))?,
                    ),
                    None => None,
                };
                let node = builder.tree.add(Node {
                    label: tag.attr("label").map(String::from),
                    taxon_label,
                    ..Default::default()
                });
                if builder.nodes.insert(id.to_string(), node).is_some() {
                    return Err(malformed(format!("duplicate node id '{id}'")));
                }
            }
            ("edge", false, Some(builder)) => builder.edges.push((
                tag.required("source")?.to_string(),
                tag.required("target")?.to_string(),
                parse_length(tag)?,
            )),
            ("rootedge", false, Some(builder)) => builder
                .root_edges
                .push((tag.required("target")?.to_string(), parse_length(tag)?)),
            _ => {}
        }
    }

    if current.is_some() {
        return Err(malformed("unclosed <tree>".to_string()));
    }

    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nexml_round_trip() {
        let trees = vec![
            Tree::from_newick("((A:1,'B & b':2)C:0.5,D:3)root:1;").unwrap(),
            Tree::from_newick("(A,(E,F)'<inner>');").unwrap(),
        ];
        let xml = write_nexml(&trees).unwrap();
        assert!(xml.contains("label=\"B &amp; b\""));
        assert!(xml.contains("label=\"&lt;inner&gt;\""));
        // Shared taxa are listed once
        assert_eq!(xml.matches("label=\"A\"").count(), 1);

        let read = read_nexml(&xml).unwrap();
        assert_eq!(read.len(), 2);
        for (original, copy) in trees.iter().zip(read.iter()) {
            assert_eq!(original.to_newick().unwrap(), copy.to_newick().unwrap());
        }

        let c = read[0].get_by_name("C").unwrap();
        assert_eq!(c.label.as_deref(), Some("C"));
        assert!(c.taxon_label.is_none());
        assert_eq!(c.get_depth(), 1);
    }

    #[test]
    fn unescape_entities() {
        assert_eq!(unescape("a &amp; b").unwrap(), "a & b");
        assert_eq!(unescape("&#65;&#x42;").unwrap(), "AB");
        assert!(unescape("&bogus;").is_err());
        assert!(unescape("a & b").is_err());
    }

    #[test]
    fn empty_documents() {
        let xml = write_nexml(&[]).unwrap();
        assert!(!xml.contains("<trees"));
        assert!(read_nexml(&xml).unwrap().is_empty());

        let xml = "<nexml><trees><tree id=\"t\"></tree></trees></nexml>";
        assert!(read_nexml(xml).unwrap().is_empty());

        let xml = r#"<nexml version="0.9" xmlns="http://www.nexml.org/2009">
  <trees id="emptyTreeSet">
    <tree id="emptyTree"/>
  </trees>
</nexml>"#;
        assert!(read_nexml(xml).unwrap().is_empty());
    }

    #[test]
    fn comments_and_prefixes() {
        let xml = r#"<?xml version="1.0"?>
<!-- a comment with <node id="x"/> inside -->
<nex:nexml xmlns:nex="http://www.nexml.org/2009">
  <nex:trees>
    <nex:tree id='t1'>
      <nex:node id='a' label='one'/>
      <nex:node id='b' label='two'/>
      <nex:edge id='e' source='a' target='b'/>
    </nex:tree>
  </nex:trees>
</nex:nexml>"#;
        let trees = read_nexml(xml).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].size(), 2);
        assert_eq!(trees[0].to_newick().unwrap(), "(two)one;");
    }

    #[test]
    fn skipped_markup() {
        let xml = r#"<?xml version="1.0"?>
<?style href="a > b"?>
<!DOCTYPE nexml [
  <!ENTITY who "me">
  <!ELEMENT node EMPTY>
]>
<nexml>
  <![CDATA[ <node id="ghost"/> ]]>
  <trees>
    <tree id="t">
      <node id="r" root="true"/>
      <node id="a" label="A"/>
      <edge id="e" source="r" target="a"/>
    </tree>
  </trees>
</nexml>"#;
        let trees = read_nexml(xml).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].size(), 2);
        assert_eq!(trees[0].to_newick().unwrap(), "(A);");
    }

    #[test]
    fn malformed_documents() {
        let cases = [
            "(A,B);",
            "<nexml><trees><tree id=\"t\"><node id=\"a\"/>",
            "<nexml><tree id=\"t\"><node id=\"a\"/><edge source=\"a\" target=\"z\"/></tree></nexml>",
            "<nexml><tree id=\"t\"><node id=\"a\"/><node id=\"b\"/></tree></nexml>",
            "<nexml><tree id=\"t\"><node id=\"a\" otu=\"missing\"/></tree></nexml>",
            "<nexml><tree id=\"t\"><node id=\"a\"/><node id=\"b\"/><edge source=\"a\" target=\"b\" length=\"x\"/></tree></nexml>",
            "<nexml><tree id=\"t\"><node id=\"a\"/><node id=\"a\"/></tree></nexml>",
        ];
        for xml in cases {
            assert!(
                matches!(read_nexml(xml), Err(ConversionError::Format(_))),
                "{xml}"
            );
        }
    }
}
