//! Parse and write the textual `ancestor_list` column.

use super::Id;
use crate::errors::ConversionError;

/// Placeholder written for organisms without ancestors
pub const NO_ANCESTOR: &str = "[None]";

fn is_placeholder(entry: &str) -> bool {
    let unquoted = entry
        .strip_prefix('"')
        .and_then(|e| e.strip_suffix('"'))
        .or_else(|| entry.strip_prefix('\'').and_then(|e| e.strip_suffix('\'')))
        .unwrap_or(entry);

    unquoted.eq_ignore_ascii_case("none")
}

/// Parses an `ancestor_list` cell into the list of ancestor ids.
/// An empty list means that the organism is a root.
///
/// # Example
/// ```
/// use alifeconv::alife::parse_ancestor_list;
///
/// assert!(parse_ancestor_list("[None]").unwrap().is_empty());
/// assert!(parse_ancestor_list("[none]").unwrap().is_empty());
/// assert!(parse_ancestor_list("NONE").unwrap().is_empty());
/// assert!(parse_ancestor_list("[]").unwrap().is_empty());
/// assert_eq!(parse_ancestor_list("[3]").unwrap(), vec![3]);
/// assert_eq!(parse_ancestor_list("[1,0]").unwrap(), vec![1, 0]);
///
/// assert!(parse_ancestor_list("[1, 0]").is_err());
/// assert!(parse_ancestor_list("[None,0]").is_err());
/// ```
pub fn parse_ancestor_list(raw: &str) -> Result<Vec<Id>, ConversionError> {
    if raw.chars().any(char::is_whitespace) {
        return Err(ConversionError::Format(format!(
            "whitespace separated ancestor lists are not supported: '{raw}'"
        )));
    }

    if is_placeholder(raw) {
        return Ok(vec![]);
    }

    let inner = raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| {
            ConversionError::Format(format!("ancestor list '{raw}' is not bracketed"))
        })?;

    if inner.is_empty() {
        return Ok(vec![]);
    }

    let entries: Vec<_> = inner.split(',').collect();
    if let [entry] = entries[..] {
        if is_placeholder(entry) {
            return Ok(vec![]);
        }
    }

    entries
        .into_iter()
        .map(|entry| {
            if is_placeholder(entry) {
                return Err(ConversionError::Format(format!(
                    "ancestor list '{raw}' mixes ids and a missing ancestor"
                )));
            }
            entry.parse::<Id>().map_err(|_| {
                ConversionError::Format(format!(
                    "invalid ancestor id '{entry}' in ancestor list '{raw}'"
                ))
            })
        })
        .collect()
}

/// Writes the `ancestor_list` cell of an organism with at most one parent.
/// ```
/// use alifeconv::alife::make_ancestor_list;
///
/// assert_eq!(make_ancestor_list(Some(3)), "[3]");
/// assert_eq!(make_ancestor_list(None), "[None]");
/// ```
pub fn make_ancestor_list(parent: Option<Id>) -> String {
    match parent {
        Some(id) => format!("[{id}]"),
        None => NO_ANCESTOR.to_string(),
    }
}

/// Writes the `ancestor_list` cell of an organism with any number of parents.
pub fn make_sexual_ancestor_list(parents: &[Id]) -> String {
    if parents.is_empty() {
        return NO_ANCESTOR.to_string();
    }
    let ids: Vec<_> = parents.iter().map(|id| id.to_string()).collect();
    format!("[{}]", ids.join(","))
}

/// Translates a parsed ancestor list into an `ancestor_id` value.
/// Roots are their own ancestor.
pub fn make_ancestor_id(id: Id, ancestors: &[Id]) -> Result<Id, ConversionError> {
    match ancestors {
        [] => Ok(id),
        [parent] => Ok(*parent),
        _ => Err(ConversionError::UnsupportedTopology {
            id,
            n_parents: ancestors.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        for raw in ["[None]", "[none]", "[NONE]", "none", "None", "[\"NONE\"]", "['none']"] {
            assert!(parse_ancestor_list(raw).unwrap().is_empty(), "Failed for {raw}");
        }
    }

    #[test]
    fn id_lists() {
        let cases = [
            ("[0]", vec![0]),
            ("[42]", vec![42]),
            ("[1,2]", vec![1, 2]),
            ("[7,3,5]", vec![7, 3, 5]),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_ancestor_list(raw).unwrap(), expected);
        }
    }

    #[test]
    fn malformed_lists() {
        let cases = [
            "[1, 2]",
            " [1]",
            "[1]\n",
            "[None,1]",
            "[1,none]",
            "[1,]",
            "[-1]",
            "[a]",
            "1",
            "[1",
            "",
        ];
        for raw in cases {
            assert!(
                matches!(parse_ancestor_list(raw), Err(ConversionError::Format(_))),
                "Should have failed for {raw:?}"
            );
        }
    }

    #[test]
    fn ancestor_ids() {
        assert_eq!(make_ancestor_id(4, &[]).unwrap(), 4);
        assert_eq!(make_ancestor_id(4, &[2]).unwrap(), 2);
        assert!(make_ancestor_id(4, &[1, 2]).is_err());
    }

    #[test]
    fn write_lists() {
        assert_eq!(make_sexual_ancestor_list(&[]), "[None]");
        assert_eq!(make_sexual_ancestor_list(&[1, 2]), "[1,2]");
        for parent in [None, Some(0), Some(12)] {
            let raw = make_ancestor_list(parent);
            assert_eq!(parse_ancestor_list(&raw).unwrap(), parent.into_iter().collect::<Vec<_>>());
        }
    }
}
