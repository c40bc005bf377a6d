//! Derive edge lengths from origin times and the other way around.

use super::Forest;
use crate::errors::ConversionError;

fn defined(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

impl Forest {
    /// Fills in missing edge lengths from origin times.
    ///
    /// A child with an origin time whose parent also has one gets the time
    /// difference as edge length. A root with an origin time gets that time.
    /// Existing edge lengths are never overwritten.
    ///
    /// # Errors
    /// [`ConversionError::InvariantViolation`] if a child originates before its
    /// parent, or if a root without edge length has a NaN origin time.
    pub fn setup_edge_lengths(&mut self) -> Result<(), ConversionError> {
        for idx in 0..self.nodes.len() {
            let node = &self.nodes[idx];
            if node.data.edge_length.is_some() {
                continue;
            }

            let Some(parent) = node.parent else {
                if let Some(time) = node.data.origin_time {
                    if time.is_nan() {
                        return Err(ConversionError::InvariantViolation(format!(
                            "root {} has a NaN origin time",
                            self.display_id(idx)
                        )));
                    }
                    self.nodes[idx].data.edge_length = Some(time);
                }
                continue;
            };

            let (Some(child_time), Some(parent_time)) = (
                defined(node.data.origin_time),
                defined(self.nodes[parent].data.origin_time),
            ) else {
                continue;
            };

            if child_time < parent_time {
                return Err(ConversionError::InvariantViolation(format!(
                    "node {} originates at {child_time}, before its parent {} at {parent_time}",
                    self.display_id(idx),
                    self.display_id(parent)
                )));
            }
            self.nodes[idx].data.edge_length = Some(child_time - parent_time);
        }

        Ok(())
    }

    /// Fills in missing origin times from edge lengths.
    ///
    /// Does nothing unless at least one node has an edge length. Roots
    /// without origin time start at their edge length, or `0`, and origin
    /// times then accumulate down each tree. Existing origin times are never
    /// overwritten.
    pub fn setup_origin_times(&mut self) {
        if !self.nodes.iter().any(|n| n.data.edge_length.is_some()) {
            return;
        }

        for root in self.roots.clone() {
            let data = &mut self.nodes[root].data;
            if data.origin_time.is_none() {
                data.origin_time = Some(defined(data.edge_length).unwrap_or(0.0));
            }

            for idx in self.preorder(root) {
                let node = &self.nodes[idx];
                let Some(parent) = node.parent else { continue };
                if node.data.origin_time.is_some() {
                    continue;
                }
                if let (Some(time), Some(length)) = (
                    defined(self.nodes[parent].data.origin_time),
                    defined(node.data.edge_length),
                ) {
                    self.nodes[idx].data.origin_time = Some(time + length);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::alife::{AlifeRecord, AlifeTable};
    use crate::errors::ConversionError;
    use crate::forest::{BuildOptions, Forest, NodeData, TreeTraversal, Visit};

    fn build(records: Vec<AlifeRecord>) -> Result<Forest, ConversionError> {
        let options = BuildOptions::default().setup_edge_lengths(true);
        Forest::from_table(&AlifeTable::from_records(records), &options)
    }

    fn edge_lengths(forest: &Forest) -> Vec<Option<f64>> {
        forest.iter().map(|n| n.data.edge_length).collect()
    }

    fn origin_times(forest: &Forest) -> Vec<Option<f64>> {
        forest.iter().map(|n| n.data.origin_time).collect()
    }

    #[test]
    fn edge_lengths_from_origin_times() {
        let forest = build(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(1.0),
            AlifeRecord::new(1, "[0]").with_origin_time(3.0),
        ])
        .unwrap();

        assert_eq!(forest.roots(), &[0]);
        assert_eq!(forest.get(0).unwrap().children, vec![1]);
        assert_eq!(edge_lengths(&forest), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn derived_edge_lengths_are_not_negative() {
        let forest = build(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(0.0),
            AlifeRecord::new(1, "[0]").with_origin_time(0.0),
            AlifeRecord::new(2, "[1]").with_origin_time(4.5),
            AlifeRecord::new(3, "[0]"),
        ])
        .unwrap();
        assert_eq!(
            edge_lengths(&forest),
            vec![Some(0.0), Some(0.0), Some(4.5), None]
        );

        let adversarial = build(vec![
            AlifeRecord::new(0, "[None]").with_origin_time(5.0),
            AlifeRecord::new(1, "[0]").with_origin_time(2.0),
        ]);
        assert!(matches!(
            adversarial,
            Err(ConversionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn existing_edge_lengths_are_kept() {
        let forest = build(vec![
            AlifeRecord::new(0, "[None]")
                .with_origin_time(1.0)
                .with_edge_length(0.5),
            AlifeRecord::new(1, "[0]")
                .with_origin_time(0.0)
                .with_edge_length(7.0),
        ])
        .unwrap();
        assert_eq!(edge_lengths(&forest), vec![Some(0.5), Some(7.0)]);
    }

    struct Visits(Vec<Visit>);

    impl TreeTraversal for Visits {
        fn traverse(&self) -> Result<Vec<Visit>, ConversionError> {
            Ok(self.0.clone())
        }
    }

    fn visit(parent: Option<usize>, origin_time: Option<f64>, edge_length: Option<f64>) -> Visit {
        Visit {
            parent,
            data: NodeData {
                origin_time,
                edge_length,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn nan_root_origin_time() {
        let mut forest = Forest::from_traversal(&Visits(vec![visit(None, Some(f64::NAN), None)]))
            .unwrap();
        assert!(matches!(
            forest.setup_edge_lengths(),
            Err(ConversionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn origin_times_from_edge_lengths() {
        let forest = Forest::from_traversal(&Visits(vec![
            visit(None, None, Some(1.0)),
            visit(Some(0), None, Some(2.0)),
            visit(Some(1), None, None),
            visit(Some(0), Some(10.0), Some(3.0)),
            visit(Some(3), None, Some(f64::NAN)),
            visit(None, None, None),
        ]))
        .unwrap();

        assert_eq!(
            origin_times(&forest),
            vec![Some(1.0), Some(3.0), None, Some(10.0), None, Some(0.0)]
        );
    }

    #[test]
    fn origin_times_need_an_edge_length() {
        let forest = Forest::from_traversal(&Visits(vec![
            visit(None, None, None),
            visit(Some(0), None, None),
        ]))
        .unwrap();
        assert_eq!(origin_times(&forest), vec![None, None]);
    }
}
