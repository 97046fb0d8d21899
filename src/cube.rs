use std::collections::BTreeMap;

use serde::Serialize;

/// A recursive, default-filled mapping keyed by the active grouping
/// dimension values and terminating in a `date → value` leaf. Built fresh
/// per request, merged once with store rows and flattened once into the
/// response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Cube<V> {
    Leaf(BTreeMap<String, V>),
    Branch(BTreeMap<String, Cube<V>>),
}

/// One sparse result row from the store: the active dimension values in
/// nesting order, the date bucket and the aggregated value.
#[derive(Debug, Clone)]
pub struct ResultRow<V> {
    pub keys: Vec<String>,
    pub date: String,
    pub value: V,
}

/// The flattened response tree: date-ordered series at the leaves, one
/// `{id, …}` node per grouping value above them.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatCube<V> {
    Series(Vec<V>),
    Groups(Vec<FlatNode<V>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<V> {
    pub id: String,
    pub cube: FlatCube<V>,
}

impl<V: Clone> Cube<V> {
    /// Builds the gap-free cube: one nesting level per entry of `levels`
    /// (primary dimension first), then every date bucket mapped to the
    /// default value.
    pub fn build_empty(levels: &[Vec<String>], dates: &[String], default: &V) -> Self {
        match levels.split_first() {
            None => {
                let mut leaf = BTreeMap::new();
                for date in dates {
                    leaf.insert(date.clone(), default.clone());
                }
                Cube::Leaf(leaf)
            }
            Some((keys, rest)) => {
                let mut branch = BTreeMap::new();
                for key in keys {
                    branch.insert(key.clone(), Cube::build_empty(rest, dates, default));
                }
                Cube::Branch(branch)
            }
        }
    }

    /// Overwrites the entry at the row's dimension path and date
    /// (last-write-wins). Returns `false` without modifying the cube when a
    /// dimension value or date is outside the pre-built structure, so stale
    /// codes returned by the store are dropped rather than panicking the
    /// request.
    pub fn merge_row(&mut self, row: &ResultRow<V>) -> bool {
        let mut cursor = self;
        for key in &row.keys {
            cursor = match cursor {
                Cube::Branch(branch) => match branch.get_mut(key) {
                    Some(child) => child,
                    None => return false,
                },
                Cube::Leaf(_) => return false,
            };
        }
        match cursor {
            Cube::Leaf(leaf) => match leaf.get_mut(&row.date) {
                Some(slot) => {
                    *slot = row.value.clone();
                    true
                }
                None => false,
            },
            Cube::Branch(_) => false,
        }
    }

    /// Flattens each leaf into a series ordered by its date keys
    /// (lexicographic, which is chronological for `YYYY-MM-DD`) and wraps
    /// nested levels into `{id, …}` nodes.
    pub fn flatten(self) -> FlatCube<V> {
        match self {
            // BTreeMap iteration is already key-ordered.
            Cube::Leaf(leaf) => FlatCube::Series(leaf.into_values().collect()),
            Cube::Branch(branch) => FlatCube::Groups(
                branch
                    .into_iter()
                    .map(|(id, child)| FlatNode {
                        id,
                        cube: child.flatten(),
                    })
                    .collect(),
            ),
        }
    }
}

/// One per-signal-type series extracted from a leaf of blob values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    pub id: String,
    pub data: Vec<f64>,
}

fn blob_value(blob: &str, signal_type: &str) -> f64 {
    let parsed: serde_json::Value = match serde_json::from_str(blob) {
        Ok(value) => value,
        Err(_) => return 0.0,
    };
    match parsed.get(signal_type) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Explodes a date-ordered series of per-signal-type JSON blobs into one
/// numeric series per requested type, defaulting missing types to 0.0.
pub fn signal_series(blobs: &[String], types: &[String]) -> Vec<SignalSeries> {
    types
        .iter()
        .map(|signal_type| SignalSeries {
            id: signal_type.clone(),
            data: blobs
                .iter()
                .map(|blob| blob_value(blob, signal_type))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merge_fills_only_the_touched_cell() {
        let levels = vec![strings(&["sourceA", "sourceB"])];
        let dates = strings(&["2024-01-01", "2024-01-02"]);
        let mut cube = Cube::build_empty(&levels, &dates, &0.0);

        let merged = cube.merge_row(&ResultRow {
            keys: strings(&["sourceA"]),
            date: "2024-01-01".to_string(),
            value: 5.0,
        });
        assert!(merged);

        match cube.flatten() {
            FlatCube::Groups(nodes) => {
                assert_eq!(nodes.len(), 2);
                assert_eq!(nodes[0].id, "sourceA");
                assert_eq!(nodes[0].cube, FlatCube::Series(vec![5.0, 0.0]));
                assert_eq!(nodes[1].id, "sourceB");
                assert_eq!(nodes[1].cube, FlatCube::Series(vec![0.0, 0.0]));
            }
            FlatCube::Series(_) => panic!("expected one grouping level"),
        }
    }

    #[test]
    fn remerge_is_last_write_wins() {
        let dates = strings(&["2024-01-01", "2024-01-02"]);
        let mut cube = Cube::build_empty(&[], &dates, &0.0);
        let row = ResultRow {
            keys: vec![],
            date: "2024-01-02".to_string(),
            value: 3.0,
        };
        assert!(cube.merge_row(&row));
        assert!(cube.merge_row(&row));
        assert_eq!(cube.flatten(), FlatCube::Series(vec![0.0, 3.0]));
    }

    #[test]
    fn out_of_range_date_is_dropped() {
        let dates = strings(&["2024-01-01", "2024-01-02"]);
        let mut cube = Cube::build_empty(&[], &dates, &0.0);
        let merged = cube.merge_row(&ResultRow {
            keys: vec![],
            date: "2024-01-09".to_string(),
            value: 4.0,
        });
        assert!(!merged);
        assert_eq!(cube.flatten(), FlatCube::Series(vec![0.0, 0.0]));
    }

    #[test]
    fn unknown_dimension_value_is_dropped() {
        let levels = vec![strings(&["sourceA"])];
        let dates = strings(&["2024-01-01"]);
        let mut cube = Cube::build_empty(&levels, &dates, &0.0);
        let merged = cube.merge_row(&ResultRow {
            keys: strings(&["staleSource"]),
            date: "2024-01-01".to_string(),
            value: 9.0,
        });
        assert!(!merged);
    }

    #[test]
    fn two_level_cube_nests_primary_then_secondary() {
        let levels = vec![strings(&["src"]), strings(&["catA", "catB"])];
        let dates = strings(&["2024-01-01"]);
        let mut cube = Cube::build_empty(&levels, &dates, &0.0);
        assert!(cube.merge_row(&ResultRow {
            keys: strings(&["src", "catB"]),
            date: "2024-01-01".to_string(),
            value: 7.0,
        }));

        match cube.flatten() {
            FlatCube::Groups(sources) => match &sources[0].cube {
                FlatCube::Groups(categories) => {
                    assert_eq!(categories[0].cube, FlatCube::Series(vec![0.0]));
                    assert_eq!(categories[1].cube, FlatCube::Series(vec![7.0]));
                }
                FlatCube::Series(_) => panic!("expected nested categories"),
            },
            FlatCube::Series(_) => panic!("expected nested sources"),
        }
    }

    #[test]
    fn signal_blobs_explode_to_per_type_series() {
        let blobs = strings(&[r#"{"101": "4", "201": 2.5}"#, "{}"]);
        let types = strings(&["101", "201", "202"]);
        let series = signal_series(&blobs, &types);
        assert_eq!(series[0].data, vec![4.0, 0.0]);
        assert_eq!(series[1].data, vec![2.5, 0.0]);
        assert_eq!(series[2].data, vec![0.0, 0.0]);
    }
}
