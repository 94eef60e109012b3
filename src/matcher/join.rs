//! Index-level full outer join.

use std::collections::HashMap;
use std::hash::Hash;

/// One output row of a join: left index, right index, or both.
pub(crate) type JoinedIndices = (Option<usize>, Option<usize>);

/// Full outer join over two key columns.
///
/// `None` keys never match anything. Equal keys produce every left/right pair.
/// Output order is left rows in input order (each followed by its matches in
/// right input order), then unmatched right rows in input order.
pub(crate) fn full_outer_join<K: Eq + Hash>(
    left_keys: &[Option<K>],
    right_keys: &[Option<K>],
) -> Vec<JoinedIndices> {
    let mut right_index: HashMap<&K, Vec<usize>> = HashMap::new();
    for (j, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            right_index.entry(key).or_default().push(j);
        }
    }

    let mut right_matched = vec![false; right_keys.len()];
    let mut rows = Vec::with_capacity(left_keys.len().max(right_keys.len()));

    for (i, key) in left_keys.iter().enumerate() {
        match key.as_ref().and_then(|k| right_index.get(k)) {
            Some(matches) => {
                for &j in matches {
                    right_matched[j] = true;
                    rows.push((Some(i), Some(j)));
                }
            }
            None => rows.push((Some(i), None)),
        }
    }

    rows.extend(
        right_matched
            .iter()
            .enumerate()
            .filter(|(_, matched)| !**matched)
            .map(|(j, _)| (None, Some(j))),
    );

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_outer_join_keeps_unmatched_rows() {
        let left = keys(&[Some("a"), Some("b"), None]);
        let right = keys(&[Some("b"), Some("c"), None]);

        assert_eq!(
            full_outer_join(&left, &right),
            vec![
                (Some(0), None),
                (Some(1), Some(0)),
                (Some(2), None),
                (None, Some(1)),
                (None, Some(2)),
            ]
        );
    }

    #[test]
    fn test_many_to_many_produces_every_pair() {
        let left = keys(&[Some("k"), Some("k")]);
        let right = keys(&[Some("k"), Some("k")]);

        assert_eq!(
            full_outer_join(&left, &right),
            vec![
                (Some(0), Some(0)),
                (Some(0), Some(1)),
                (Some(1), Some(0)),
                (Some(1), Some(1)),
            ]
        );
    }

    #[test]
    fn test_empty_sides() {
        let empty: Vec<Option<String>> = Vec::new();
        assert!(full_outer_join(&empty, &empty).is_empty());
        assert_eq!(
            full_outer_join(&keys(&[Some("x")]), &empty),
            vec![(Some(0), None)]
        );
    }
}
