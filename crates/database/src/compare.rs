//! Loose comparison of query results, for grading submitted answers.
//!
//! Two results match when the submitted one contains, under some renaming
//! and reordering of columns, the same multiset of rows as the gold one.
//! Extra submitted columns are ignored; ints and integral floats compare
//! equal; floats are compared after rounding to a precision derived from
//! epsilon.

use std::collections::HashSet;

use crate::result::{CellValue, QueryResult};

/// Default float tolerance.
pub const DEFAULT_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    #[error("Empty result returned from gold query")]
    EmptyGold,
}

/// Decimal places that make values within `epsilon` normalise identically.
fn epsilon_to_precision(epsilon: f64) -> usize {
    if epsilon <= 0.0 || !epsilon.is_finite() {
        return 9;
    }
    (-(epsilon.log10().floor()) - 1.0).max(0.0) as usize
}

fn normalize(value: &CellValue, precision: usize) -> String {
    match value {
        CellValue::Null => "__NULL__".into(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Real(f) if f.is_nan() => "__NAN__".into(),
        CellValue::Real(f) if *f == f64::INFINITY => "__INF__".into(),
        CellValue::Real(f) if *f == f64::NEG_INFINITY => "__NEG_INF__".into(),
        CellValue::Real(f) => {
            let scale = 10f64.powi(precision as i32);
            let rounded = (f * scale).round() / scale;
            if rounded == rounded.trunc() {
                if rounded == 0.0 {
                    "0".into()
                } else {
                    format!("{rounded:.0}")
                }
            } else {
                let s = format!("{rounded:.precision$}");
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            }
        }
    }
}

fn column_multiset(result: &QueryResult, index: usize, precision: usize) -> Vec<String> {
    let mut values: Vec<String> = result.column(index).map(|v| normalize(v, precision)).collect();
    values.sort();
    values
}

/// Compare a gold result against a submitted one.
///
/// Fails fast on differing row counts or too few submitted columns.
/// An empty gold result is an error rather than a match.
pub fn loosely_compare(
    gold: &QueryResult,
    submitted: &QueryResult,
    epsilon: f64,
) -> Result<bool, CompareError> {
    if gold.row_count() != submitted.row_count() {
        return Ok(false);
    }
    if gold.is_empty() {
        return Err(CompareError::EmptyGold);
    }
    if submitted.column_count() < gold.column_count() {
        return Ok(false);
    }

    let precision = epsilon_to_precision(epsilon);

    let submitted_sets: Vec<Vec<String>> = (0..submitted.column_count())
        .map(|i| column_multiset(submitted, i, precision))
        .collect();

    // Candidate submitted columns for each gold column
    let mut candidates: Vec<Vec<usize>> = Vec::with_capacity(gold.column_count());
    for g in 0..gold.column_count() {
        let gold_set = column_multiset(gold, g, precision);
        let matching: Vec<usize> = submitted_sets
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == gold_set)
            .map(|(i, _)| i)
            .collect();
        if matching.is_empty() {
            return Ok(false);
        }
        candidates.push(matching);
    }

    let mut gold_rows: Vec<Vec<String>> = gold
        .rows
        .iter()
        .map(|r| r.iter().map(|v| normalize(v, precision)).collect())
        .collect();
    gold_rows.sort();

    let mut assignment = Vec::with_capacity(candidates.len());
    let mut used = HashSet::new();
    Ok(try_assignments(
        &candidates,
        &mut assignment,
        &mut used,
        &gold_rows,
        submitted,
        precision,
    ))
}

/// Depth-first search over injective gold→submitted column mappings.
fn try_assignments(
    candidates: &[Vec<usize>],
    assignment: &mut Vec<usize>,
    used: &mut HashSet<usize>,
    gold_rows: &[Vec<String>],
    submitted: &QueryResult,
    precision: usize,
) -> bool {
    if assignment.len() == candidates.len() {
        let mut rows: Vec<Vec<String>> = submitted
            .rows
            .iter()
            .map(|r| assignment.iter().map(|&c| normalize(&r[c], precision)).collect())
            .collect();
        rows.sort();
        return rows == gold_rows;
    }

    for &c in &candidates[assignment.len()] {
        if !used.insert(c) {
            continue;
        }
        assignment.push(c);
        let found = try_assignments(candidates, assignment, used, gold_rows, submitted, precision);
        assignment.pop();
        used.remove(&c);
        if found {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use CellValue::*;

    fn result(columns: &[&str], rows: Vec<Vec<CellValue>>) -> QueryResult {
        QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn precision_from_epsilon() {
        assert_eq!(epsilon_to_precision(1e-4), 3);
        assert_eq!(epsilon_to_precision(1e-6), 5);
        assert_eq!(epsilon_to_precision(0.5), 0);
        assert_eq!(epsilon_to_precision(0.0), 9);
    }

    #[test]
    fn normalisation_markers_and_rounding() {
        assert_eq!(normalize(&Null, 3), "__NULL__");
        assert_eq!(normalize(&Real(f64::NAN), 3), "__NAN__");
        assert_eq!(normalize(&Real(f64::NEG_INFINITY), 3), "__NEG_INF__");
        assert_eq!(normalize(&Real(2.0), 3), "2");
        assert_eq!(normalize(&Integer(2), 3), "2");
        assert_eq!(normalize(&Real(0.1 + 0.2), 3), "0.3");
        assert_eq!(normalize(&Real(1.23456), 3), "1.235");
        assert_eq!(normalize(&Real(-0.0001), 3), "0");
    }

    #[test]
    fn reordered_renamed_columns_with_extras_match() {
        let gold = result(
            &["carrier", "n"],
            vec![vec![Text("AA".into()), Integer(3)], vec![Text("DL".into()), Integer(5)]],
        );
        let submitted = result(
            &["total", "extra", "code"],
            vec![
                vec![Real(5.0), Text("x".into()), Text("DL".into())],
                vec![Real(3.0), Text("y".into()), Text("AA".into())],
            ],
        );
        assert_eq!(loosely_compare(&gold, &submitted, DEFAULT_EPSILON), Ok(true));
    }

    #[test]
    fn row_count_and_width_mismatch_fail() {
        let gold = result(&["a", "b"], vec![vec![Integer(1), Integer(2)]]);
        let fewer_cols = result(&["a"], vec![vec![Integer(1)]]);
        let more_rows = result(&["a", "b"], vec![vec![Integer(1), Integer(2)], vec![Integer(1), Integer(2)]]);
        assert_eq!(loosely_compare(&gold, &fewer_cols, DEFAULT_EPSILON), Ok(false));
        assert_eq!(loosely_compare(&gold, &more_rows, DEFAULT_EPSILON), Ok(false));
    }

    #[test]
    fn empty_gold_is_an_error() {
        let gold = result(&["a"], vec![]);
        let submitted = result(&["a"], vec![]);
        assert_eq!(
            loosely_compare(&gold, &submitted, DEFAULT_EPSILON),
            Err(CompareError::EmptyGold)
        );
    }

    #[test]
    fn float_tolerance() {
        let gold = result(&["avg"], vec![vec![Real(12.34561)]]);
        let close = result(&["avg"], vec![vec![Real(12.34558)]]);
        let far = result(&["avg"], vec![vec![Real(12.4)]]);
        assert_eq!(loosely_compare(&gold, &close, DEFAULT_EPSILON), Ok(true));
        assert_eq!(loosely_compare(&gold, &far, DEFAULT_EPSILON), Ok(false));
    }

    #[test]
    fn identical_column_multisets_need_correct_pairing() {
        // Both gold columns hold {1, 2}; only one pairing keeps the rows intact.
        let gold = result(
            &["x", "y"],
            vec![vec![Integer(1), Integer(2)], vec![Integer(2), Integer(1)]],
        );
        let swapped = result(
            &["p", "q"],
            vec![vec![Integer(2), Integer(1)], vec![Integer(1), Integer(2)]],
        );
        assert_eq!(loosely_compare(&gold, &swapped, DEFAULT_EPSILON), Ok(true));

        let broken = result(
            &["p", "q"],
            vec![vec![Integer(1), Integer(1)], vec![Integer(2), Integer(2)]],
        );
        assert_eq!(loosely_compare(&gold, &broken, DEFAULT_EPSILON), Ok(false));
    }

    #[test]
    fn one_submitted_column_cannot_serve_two_gold_columns() {
        let gold = result(&["a", "b"], vec![vec![Integer(7), Integer(7)]]);
        let submitted = result(&["a", "other"], vec![vec![Integer(7), Integer(8)]]);
        assert_eq!(loosely_compare(&gold, &submitted, DEFAULT_EPSILON), Ok(false));
    }
}
