//! Operations over sets of records: candidate ranking, de-duplication and
//! subset elimination.

use std::cmp::Ordering;

use crate::contextual_range::ContextualRange;
use crate::record::Record;

/// Added to a candidate's confidence before dividing, so zero-confidence
/// candidates still rank by distance.
pub const CONFIDENCE_EPSILON: f64 = 0.01;

/// A record found `distance` away from the record being resolved.
#[derive(Debug, Clone)]
pub struct MergeCandidate<R> {
    pub distance: ContextualRange,
    pub record: R,
}

impl<R> MergeCandidate<R> {
    pub fn new(distance: ContextualRange, record: R) -> Self {
        Self { distance, record }
    }
}

/// Order candidates nearest first.
///
/// With `adjust_by_confidence` the key is `distance / (confidence + 0.01)`, so a
/// confident candidate may outrank a slightly nearer doubtful one. The sort is
/// stable: equal keys keep their collection order.
pub fn sort_merge_candidates<R>(
    candidates: &mut Vec<MergeCandidate<R>>,
    confidence_of: impl Fn(&R) -> f64,
    adjust_by_confidence: bool,
) {
    if !adjust_by_confidence {
        candidates.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        return;
    }
    let mut keyed: Vec<(ContextualRange, MergeCandidate<R>)> = candidates
        .drain(..)
        .map(|c| {
            let weight = confidence_of(&c.record) + CONFIDENCE_EPSILON;
            (c.distance / weight, c)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    candidates.extend(keyed.into_iter().map(|(_, c)| c));
}

/// Append `record` unless a structurally equal record is already present.
pub fn dedup_push(records: &mut Vec<Record>, record: Record) -> bool {
    if records.contains(&record) {
        return false;
    }
    records.push(record);
    true
}

/// Drop every record that is a subset of another.
///
/// Records are grouped by type in order of first appearance and each group
/// is ordered by total confidence, highest first. With `strict` only proper
/// subsets go; otherwise duplicates also collapse to their first,
/// highest-confidence copy.
pub fn remove_subsets(records: &mut Vec<Record>, strict: bool) {
    let mut groups: Vec<Vec<Record>> = Vec::new();
    for record in records.drain(..) {
        match groups
            .iter_mut()
            .find(|group| group[0].type_id() == record.type_id())
        {
            Some(group) => group.push(record),
            None => groups.push(vec![record]),
        }
    }

    for group in groups {
        let mut scored: Vec<(f64, Record)> =
            group.into_iter().map(|r| (r.total_confidence(), r)).collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        let group: Vec<Record> = scored.into_iter().map(|(_, r)| r).collect();

        let keep: Vec<bool> = (0..group.len())
            .map(|i| {
                !(0..group.len()).any(|j| {
                    if i == j || !group[i].is_subset(&group[j]) {
                        return false;
                    }
                    if group[i] == group[j] {
                        !strict && j < i
                    } else {
                        true
                    }
                })
            })
            .collect();

        for (record, keep) in group.into_iter().zip(keep) {
            if keep {
                records.push(record);
            } else {
                log::debug!("removed subset {}", record.type_name());
            }
        }
    }
}

/// Drop top-level records that also appear nested inside another record.
pub fn remove_used_subrecords(records: &mut Vec<Record>) {
    let nested: Vec<Record> = records
        .iter()
        .flat_map(|r| r.flatten_instance().into_iter().skip(1).cloned())
        .collect();
    records.retain(|r| !nested.contains(r));
}

/// Greedily merge later records into earlier ones they can merge with.
/// Absorbed records are dropped from the result.
pub fn merge_list_contextual(records: Vec<Record>, distance: ContextualRange) -> Vec<Record> {
    let mut used = vec![false; records.len()];
    let mut merged = Vec::with_capacity(records.len());
    for i in 0..records.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut current = records[i].clone();
        for j in (i + 1)..records.len() {
            if used[j] {
                continue;
            }
            if current.can_merge_with(&records[j]) && current.merge_contextual(&records[j], distance) {
                used[j] = true;
            }
        }
        merged.push(current);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_distance() {
        let mut candidates = vec![
            MergeCandidate::new(ContextualRange::section(), "far"),
            MergeCandidate::new(ContextualRange::paragraph() * 3.0, "middle"),
            MergeCandidate::new(ContextualRange::paragraph(), "near"),
            MergeCandidate::new(ContextualRange::paragraph(), "near-second"),
        ];
        sort_merge_candidates(&mut candidates, |_| 1.0, false);
        let order: Vec<&str> = candidates.iter().map(|c| c.record).collect();
        assert_eq!(order, vec!["near", "near-second", "middle", "far"]);
    }

    #[test]
    fn test_sort_adjusted_by_confidence() {
        let mut candidates = vec![
            MergeCandidate::new(ContextualRange::paragraph(), ("doubtful", 0.1)),
            MergeCandidate::new(ContextualRange::paragraph() * 2.0, ("confident", 0.99)),
        ];
        sort_merge_candidates(&mut candidates, |(_, c)| *c, true);
        assert_eq!(candidates[0].record.0, "confident");
    }
}
