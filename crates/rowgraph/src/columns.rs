//! Column allocation: assigns result columns to fields of the mapper tree.
//!
//! Single greedy pass, parents before children. Columns are visited in result
//! order; each goes to the first field (declaration order) whose candidate
//! spellings contain the column name, and is then gone for every node visited
//! later. Columns nobody claims are returned; they are not an error.

use crate::naming::column_candidates;
use crate::plan::{ClaimedColumn, FieldTarget, MapperNode};
use rowgraph_value::ColumnMeta;
use std::collections::{BTreeMap, BTreeSet};

/// Populates `claimed_columns`, `sorted_column_indexes` and `ancestor_columns`
/// across the tree. Returns the names of unclaimed columns in result order.
pub fn allocate_columns(root: &mut MapperNode, columns: &[ColumnMeta]) -> Vec<String> {
    let mut pool: BTreeMap<usize, String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| (index, column.name.clone()))
        .collect();
    let mut taken = BTreeSet::new();
    allocate(root, &mut pool, &mut taken, &BTreeMap::new());
    pool.into_values().collect()
}

fn allocate(
    node: &mut MapperNode,
    pool: &mut BTreeMap<usize, String>,
    taken: &mut BTreeSet<String>,
    inherited: &BTreeMap<String, ClaimedColumn>,
) {
    let targets = claim_targets(node);

    let mut claimed: BTreeMap<String, ClaimedColumn> = BTreeMap::new();
    pool.retain(|&column_index, name| {
        // A name is claimed once per tree; later duplicates stay unclaimed.
        if taken.contains(name.as_str()) {
            return true;
        }
        match targets
            .iter()
            .find(|(_, candidates)| candidates.contains(name.as_str()))
        {
            Some((slot, _)) => {
                taken.insert(name.clone());
                claimed.insert(
                    name.clone(),
                    ClaimedColumn {
                        column_index,
                        slot: *slot,
                    },
                );
                false
            }
            None => true,
        }
    });

    let mut sorted: Vec<usize> = claimed.values().map(|c| c.column_index).collect();
    sorted.sort_unstable();

    let mut for_children = inherited.clone();
    for (name, column) in &claimed {
        for_children.insert(name.clone(), *column);
    }

    node.ancestor_columns = inherited.clone();
    node.claimed_columns = claimed;
    node.sorted_column_indexes = sorted;

    for child in node.children.values_mut() {
        allocate(child, pool, taken, &for_children);
    }
}

/// Claimable slots of a node with their candidate spellings, in slot order.
fn claim_targets(node: &MapperNode) -> Vec<(usize, BTreeSet<String>)> {
    if node.is_basic {
        // A basic node is addressed by its own field name.
        return match node.ancestor_path.split_last() {
            Some((name, ancestors)) => vec![(0, column_candidates(name, ancestors))],
            None => Vec::new(),
        };
    }
    node.fields
        .iter()
        .filter(|(_, field)| matches!(field.target, FieldTarget::Scalar { .. }))
        .map(|(slot, field)| (*slot, column_candidates(&field.name, &node.ancestor_path)))
        .collect()
}
