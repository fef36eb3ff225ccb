//! Placement Policy (spec §4.3): picks replica targets from the currently
//! active node list. No rack/zone awareness, no load-decay weighting.

pub mod error;

use dstore_types::{Node, NodeId};
pub use error::PlacementError;

/// Chooses `needed` targets from `active_nodes`, excluding any node id
/// already holding a replica of this file.
///
/// `active_nodes` is expected to already be sorted by `available_space`
/// descending (as returned by `MetadataStore::get_active_nodes`); this
/// function re-sorts defensively so callers don't have to care.
pub fn choose_targets(
    active_nodes: &[Node],
    excluded: &[NodeId],
    needed: u32,
) -> Result<Vec<Node>, PlacementError> {
    let mut candidates: Vec<&Node> = active_nodes
        .iter()
        .filter(|n| !excluded.contains(&n.node_id))
        .collect();
    // Stable sort: nodes with equal available_space keep their relative
    // (insertion) order.
    candidates.sort_by(|a, b| b.available_space.cmp(&a.available_space));

    if (candidates.len() as u32) < needed {
        return Err(PlacementError::NotEnoughNodes {
            needed,
            available: candidates.len() as u32,
        });
    }

    Ok(candidates
        .into_iter()
        .take(needed as usize)
        .cloned()
        .collect())
}
