//! Translation between widget row positions and stable example ids.
//!
//! The widget only knows positions in the sorted row list; the services only
//! know ids. Positions to ids index the order directly. Ids to positions go
//! through a [`PositionIndex`] built once per order.

use std::collections::HashMap;

/// Id to position lookup for one row order.
pub type PositionIndex = HashMap<String, usize>;

pub fn index_positions(order: &[String]) -> PositionIndex {
    order
        .iter()
        .enumerate()
        .map(|(position, id)| (id.clone(), position))
        .collect()
}

/// Position of `id`, if present.
pub fn position_of(index: &PositionIndex, id: &str) -> Option<usize> {
    index.get(id).copied()
}

/// Id at `position`, if in range.
pub fn id_at(order: &[String], position: usize) -> Option<&str> {
    order.get(position).map(String::as_str)
}

/// Ids for the given positions, silently dropping out-of-range positions.
pub fn ids_at(order: &[String], positions: &[usize]) -> Vec<String> {
    positions
        .iter()
        .filter_map(|&p| id_at(order, p))
        .map(String::from)
        .collect()
}

/// Positions of the given ids, skipping ids not in the current order.
pub fn positions_of<'a>(index: &PositionIndex, ids: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    let mut positions: Vec<usize> = ids
        .into_iter()
        .filter_map(|id| position_of(index, id))
        .collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        ["r1", "r2", "r3"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn round_trips_every_position() {
        let order = order();
        let index = index_positions(&order);
        for position in 0..order.len() {
            let id = id_at(&order, position).unwrap();
            assert_eq!(position_of(&index, id), Some(position));
        }
    }

    #[test]
    fn unknown_ids_and_positions_are_dropped() {
        let order = order();
        let index = index_positions(&order);
        assert_eq!(position_of(&index, "nope"), None);
        assert_eq!(id_at(&order, 3), None);
        assert_eq!(ids_at(&order, &[2, 7, 0]), vec!["r3", "r1"]);
        assert_eq!(positions_of(&index, ["r3", "x", "r1", "r3"]), vec![0, 2]);
    }
}
