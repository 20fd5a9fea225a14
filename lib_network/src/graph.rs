/// Overlay graph construction. Mirrors the reference network's
/// `generate_network`/`check_graph`: first try a random 4-to-8-regular
/// graph, then fall back to a ring-with-chords if that attempt left the
/// graph disconnected.
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Samples `k = uniform{4..8}` (capped at `n-1`) distinct neighbors for
/// every node and adds each edge in both directions.
pub fn generate_random_graph<R: Rng>(n: usize, rng: &mut R) -> Vec<HashSet<usize>> {
    let mut adjacency = vec![HashSet::new(); n];
    for i in 0..n {
        let k = rng.gen_range(4..=8).min(n.saturating_sub(1));
        let mut candidates: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        candidates.shuffle(rng);
        for &j in candidates.iter().take(k) {
            adjacency[i].insert(j);
            adjacency[j].insert(i);
        }
    }
    adjacency
}

/// Depth-first reachability check from node 0. Returns `true` iff every
/// node in `0..n` is reachable, i.e. the graph is connected.
pub fn is_connected(adjacency: &[HashSet<usize>]) -> bool {
    let n = adjacency.len();
    if n == 0 {
        return true;
    }
    let mut visited = vec![false; n];
    let mut stack = vec![0usize];
    visited[0] = true;
    while let Some(node) = stack.pop() {
        for &neighbor in &adjacency[node] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                stack.push(neighbor);
            }
        }
    }
    visited.into_iter().all(|v| v)
}

/// A 4-regular connected fallback: node `i` connects to `i±1` and `i±2`
/// (mod `n`). Used whenever the random attempt above leaves the graph
/// disconnected.
pub fn ring_with_chords(n: usize) -> Vec<HashSet<usize>> {
    let mut adjacency = vec![HashSet::new(); n];
    if n <= 1 {
        return adjacency;
    }
    for i in 0..n {
        for offset in [-2i64, -1, 1, 2] {
            let j = (((i as i64 + offset) % n as i64) + n as i64) % n as i64;
            let j = j as usize;
            if j != i {
                adjacency[i].insert(j);
                adjacency[j].insert(i);
            }
        }
    }
    adjacency
}

/// Builds the overlay, falling back to `ring_with_chords` if the random
/// attempt is not connected.
pub fn build_overlay<R: Rng>(n: usize, rng: &mut R) -> Vec<HashSet<usize>> {
    let adjacency = generate_random_graph(n, rng);
    if is_connected(&adjacency) {
        adjacency
    } else {
        ring_with_chords(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_pcg::Pcg32;

    #[test]
    fn ring_with_chords_is_connected_for_small_n() {
        for n in [4, 5, 8, 20] {
            let adjacency = ring_with_chords(n);
            assert!(is_connected(&adjacency), "n={n} should be connected");
        }
    }

    #[test]
    fn ring_with_chords_is_four_regular() {
        let adjacency = ring_with_chords(10);
        for neighbors in &adjacency {
            assert_eq!(neighbors.len(), 4);
        }
    }

    #[test]
    fn build_overlay_is_always_connected() {
        let mut rng = Pcg32::new(42, 54);
        for n in [5, 10, 30] {
            let adjacency = build_overlay(n, &mut rng);
            assert!(is_connected(&adjacency));
        }
    }

    #[test]
    fn single_peer_graph_has_no_edges_and_is_connected() {
        let adjacency = ring_with_chords(1);
        assert!(adjacency[0].is_empty());
        assert!(is_connected(&adjacency));
    }
}
