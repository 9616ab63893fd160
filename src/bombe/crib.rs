//! Crib alignment and menu construction.

use crate::alphabet::Letter;
use crate::bombe::menu::BombeMenu;
use tracing::debug;

pub const MAX_CRIB_LEN: usize = 50;

/// Menus scoring above this are flagged as likely to produce many false
/// stops (higher means worse; the score estimates expected stops).
pub const BAD_SCORE: f64 = 1000.0;

/// Expected-stop estimates per link count for a subgraph with no closures.
/// Tiers descend from 10M (an empty menu constrains nothing) to the 0.001
/// floor at 19+ links; each closure further divides by 26.
const LINK_STOP_ESTIMATES: [f64; 20] = [
    10_000_000.0,
    1_600_000.0,
    800_000.0,
    400_000.0,
    200_000.0,
    100_000.0,
    50_000.0,
    25_000.0,
    12_000.0,
    6_000.0,
    3_000.0,
    1_500.0,
    700.0,
    350.0,
    150.0,
    70.0,
    30.0,
    10.0,
    3.0,
    0.001,
];

pub fn bombe_score(closures: usize, links: usize) -> f64 {
    let mut score = LINK_STOP_ESTIMATES[links.min(LINK_STOP_ESTIMATES.len() - 1)];
    for _ in 0..closures {
        score /= 26.0;
    }
    score.max(0.001)
}

/// Next crib alignment at or after `from` where no ciphertext letter equals
/// the facing crib letter: the machine never maps a letter to itself, so
/// such alignments are impossible. Wildcard crib letters (negative) match
/// anywhere.
pub fn next_valid_position(
    ciphertext: &[Letter],
    clen: usize,
    crib: &[Letter],
    crlen: usize,
    from: usize,
) -> Option<usize> {
    let mut pos = from;
    while pos + crlen <= clen {
        if (0..crlen).all(|i| crib[i] < 0 || ciphertext[pos + i] != crib[i]) {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// A crib placed at one ciphertext position, with its derived menu.
#[derive(Debug, Clone)]
pub struct BombeCrib {
    pub menu: BombeMenu,
}

impl BombeCrib {
    /// Builds the menu for a crib at `position`: the 26x26 link table keyed
    /// by earliest alignment, partitioned into connected subgraphs with
    /// closure counts, scored, and ordered for fast failure.
    pub fn new(ciphertext: &[Letter], crib: &[Letter], position: usize) -> BombeCrib {
        let crlen = crib.len();
        let mut menu = BombeMenu::new(position, crib);

        // links[c][p]: earliest absolute position where ciphertext letter c
        // faces crib letter p.
        let mut links = [[-1i32; 26]; 26];
        for i in 0..crlen {
            let p = crib[i];
            if p < 0 {
                continue;
            }
            let c = ciphertext[position + i];
            if links[c as usize][p as usize] < 0 {
                links[c as usize][p as usize] = (position + i) as i32;
            }
        }

        let has_edge = |a: usize, b: usize| links[a][b] >= 0 || links[b][a] >= 0;

        let mut claimed = [false; 26];
        for start in 0..26 {
            if claimed[start] || !(0..26).any(|j| j != start && has_edge(start, j)) {
                continue;
            }

            let mut usage = [0u32; 26];
            Self::traverse(&has_edge, &mut usage, start, None);

            let mut letters = 0;
            let mut extra_visits = 0;
            for (i, &u) in usage.iter().enumerate() {
                if u > 0 {
                    claimed[i] = true;
                    letters += 1;
                    extra_visits += (u - 1) as usize;
                }
            }
            // Each closure is discovered once from each direction.
            let closures = extra_visits / 2;

            if letters >= 2 {
                menu.add_subgraph(&links, closures, &usage);
            }
        }

        menu.score = bombe_score(menu.total_closures, menu.total_links);
        menu.sort_subgraphs();
        debug!(
            position,
            subgraphs = menu.sub_graphs.len(),
            closures = menu.total_closures,
            links = menu.total_links,
            score = menu.score,
            "bombe menu built"
        );
        BombeCrib { menu }
    }

    /// Depth-first traversal counting visits per letter. Recursion stops at
    /// a letter already seen (that second visit marks a closure) and never
    /// walks back across the arrival edge.
    fn traverse(
        has_edge: &dyn Fn(usize, usize) -> bool,
        usage: &mut [u32; 26],
        letter: usize,
        arrived_via: Option<(usize, usize)>,
    ) {
        usage[letter] += 1;
        if usage[letter] > 1 {
            return;
        }
        for nb in 0..26 {
            if nb == letter || !has_edge(letter, nb) {
                continue;
            }
            let edge = (letter.min(nb), letter.max(nb));
            if arrived_via == Some(edge) {
                continue;
            }
            Self::traverse(has_edge, usage, nb, Some(edge));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::to_letters;

    #[test]
    fn score_table_fixed_points() {
        assert_eq!(bombe_score(0, 0), 10_000_000.0);
        assert_eq!(bombe_score(0, 1), 1_600_000.0);
        assert_eq!(bombe_score(0, 19), 0.001);
        assert_eq!(bombe_score(0, 30), 0.001);
        assert_eq!(bombe_score(2, 1), 1_600_000.0 / (26.0 * 26.0));
        // The floor holds however many closures pile up.
        assert_eq!(bombe_score(20, 18), 0.001);
    }

    #[test]
    fn self_encryption_positions_are_skipped() {
        let ciphertext = to_letters("ABCDEF");
        let crib = to_letters("AXY");
        // Position 0 aligns crib 'A' with ciphertext 'A': impossible.
        assert_eq!(next_valid_position(&ciphertext, 6, &crib, 3, 0), Some(1));
        // A wildcard never blocks an alignment.
        let wild = to_letters("?BC");
        assert_eq!(next_valid_position(&ciphertext, 6, &wild, 3, 0), Some(3));
        assert_eq!(next_valid_position(&ciphertext, 6, &crib, 3, 4), None);
    }

    #[test]
    fn cycle_menu_counts_one_closure() {
        // Crib/ciphertext aligned to produce the cycle A-B, B-C, C-A.
        let ciphertext = to_letters("BCA");
        let crib = to_letters("ABC");
        let bc = BombeCrib::new(&ciphertext, &crib, 0);
        assert_eq!(bc.menu.sub_graphs.len(), 1);
        assert_eq!(bc.menu.total_links, 3);
        assert_eq!(bc.menu.total_closures, 1);
        assert_eq!(bc.menu.score, bombe_score(1, 3));
    }

    #[test]
    fn chain_menu_has_no_closures() {
        // A->B, B->C, C->D: a path, no cycle.
        let ciphertext = to_letters("BCD");
        let crib = to_letters("ABC");
        let bc = BombeCrib::new(&ciphertext, &crib, 0);
        assert_eq!(bc.menu.sub_graphs.len(), 1);
        assert_eq!(bc.menu.total_links, 3);
        assert_eq!(bc.menu.total_closures, 0);
    }

    #[test]
    fn disjoint_pairs_make_two_subgraphs() {
        let ciphertext = to_letters("BADC");
        let crib = to_letters("A?CX");
        // Links: A-B at 0, C-D at 2 (position 1 is a wildcard, position 3
        // aligns X with C).
        let bc = BombeCrib::new(&ciphertext, &crib, 0);
        assert_eq!(bc.menu.sub_graphs.len(), 2);
        assert_eq!(bc.menu.total_closures, 0);
        assert_eq!(bc.menu.total_links, 3);
    }

    #[test]
    fn links_record_earliest_position_only() {
        // The same A/B alignment occurs twice; only position 0 is kept.
        let ciphertext = to_letters("BXB");
        let crib = to_letters("A?A");
        let bc = BombeCrib::new(&ciphertext, &crib, 0);
        assert_eq!(bc.menu.total_links, 1);
        assert_eq!(bc.menu.sub_graphs[0].links[0].pos, 0);
    }

    #[test]
    fn bfs_order_starts_every_link_reachable() {
        let ciphertext = to_letters("BCDEF");
        let crib = to_letters("ABCDE");
        let bc = BombeCrib::new(&ciphertext, &crib, 0);
        let graph = &bc.menu.sub_graphs[0];
        // Walking links in order, each must touch a previously seen letter.
        let mut seen = [false; 26];
        seen[graph.links[0].l1 as usize] = true;
        for link in &graph.links {
            assert!(seen[link.l1 as usize] || seen[link.l2 as usize]);
            seen[link.l1 as usize] = true;
            seen[link.l2 as usize] = true;
        }
    }
}
