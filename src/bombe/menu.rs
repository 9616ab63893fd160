//! The Bombe menu: connected constraint subgraphs derived from a crib, and
//! the recursive stop test that searches for a self-consistent partial
//! plugboard under a guessed rotor setting.

use crate::alphabet::{letter_char, Letter};
use crate::bombe::crib;
use crate::key::PathLookup;
use tracing::trace;

pub const UNASSIGNED: Letter = -1;

/// One edge of the menu graph: at ciphertext position `pos`, letters `l1`
/// and `l2` face each other across the machine.
#[derive(Debug, Clone)]
pub struct Link {
    pub pos: usize,
    pub l1: Letter,
    pub l2: Letter,
    /// Breadth-first distance from the subgraph root; links are tested in
    /// ascending distance so every link has an assigned endpoint by the time
    /// it is reached.
    pub dist: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SubGraph {
    pub links: Vec<Link>,
    pub closures: usize,
}

impl SubGraph {
    pub fn score(&self) -> f64 {
        crib::bombe_score(self.closures, self.links.len())
    }
}

/// Partial plugboard deduced by the stop test. `partner[i]` is the assumed
/// stecker partner of `i` (possibly `i` itself), or [`UNASSIGNED`];
/// `strength[i]` counts independent confirmations of that assumption.
#[derive(Debug, Clone, Copy)]
pub struct StbAssumption {
    pub partner: [Letter; 26],
    pub strength: [i16; 26],
}

impl Default for StbAssumption {
    fn default() -> Self {
        StbAssumption {
            partner: [UNASSIGNED; 26],
            strength: [0; 26],
        }
    }
}

impl StbAssumption {
    /// Full plugboard with every undeduced letter self-paired.
    pub fn to_stecker(&self) -> [Letter; 26] {
        let mut stb = [0; 26];
        for i in 0..26 {
            stb[i] = if self.partner[i] == UNASSIGNED {
                i as Letter
            } else {
                self.partner[i]
            };
        }
        stb
    }

    pub fn pairs_string(&self) -> String {
        let mut s = String::new();
        for i in 0..26 {
            let p = self.partner[i];
            if p > i as Letter {
                s.push(letter_char(i as Letter));
                s.push(letter_char(p));
            }
        }
        s
    }

    pub fn selfs_string(&self) -> String {
        (0..26)
            .filter(|&i| self.partner[i] == i as Letter)
            .map(|i| letter_char(i as Letter))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BombeMenu {
    pub crib: Vec<Letter>,
    pub crib_start_pos: usize,
    pub sub_graphs: Vec<SubGraph>,
    pub total_closures: usize,
    pub total_links: usize,
    /// Turing score of the whole menu; lower is more discriminative. Above
    /// [`crib::BAD_SCORE`] the menu is usable but prone to false stops.
    pub score: f64,
}

impl BombeMenu {
    pub fn new(crib_start_pos: usize, crib: &[Letter]) -> BombeMenu {
        BombeMenu {
            crib: crib.to_vec(),
            crib_start_pos,
            sub_graphs: Vec::new(),
            total_closures: 0,
            total_links: 0,
            score: crib::BAD_SCORE,
        }
    }

    pub fn crib_len(&self) -> usize {
        self.crib.len()
    }

    /// Adds a connected component given the full link table and the visit
    /// counts of the component's letters, ordering its links breadth-first
    /// from the first link's first letter.
    pub fn add_subgraph(&mut self, links: &[[i32; 26]; 26], closures: usize, usage: &[u32; 26]) {
        let mut items: Vec<Link> = Vec::new();
        for i in 0..26 {
            for j in (i + 1)..26 {
                if usage[i] == 0 || usage[j] == 0 {
                    continue;
                }
                if links[i][j] >= 0 {
                    items.push(Link {
                        pos: links[i][j] as usize,
                        l1: i as Letter,
                        l2: j as Letter,
                        dist: 1000,
                    });
                } else if links[j][i] >= 0 {
                    items.push(Link {
                        pos: links[j][i] as usize,
                        l1: j as Letter,
                        l2: i as Letter,
                        dist: 1000,
                    });
                }
            }
        }
        if items.is_empty() {
            return;
        }

        // Relax letter distances from the first link's first letter; 26
        // rounds suffice for any 26-node graph.
        let mut letter_dist = [1000i32; 26];
        letter_dist[items[0].l1 as usize] = 0;
        for _ in 0..26 {
            for item in items.iter_mut() {
                let (a, b) = (item.l1 as usize, item.l2 as usize);
                letter_dist[a] = letter_dist[a].min(letter_dist[b] + 1);
                letter_dist[b] = letter_dist[b].min(letter_dist[a] + 1);
                item.dist = item.dist.min(letter_dist[a]).min(letter_dist[b]);
            }
        }

        let mut graph = SubGraph {
            links: Vec::with_capacity(items.len()),
            closures,
        };
        for dist in 0..26 {
            for item in &items {
                if item.dist == dist {
                    graph.links.push(item.clone());
                }
            }
        }

        self.total_closures += graph.closures;
        self.total_links += graph.links.len();
        self.sub_graphs.push(graph);
    }

    /// Orders subgraphs so the most discriminative (lowest expected false
    /// stops) are tested first, letting the stop test fail fast.
    pub fn sort_subgraphs(&mut self) {
        self.sub_graphs
            .sort_by(|a, b| a.score().partial_cmp(&b.score()).expect("finite scores"));
    }

    /// The Bombe validity test. Tries plugboard partners for the current
    /// subgraph's root letter (self-paired first), propagates each link's
    /// implication through the per-position scrambler table, and recurses
    /// into the next subgraph when consistent. Returns the deduced
    /// assumption on a complete stop, `None` otherwise. The input assumption
    /// is never mutated; backtracking is snapshot-based.
    pub fn test_stop(
        &self,
        sg: usize,
        lookup: &PathLookup,
        assumed: &StbAssumption,
    ) -> Option<StbAssumption> {
        let graph = &self.sub_graphs[sg];
        let first = graph.links[0].l1;

        let candidates: Vec<Letter> = if assumed.partner[first as usize] == UNASSIGNED {
            // Self-steckered first, then every letter not yet mapped.
            std::iter::once(first)
                .chain((0..26).map(|p| p as Letter).filter(|&p| {
                    p != first && assumed.partner[p as usize] == UNASSIGNED
                }))
                .collect()
        } else {
            // Recursive call: the root is already bound by an earlier
            // subgraph, stick with that single option.
            vec![assumed.partner[first as usize]]
        };

        'candidates: for paired in candidates {
            let mut trial = *assumed;
            if trial.partner[first as usize] == UNASSIGNED {
                trial.partner[paired as usize] = first;
                trial.partner[first as usize] = paired;
                trace!(sg, assumption = %format!("{}{}", letter_char(paired), letter_char(first)), "trying plugboard assumption");
            } else {
                // Only reachable with the single bound candidate.
                assert_eq!(
                    trial.partner[first as usize], paired,
                    "stop test root binding diverged from earlier subgraph"
                );
            }

            for link in &graph.links {
                // EnigmaIn =>[STB]=> ScramblerIn =>[SCRAMBLER]=> ScramblerOut =>[STB]=> EnigmaOut
                let (enigma_in, enigma_out) = if trial.partner[link.l1 as usize] != UNASSIGNED {
                    (link.l1, link.l2)
                } else if trial.partner[link.l2 as usize] != UNASSIGNED {
                    (link.l2, link.l1)
                } else {
                    panic!("stop test reached a link with no assigned endpoint; subgraph links not BFS-ordered");
                };

                let scrambler_in = trial.partner[enigma_in as usize];
                let scrambler_out = lookup.at(link.pos, scrambler_in);

                let out_assumed = trial.partner[enigma_out as usize];
                let scr_assumed = trial.partner[scrambler_out as usize];

                if out_assumed == UNASSIGNED && scr_assumed == UNASSIGNED {
                    if enigma_out == scrambler_out {
                        trial.partner[scrambler_out as usize] = scrambler_out;
                    } else {
                        trial.partner[enigma_out as usize] = scrambler_out;
                        trial.partner[scrambler_out as usize] = enigma_out;
                    }
                } else if scr_assumed != UNASSIGNED && scr_assumed != enigma_out {
                    trace!(sg, "assumption rejected: forward pair contradicts board");
                    continue 'candidates;
                } else if out_assumed != UNASSIGNED && out_assumed != scrambler_out {
                    trace!(sg, "assumption rejected: backward pair contradicts board");
                    continue 'candidates;
                } else {
                    // Consistent confirmation; count it once per pair.
                    let slot = if enigma_out == scrambler_out {
                        enigma_out
                    } else {
                        enigma_out.min(scrambler_out)
                    };
                    trial.strength[slot as usize] += 1;
                }
            }

            // Subgraph consistent; recurse into the next one if any.
            if sg + 1 < self.sub_graphs.len() {
                if let Some(complete) = self.test_stop(sg + 1, lookup, &trial) {
                    return Some(complete);
                }
            } else {
                trace!(
                    sg,
                    pairs = %trial.pairs_string(),
                    selfs = %trial.selfs_string(),
                    "stop"
                );
                return Some(trial);
            }
        }
        None
    }
}
