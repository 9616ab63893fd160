//! One unit of plugboard optimization: a cloned key, a private ciphertext
//! copy, a seeded RNG, and no shared mutable state with any other worker.

use crate::alphabet::shuffle_order;
use crate::key::{Key, Letter, ScoreMode, MAX_STB_PLUGS};
use crate::report::ResultReporter;
use crate::stats::EnigmaStats;

// Letters in descending German frequency; the starting visitation order
// before per-worker shuffling.
const FREQUENT: [usize; 26] = [
    4, 13, 23, 17, 18, 0, 8, 19, 20, 14, 11, 3, 5, 6, 12, 1, 7, 10, 25, 22, 16, 21, 2, 15, 9, 24,
];

const SA_ROUNDS: usize = 200;
const SA_STALL_LIMIT: usize = 10;
const HC_STALL_LIMIT: usize = 3;
const SA_MIN_ACCEPT_PROB: f64 = 0.0085;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerMode {
    HillClimb,
    Annealing,
    /// Seeded greedy pair search over the most frequent letters.
    GreedyPairs,
}

#[derive(Clone, Copy, PartialEq)]
enum Action {
    NoChange,
    IK,
    ISk,
    KSi,
    IKSiSk,
    ISkKSi,
}

pub struct HcSaWorker {
    pub key: Key,
    /// Best right-rotor offset found by the post-convergence sweep.
    pub best_offset: i32,
    ciphertext: Vec<Letter>,
    len: usize,
    first_pass: bool,
    seed_stb: [Letter; 26],
    order: [usize; 26],
    mode: OptimizerMode,
    rounds: usize,
    r_ring_spacing: usize,
    rng: fastrand::Rng,
}

impl HcSaWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: &Key,
        seed_stb: &[Letter; 26],
        ciphertext: &[Letter],
        len: usize,
        first_pass: bool,
        mode: OptimizerMode,
        rounds: usize,
        r_ring_spacing: usize,
        seed: Option<u64>,
    ) -> HcSaWorker {
        let mut key = key.clone();
        key.score = -1; // not yet optimized
        HcSaWorker {
            key,
            best_offset: 0,
            ciphertext: ciphertext[..len].to_vec(),
            len,
            first_pass,
            seed_stb: *seed_stb,
            order: FREQUENT,
            mode,
            rounds,
            r_ring_spacing: r_ring_spacing.max(1),
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
        }
    }

    #[inline]
    fn eval(&self, mode: ScoreMode, stats: &EnigmaStats) -> i64 {
        self.key.eval(mode, &self.ciphertext, self.len, stats)
    }

    pub fn run(&mut self, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        if reporter.should_terminate() {
            return;
        }
        self.key.build_lookup(self.len);
        shuffle_order(&mut self.order, &mut self.rng);
        let seed_stb = self.seed_stb;
        self.key
            .set_stecker_array(&seed_stb)
            .expect("seed plugboard must be an involution");

        if self.first_pass && self.key.stb_count() != 0 {
            // A deduced board is already on the key; a trigram polish of it
            // beats restarting from scratch.
            self.hc_step(ScoreMode::Tri, stats, reporter);
        } else {
            match self.mode {
                OptimizerMode::HillClimb => self.hill_climb(stats, reporter),
                OptimizerMode::Annealing => self.anneal(stats, reporter),
                OptimizerMode::GreedyPairs => self.greedy_pairs(stats, reporter),
            }
        }
    }

    // ---- hill climbing ---------------------------------------------------

    fn hill_climb(&mut self, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        self.key.set_stecker("").expect("empty stecker");
        let mut best_stb = String::new();
        let mut best_score = 0;
        let mut no_improve = 0;
        for _ in 0..self.rounds * 2 {
            if no_improve >= HC_STALL_LIMIT || reporter.should_terminate() {
                break;
            }
            self.hc_step(ScoreMode::Ic, stats, reporter);
            self.hc_step(ScoreMode::Bi, stats, reporter);
            self.hc_step(ScoreMode::Tri, stats, reporter);
            if self.key.score > best_score {
                best_score = self.key.score;
                best_stb = self.key.stb_string();
                no_improve = 0;
            } else {
                no_improve += 1;
            }
        }
        self.key.set_stecker(&best_stb).expect("own pair string");
        let current = self.eval(ScoreMode::Tri, stats);
        self.key.score = current;
        self.check_offsets(current, stats, reporter);
    }

    /// One full hill-climbing stage under a single objective: repeatedly
    /// sweep all letter pairs in the shuffled order, applying the best
    /// legal reconnect move at each position, until a sweep improves
    /// nothing.
    fn hc_step(&mut self, eval: ScoreMode, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        let mut best_score = self.eval(eval, stats);
        let mut inv_order = [0usize; 26];
        for i in 0..26 {
            inv_order[self.order[i]] = i;
        }

        let mut improved = true;
        while improved && !reporter.should_terminate() {
            improved = false;
            for i in 0..26 {
                if reporter.should_terminate() {
                    break;
                }
                let vi = self.order[i] as Letter;
                for k in (i + 1)..26 {
                    let vk = self.order[k] as Letter;
                    let vsk = self.key.stbrett[vk as usize];
                    let vsi = self.key.stbrett[vi as usize];
                    if vsk == vi {
                        continue;
                    }
                    let sk = inv_order[vsk as usize];
                    let si = inv_order[vsi as usize];

                    let mut action = Action::NoChange;

                    if vi == vsi && vk == vsk {
                        if self.key.stb_count() == MAX_STB_PLUGS {
                            continue;
                        }
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::IK;
                        }
                        if action == Action::NoChange {
                            self.key.stb_disconnect(vi, vk);
                        }
                    } else if vi == vsi {
                        // vk is plugged; its partner is visited between i and k.
                        if sk > i && sk < k {
                            continue;
                        }
                        self.key.stb_disconnect(vk, vsk);
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::IK;
                        }
                        self.key.stb_disconnect(vi, vk);
                        self.key.stb_connect(vi, vsk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::ISk;
                        }
                        self.key.stb_disconnect(vi, vsk);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::ISk => self.key.stb_connect(vi, vsk),
                            _ => self.key.stb_connect(vk, vsk),
                        }
                    } else if vk == vsk {
                        if si < k && si < i {
                            continue;
                        }
                        self.key.stb_disconnect(vi, vsi);
                        self.key.stb_connect(vk, vi);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::IK;
                        }
                        self.key.stb_disconnect(vk, vi);
                        self.key.stb_connect(vk, vsi);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::KSi;
                        }
                        self.key.stb_disconnect(vk, vsi);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::KSi => self.key.stb_connect(vk, vsi),
                            _ => self.key.stb_connect(vi, vsi),
                        }
                    } else {
                        // Both plugged to third parties; only evaluate each
                        // four-letter combination once.
                        if si < i || sk < k {
                            continue;
                        }
                        self.key.stb_disconnect(vi, vsi);
                        self.key.stb_disconnect(vk, vsk);
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::IK;
                        }
                        self.key.stb_connect(vsi, vsk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::IKSiSk;
                        }
                        self.key.stb_disconnect(vi, vk);
                        self.key.stb_disconnect(vsi, vsk);
                        self.key.stb_connect(vi, vsk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::ISk;
                        }
                        self.key.stb_connect(vsi, vk);
                        let new_score = self.eval(eval, stats);
                        if new_score > best_score {
                            best_score = new_score;
                            improved = true;
                            action = Action::ISkKSi;
                        }
                        self.key.stb_disconnect(vi, vsk);
                        self.key.stb_disconnect(vsi, vk);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::ISk => self.key.stb_connect(vi, vsk),
                            Action::IKSiSk => {
                                self.key.stb_connect(vi, vk);
                                self.key.stb_connect(vsi, vsk);
                            }
                            Action::ISkKSi => {
                                self.key.stb_connect(vi, vsk);
                                self.key.stb_connect(vsi, vk);
                            }
                            _ => {
                                self.key.stb_connect(vi, vsi);
                                self.key.stb_connect(vk, vsk);
                            }
                        }
                    }
                }
            }
        }

        if !reporter.should_terminate() {
            let recomputed = self.eval(eval, stats);
            assert_eq!(
                recomputed, best_score,
                "hill-climb stage left the board out of sync with its tracked best"
            );
        }
        self.key.score = self.eval(eval, stats);
    }

    // ---- simulated annealing ---------------------------------------------

    fn anneal(&mut self, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        self.key.set_stecker("").expect("empty stecker");
        for _ in 0..self.rounds * 2 {
            if reporter.should_terminate() {
                break;
            }
            self.sa_step(ScoreMode::Bi, stats, reporter);
        }
        let current = self.eval(ScoreMode::Tri, stats);
        self.key.score = current;
        self.check_offsets(current, stats, reporter);
    }

    /// Fixed, length-dependent annealing temperature: short ciphertexts need
    /// hotter chains. Piecewise-linear between empirical breakpoints; no
    /// cooling within a call.
    fn temperature(len: usize) -> f64 {
        let len = len as f64;
        if len <= 30.0 {
            400.0
        } else if len <= 50.0 {
            400.0 - (400.0 - 315.0) * (len - 30.0) / 20.0
        } else if len <= 75.0 {
            315.0 - (315.0 - 240.0) * (len - 50.0) / 25.0
        } else if len <= 100.0 {
            240.0 - (240.0 - 220.0) * (len - 75.0) / 25.0
        } else if len <= 150.0 {
            220.0 - (220.0 - 200.0) * (len - 100.0) / 50.0
        } else {
            200.0
        }
    }

    fn accept(&mut self, new_score: i64, curr_score: i64, temperature: f64) -> bool {
        let diff = (new_score - curr_score) as f64;
        if diff > 0.0 {
            return true;
        }
        if temperature == 0.0 {
            return false;
        }
        let prob = (diff / temperature).exp();
        prob > SA_MIN_ACCEPT_PROB && prob > self.rng.f64()
    }

    fn sa_step(&mut self, eval: ScoreMode, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        let mut best_stb = self.key.stb_string();
        let mut best_score = self.eval(eval, stats);
        let mut curr_score = best_score;
        let temp = Self::temperature(self.len);

        let mut stalled = 0;
        for _ in 0..SA_ROUNDS {
            if stalled >= SA_STALL_LIMIT || reporter.should_terminate() {
                break;
            }
            shuffle_order(&mut self.order, &mut self.rng);
            let mut changed = false;

            for i in 0..26 {
                if reporter.should_terminate() {
                    break;
                }
                let vi = self.order[i] as Letter;
                for k in (i + 1)..26 {
                    let vk = self.order[k] as Letter;
                    let vsk = self.key.stbrett[vk as usize];
                    let vsi = self.key.stbrett[vi as usize];
                    if vsk == vi {
                        continue;
                    }

                    let mut action = Action::NoChange;

                    if vi == vsi && vk == vsk {
                        if self.key.stb_count() == MAX_STB_PLUGS {
                            continue;
                        }
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        } else {
                            self.key.stb_disconnect(vi, vk);
                        }
                    } else if vi == vsi {
                        if vsk < vk {
                            continue;
                        }
                        self.key.stb_disconnect(vk, vsk);
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::IK;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vi, vk);
                        self.key.stb_connect(vi, vsk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::ISk;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vi, vsk);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::ISk => self.key.stb_connect(vi, vsk),
                            _ => self.key.stb_connect(vk, vsk),
                        }
                    } else if vk == vsk {
                        if vsi < vi {
                            continue;
                        }
                        self.key.stb_disconnect(vi, vsi);
                        self.key.stb_connect(vk, vi);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::IK;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vk, vi);
                        self.key.stb_connect(vk, vsi);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::KSi;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vk, vsi);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::KSi => self.key.stb_connect(vk, vsi),
                            _ => self.key.stb_connect(vi, vsi),
                        }
                    } else {
                        if vsi < vi || vsk < vk {
                            continue;
                        }
                        self.key.stb_disconnect(vi, vsi);
                        self.key.stb_disconnect(vk, vsk);
                        self.key.stb_connect(vi, vk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::IK;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_connect(vsi, vsk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::IKSiSk;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vsi, vsk);
                        self.key.stb_disconnect(vi, vk);
                        self.key.stb_connect(vi, vsk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::ISk;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_connect(vsi, vk);
                        let new_score = self.eval(eval, stats);
                        if self.accept(new_score, curr_score, temp) {
                            curr_score = new_score;
                            changed = true;
                            action = Action::ISkKSi;
                            if new_score > best_score {
                                best_score = new_score;
                                best_stb = self.key.stb_string();
                            }
                        }
                        self.key.stb_disconnect(vi, vsk);
                        self.key.stb_disconnect(vsi, vk);
                        match action {
                            Action::IK => self.key.stb_connect(vi, vk),
                            Action::ISk => self.key.stb_connect(vi, vsk),
                            Action::IKSiSk => {
                                self.key.stb_connect(vi, vk);
                                self.key.stb_connect(vsi, vsk);
                            }
                            Action::ISkKSi => {
                                self.key.stb_connect(vi, vsk);
                                self.key.stb_connect(vsi, vk);
                            }
                            _ => {
                                self.key.stb_connect(vi, vsi);
                                self.key.stb_connect(vk, vsk);
                            }
                        }
                    }
                }
            }

            if changed {
                stalled = 0;
            } else {
                stalled += 1;
            }
        }

        if !reporter.should_terminate() {
            let recomputed = self.eval(eval, stats);
            assert_eq!(
                recomputed, curr_score,
                "annealing left the board out of sync with its tracked score"
            );
        }
        self.key.set_stecker(&best_stb).expect("own pair string");
        self.hc_step(eval, stats, reporter);
        self.key.score = self.eval(eval, stats);
    }

    // ---- greedy pair search ----------------------------------------------

    fn greedy_pairs(&mut self, stats: &EnigmaStats, reporter: &dyn ResultReporter) {
        let mut best_score = 0;
        let mut best_stb = String::new();
        self.best_offset = 0;

        for xi in 0..self.rounds.min(26) {
            if reporter.should_terminate() {
                break;
            }
            let x = FREQUENT[xi] as Letter;
            for yi in xi..26 {
                if reporter.should_terminate() {
                    break;
                }
                let y = FREQUENT[yi] as Letter;
                self.key.set_stecker("").expect("empty stecker");
                if y != x {
                    self.key.stb_connect(x, y);
                }

                self.ic_pair_greedy(stats);
                let mut current = self.reconnect_pass(true, stats);
                current = self.prune_pass(current, stats);

                let mut best_offset_for_cycle = 0;
                if current as f64 > stats.tri_threshold(self.len) {
                    let mut best_offset_score = current;
                    let spacing = self.r_ring_spacing as i32;
                    for offset in (1 - spacing)..spacing {
                        self.key.add_right_rotor_offset(offset);
                        let score =
                            self.key
                                .tri_score_uncached(&self.ciphertext, self.len, stats);
                        if score > best_offset_score {
                            best_offset_score = score;
                            best_offset_for_cycle = offset;
                        }
                        self.key.sub_right_rotor_offset(offset);
                    }
                    self.key.add_right_rotor_offset(best_offset_for_cycle);
                    current = self.reconnect_pass(false, stats);
                    self.key.sub_right_rotor_offset(best_offset_for_cycle);
                }

                if current > best_score {
                    best_stb = self.key.stb_string();
                    best_score = current;
                    self.best_offset = best_offset_for_cycle;
                }
            }
        }
        self.key.set_stecker(&best_stb).expect("own pair string");
        if self.best_offset == 0 && best_score > 0 && !reporter.should_terminate() {
            let recomputed = self.eval(ScoreMode::Tri, stats);
            assert_eq!(
                recomputed, best_score,
                "greedy pair search best board does not reproduce its score"
            );
        }
        self.key.score = best_score;
    }

    /// Greedily adds the best-scoring plugboard pair (by IC) among the still
    /// self-paired letters, up to eight pairs.
    fn ic_pair_greedy(&mut self, stats: &EnigmaStats) -> i64 {
        let mut current = self.eval(ScoreMode::Ic, stats);
        for _ in 0..8 {
            let mut best = None;
            let mut best_pair_score = 0;
            for i in 0..26 as Letter {
                if self.key.stbrett[i as usize] != i {
                    continue;
                }
                for j in (i + 1)..26 {
                    if self.key.stbrett[j as usize] != j {
                        continue;
                    }
                    self.key.stb_connect(i, j);
                    let new_score = self.eval(ScoreMode::Ic, stats);
                    if new_score > best_pair_score {
                        best = Some((i, j));
                        best_pair_score = new_score;
                    }
                    self.key.stb_disconnect(i, j);
                }
            }
            if best_pair_score <= current {
                break;
            }
            let (i, j) = best.expect("score improved, so a pair was found");
            self.key.stb_connect(i, j);
            current = self.eval(ScoreMode::Ic, stats);
        }
        current
    }

    /// Steepest-ascent full-reconnect pass on the trigram objective: every
    /// (i, j) reconnect (detaching current partners) is evaluated and the
    /// single best applied, repeated until none improves.
    fn reconnect_pass(&mut self, use_lookup: bool, stats: &EnigmaStats) -> i64 {
        let tri = |w: &Self| {
            if use_lookup {
                w.eval(ScoreMode::Tri, stats)
            } else {
                w.key.tri_score_uncached(&w.ciphertext, w.len, stats)
            }
        };
        let mut current = tri(self);
        loop {
            let mut best: Option<(Letter, Letter)> = None;
            let mut best_ij_score = current;
            for i in 0..26 as Letter {
                for j in (i + 1)..26 {
                    let partner_i = self.key.stbrett[i as usize];
                    let partner_j = self.key.stbrett[j as usize];
                    if self.key.stb_count() == MAX_STB_PLUGS && partner_i == i && partner_j == j {
                        continue;
                    }
                    if partner_i != i {
                        self.key.stb_disconnect(i, partner_i);
                    }
                    if partner_j != j {
                        self.key.stb_disconnect(j, partner_j);
                    }
                    self.key.stb_connect(i, j);
                    let new_score = tri(self);
                    if new_score > best_ij_score {
                        best = Some((i, j));
                        best_ij_score = new_score;
                    }
                    self.key.stb_disconnect(i, j);
                    if partner_j != j {
                        self.key.stb_connect(j, partner_j);
                    }
                    if partner_i != i {
                        self.key.stb_connect(i, partner_i);
                    }
                }
            }
            let Some((bi, bj)) = best else { break };
            let partner_i = self.key.stbrett[bi as usize];
            let partner_j = self.key.stbrett[bj as usize];
            if partner_i != bi {
                self.key.stb_disconnect(bi, partner_i);
            }
            if partner_j != bj {
                self.key.stb_disconnect(bj, partner_j);
            }
            self.key.stb_connect(bi, bj);
            current = tri(self);
            assert_eq!(
                current, best_ij_score,
                "reconnect move does not reproduce its evaluated score"
            );
        }
        current
    }

    /// Removal pass: drop any plug whose removal improves the trigram score.
    fn prune_pass(&mut self, mut current: i64, stats: &EnigmaStats) -> i64 {
        loop {
            let mut changed = false;
            for i in 0..26 as Letter {
                let partner = self.key.stbrett[i as usize];
                if partner == i {
                    continue;
                }
                self.key.stb_disconnect(i, partner);
                let new_score = self.eval(ScoreMode::Tri, stats);
                if new_score > current {
                    current = new_score;
                    changed = true;
                } else {
                    self.key.stb_connect(i, partner);
                }
            }
            if !changed {
                break;
            }
        }
        current
    }

    // ---- right-rotor offset sweep ----------------------------------------

    /// After convergence, if the trigram score clears the length threshold,
    /// sweep right ring/position offsets within the sampling window and keep
    /// the best, re-polishing the board at that offset.
    fn check_offsets(&mut self, current: i64, stats: &EnigmaStats, _reporter: &dyn ResultReporter) {
        if current as f64 > stats.tri_threshold(self.len) {
            let mut best_offset_score = current;
            let mut best_offset_for_cycle = 0;
            let spacing = self.r_ring_spacing as i32;
            for offset in (1 - spacing)..spacing {
                self.key.add_right_rotor_offset(offset);
                let score = self
                    .key
                    .tri_score_uncached(&self.ciphertext, self.len, stats);
                if score > best_offset_score {
                    best_offset_score = score;
                    best_offset_for_cycle = offset;
                }
                self.key.sub_right_rotor_offset(offset);
            }
            self.key.add_right_rotor_offset(best_offset_for_cycle);
            self.key.score = self.reconnect_pass(false, stats);
            self.key.sub_right_rotor_offset(best_offset_for_cycle);
            self.best_offset = best_offset_for_cycle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::to_letters;
    use crate::key::Model;
    use crate::report::ConsoleReporter;

    fn stats_with_flat_tables() -> EnigmaStats {
        let mut stats = EnigmaStats::new();
        // Uniform positive tables keep eval() well-defined without a corpus.
        stats.biflat.iter_mut().for_each(|v| *v = 100);
        stats.triflat.iter_mut().for_each(|v| *v = 100);
        stats
    }

    #[test]
    fn temperature_schedule_breakpoints() {
        assert_eq!(HcSaWorker::temperature(20), 400.0);
        assert_eq!(HcSaWorker::temperature(30), 400.0);
        assert_eq!(HcSaWorker::temperature(50), 315.0);
        assert_eq!(HcSaWorker::temperature(75), 240.0);
        assert_eq!(HcSaWorker::temperature(100), 220.0);
        assert_eq!(HcSaWorker::temperature(150), 200.0);
        assert_eq!(HcSaWorker::temperature(1000), 200.0);
        // Linear between breakpoints.
        assert_eq!(HcSaWorker::temperature(40), 400.0 - 85.0 / 2.0);
    }

    #[test]
    fn worker_preserves_involution() {
        let mut key = Key::new(Model::M3);
        key.set_key("B:123:AAA:AAA", Model::M3).unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNMQWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = stats_with_flat_tables();
        let seed = [
            0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
            24, 25,
        ];
        let mut worker = HcSaWorker::new(
            &key,
            &seed,
            &ct,
            ct.len(),
            false,
            OptimizerMode::HillClimb,
            1,
            1,
            Some(11),
        );
        let reporter = ConsoleReporter::default();
        worker.run(&stats, &reporter);
        for i in 0..26 {
            let p = worker.key.stbrett[i];
            assert_eq!(worker.key.stbrett[p as usize], i as Letter);
        }
        assert!(worker.key.stb_count() <= MAX_STB_PLUGS);
        assert!(worker.key.score >= 0);
    }

    #[test]
    fn greedy_pairs_mode_converges() {
        let mut key = Key::new(Model::M3);
        key.set_key("B:123:AAA:AAA", Model::M3).unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNMQWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = stats_with_flat_tables();
        let seed: [Letter; 26] = std::array::from_fn(|i| i as Letter);
        let mut worker = HcSaWorker::new(
            &key,
            &seed,
            &ct,
            ct.len(),
            false,
            OptimizerMode::GreedyPairs,
            1,
            1,
            Some(21),
        );
        let reporter = ConsoleReporter::default();
        worker.run(&stats, &reporter);
        assert!(worker.key.score > 0);
        for i in 0..26 {
            let p = worker.key.stbrett[i];
            assert_eq!(worker.key.stbrett[p as usize], i as Letter);
        }
    }

    #[test]
    fn cancelled_worker_does_nothing() {
        let key = Key::new(Model::M3);
        let ct = to_letters("ABCDEFGHIJ");
        let stats = stats_with_flat_tables();
        let seed: [Letter; 26] = std::array::from_fn(|i| i as Letter);
        let mut worker = HcSaWorker::new(
            &key,
            &seed,
            &ct,
            ct.len(),
            false,
            OptimizerMode::Annealing,
            1,
            1,
            Some(3),
        );
        let reporter = ConsoleReporter::default();
        reporter.cancel();
        worker.run(&stats, &reporter);
        assert_eq!(worker.key.score, -1);
    }
}
