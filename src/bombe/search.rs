//! Crib-position and key-range enumeration driving the stop test, with
//! top-candidate collection and hand-off to the plugboard refiner.

use crate::alphabet::{estimated_time_string, to_letters, to_string};
use crate::bombe::crib::{self, BombeCrib, BAD_SCORE, MAX_CRIB_LEN};
use crate::bombe::menu::{BombeMenu, StbAssumption};
use crate::error::{EnResult, EnigmaError};
use crate::key::{Key, Letter, MRingScope};
use crate::report::ResultReporter;
use crate::search::HillClimb;
use crate::stats::EnigmaStats;
use std::time::Instant;

/// Cap on stop candidates kept for refinement.
const MAX_TOPS: usize = 100_000;
/// After this many stops at the same score, further ties are suppressed.
const SAME_SCORE_NOISE_LIMIT: u64 = 100;

pub struct BombeParams {
    pub hillclimbing_cycles: usize,
    pub right_ring_sampling: usize,
    pub middle_ring_scope: MRingScope,
    pub threads: usize,
    /// Inclusive crib-position range; `None` scans every valid alignment.
    pub crib_position: Option<(usize, usize)>,
    pub indicator: String,
    pub indicator_message_key: String,
    pub seed: Option<u64>,
}

impl Default for BombeParams {
    fn default() -> Self {
        BombeParams {
            hillclimbing_cycles: 2,
            right_ring_sampling: 1,
            middle_ring_scope: MRingScope::All,
            threads: 1,
            crib_position: None,
            indicator: String::new(),
            indicator_message_key: String::new(),
            seed: None,
        }
    }
}

pub struct BombeSearch;

impl BombeSearch {
    /// Full crib attack: builds menus at every valid crib position in range,
    /// then runs the stop test across the key range for each menu.
    #[allow(clippy::too_many_arguments)]
    pub fn bombe_search(
        &self,
        crib_text: &str,
        ciphertext: &[Letter],
        clen: usize,
        from: &Key,
        to: &Key,
        params: &BombeParams,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
    ) -> EnResult<()> {
        reporter.update_step("Starting Bombe search");

        let max_crib_len = MAX_CRIB_LEN.min(clen);
        let crib = to_letters(crib_text);
        if crib.len() > max_crib_len {
            return Err(EnigmaError::Validation(format!(
                "crib too long ({} letters) - must not exceed {max_crib_len}",
                crib.len()
            )));
        }
        if crib.is_empty() {
            return Err(EnigmaError::Validation("empty crib".into()));
        }

        let max_valid = clen - crib.len();
        let (min_pos, max_pos) = match params.crib_position {
            None => (0, max_valid),
            Some((lo, hi)) => {
                if lo > hi || hi > max_valid {
                    return Err(EnigmaError::Validation(format!(
                        "crib position range {lo}-{hi} outside 0-{max_valid}"
                    )));
                }
                (lo, hi)
            }
        };
        let pinned = min_pos == max_pos;

        let mut menus: Vec<BombeMenu> = Vec::new();
        let mut position = min_pos;
        while let Some(pos) =
            crib::next_valid_position(ciphertext, clen, &crib, crib.len(), position)
        {
            if pos > max_pos {
                break;
            }
            let bombe_crib = BombeCrib::new(ciphertext, &crib, pos);
            if bombe_crib.menu.score < BAD_SCORE || pinned {
                reporter.write_message(&format!(
                    "Bombe menu at position {} (links: {}, closures: {}, score: {:.3})",
                    pos, bombe_crib.menu.total_links, bombe_crib.menu.total_closures,
                    bombe_crib.menu.score
                ));
                if bombe_crib.menu.score > BAD_SCORE {
                    reporter.write_warning(&format!(
                        "Turing score {:.1} is high (higher means worse); this menu may generate many false stops. A longer crib would help.",
                        bombe_crib.menu.score
                    ));
                }
                menus.push(bombe_crib.menu);
            }
            position = pos + 1;
            if reporter.should_terminate() {
                return Ok(());
            }
        }

        if menus.is_empty() {
            reporter.write_warning(&format!(
                "No usable Bombe menu (score below {BAD_SCORE}) found for the crib - not enough links/closures, or letters encrypted to themselves"
            ));
            return Ok(());
        }

        reporter.write_message(&format!(
            "{} Bombe menus created - starting stop-test sweep",
            menus.len()
        ));
        self.search_crib_menus(&menus, from, to, params, ciphertext, clen, stats, reporter);
        Ok(())
    }

    /// Blend of trigram and IC into one ranking score: trigram alone once it
    /// is decisive, IC-normalized otherwise, with a noise floor at 3000.
    fn score_for_menus(tri: i64, ic: f64) -> i64 {
        let res = if tri > 10_000 {
            tri
        } else if ic > 0.050 {
            (10_000.0 * ic / 0.050) as i64
        } else {
            (tri as f64 * ic / 0.050) as i64
        };
        if res < 3000 {
            0
        } else {
            res
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn search_crib_menus(
        &self,
        menus: &[BombeMenu],
        from: &Key,
        to: &Key,
        params: &BombeParams,
        ciphertext: &[Letter],
        len: usize,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
    ) {
        let lo = from;
        let hi = to;
        let r_ring_spacing = params.right_ring_sampling.max(1);
        let mut m_ring_scope = params.middle_ring_scope;
        if lo.m_ring == hi.m_ring {
            m_ring_scope = MRingScope::All;
        }
        let check_indicator =
            !params.indicator.is_empty() && !params.indicator_message_key.is_empty();

        let total_keys = Key::number_of_possible_keys(
            lo,
            hi,
            len,
            m_ring_scope,
            r_ring_spacing,
            check_indicator,
        );
        reporter.write_message(&format!(
            "Bombe search: {} menus x {total_keys} keys = {} stop tests",
            menus.len(),
            menus.len() as u64 * total_keys
        ));
        let (min_rate, max_rate) = match m_ring_scope {
            MRingScope::All => (50_000, 100_000),
            MRingScope::OneNonStepping => (15_000, 30_000),
            _ => (25_000, 50_000),
        };
        let normalized = total_keys * menus[0].crib_len() as u64 / 25;
        reporter.write_message(&format!(
            "Estimated search time: {} for a small number of stops (more if many are found)",
            estimated_time_string(normalized * menus.len() as u64, min_rate, max_rate)
        ));

        let start_time = Instant::now();
        let mut n_stops = 0u64;
        let mut best_score = 0i64;
        let mut counter_same_max = 0u64;
        let mut count_keys = 0u64;
        let mut top_keys: Vec<Key> = Vec::new();

        let mut ckey = from.clone();
        'sweep: for ukw_num in lo.ukw_num..=hi.ukw_num {
            ckey.ukw_num = ukw_num;
            for g_slot in lo.g_slot..=hi.g_slot {
                ckey.g_slot = g_slot;
                for l_slot in lo.l_slot..=hi.l_slot {
                    ckey.l_slot = l_slot;
                    for m_slot in lo.m_slot..=hi.m_slot {
                        if m_slot == l_slot {
                            continue;
                        }
                        ckey.m_slot = m_slot;
                        for r_slot in lo.r_slot..=hi.r_slot {
                            if r_slot == l_slot || r_slot == m_slot {
                                continue;
                            }
                            ckey.r_slot = r_slot;
                            for g_ring in lo.g_ring..=hi.g_ring {
                                ckey.g_ring = g_ring;
                                for l_ring in lo.l_ring..=hi.l_ring {
                                    ckey.l_ring = l_ring;
                                    for m_ring in lo.m_ring..=hi.m_ring {
                                        ckey.m_ring = m_ring;
                                        for r_ring in lo.r_ring..=hi.r_ring {
                                            if r_ring % r_ring_spacing != 0 {
                                                continue;
                                            }
                                            ckey.r_ring = r_ring;
                                            reporter.update_step(&format!(
                                                "Bombe search ({})",
                                                ckey.key_string_short(false)
                                            ));
                                            if self.scan_message_settings(
                                                &mut ckey,
                                                lo,
                                                hi,
                                                menus,
                                                params,
                                                m_ring_scope,
                                                check_indicator,
                                                ciphertext,
                                                len,
                                                stats,
                                                reporter,
                                                total_keys,
                                                start_time,
                                                &mut count_keys,
                                                &mut n_stops,
                                                &mut best_score,
                                                &mut counter_same_max,
                                                &mut top_keys,
                                            ) {
                                                break 'sweep;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let elapsed = start_time.elapsed().as_secs_f64().max(0.001);
        reporter.write_message(&format!(
            "End of Bombe search: {n_stops} stop(s), {count_keys} keys tested in {elapsed:.1}s ({:.0}/sec)",
            count_keys as f64 / elapsed
        ));

        if top_keys.len() >= 10 && params.hillclimbing_cycles > 0 {
            reporter.write_message(&format!(
                "Menu Bombe - refining batch of {} keys; min score {}, median {}, max {}",
                top_keys.len(),
                top_keys.last().expect("non-empty").score,
                top_keys[top_keys.len() / 2].score,
                top_keys[0].score
            ));
        }
        if !top_keys.is_empty() && params.hillclimbing_cycles > 0 {
            HillClimb.hill_climb_batch(
                &top_keys,
                params.hillclimbing_cycles,
                params.threads,
                10_000,
                ciphertext,
                len,
                r_ring_spacing,
                params.seed,
                stats,
                reporter,
            );
        }
    }

    /// Message-setting loops for one ring configuration; returns true on
    /// cancellation.
    #[allow(clippy::too_many_arguments)]
    fn scan_message_settings(
        &self,
        ckey: &mut Key,
        lo: &Key,
        hi: &Key,
        menus: &[BombeMenu],
        params: &BombeParams,
        m_ring_scope: MRingScope,
        check_indicator: bool,
        ciphertext: &[Letter],
        len: usize,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
        total_keys: u64,
        start_time: Instant,
        count_keys: &mut u64,
        n_stops: &mut u64,
        best_score: &mut i64,
        counter_same_max: &mut u64,
        top_keys: &mut Vec<Key>,
    ) -> bool {
        for g_mesg in lo.g_mesg..=hi.g_mesg {
            ckey.g_mesg = g_mesg;
            let key_from_indicator = if check_indicator {
                ckey.key_from_indicator(&params.indicator, &params.indicator_message_key)
            } else {
                None
            };
            for l_mesg in lo.l_mesg..=hi.l_mesg {
                if let Some(ind) = &key_from_indicator {
                    if l_mesg != ind.l_mesg {
                        continue;
                    }
                }
                ckey.l_mesg = l_mesg;
                for m_mesg in lo.m_mesg..=hi.m_mesg {
                    if let Some(ind) = &key_from_indicator {
                        if m_mesg != ind.m_mesg {
                            continue;
                        }
                    }
                    ckey.m_mesg = m_mesg;
                    for r_mesg in lo.r_mesg..=hi.r_mesg {
                        if let Some(ind) = &key_from_indicator {
                            if r_mesg != ind.r_mesg {
                                continue;
                            }
                        }
                        ckey.r_mesg = r_mesg;

                        if m_ring_scope != MRingScope::All {
                            let stepping = ckey.left_rotor_stepping_position(len);
                            if !Key::valid_wheels_state(len, stepping, m_ring_scope) {
                                continue;
                            }
                        }
                        if reporter.should_terminate() {
                            return true;
                        }

                        *count_keys += 1;
                        reporter.display_progress(*count_keys, total_keys);

                        for menu in menus {
                            ckey.build_lookup_range(menu.crib_start_pos, menu.crib_len());
                            let assumed = StbAssumption::default();
                            let Some(stop) = menu.test_stop(0, &ckey.lookup, &assumed) else {
                                continue;
                            };

                            // Propagation keeps the assumption symmetric, so
                            // a rejection here means the stop implies more
                            // plugs than the hardware carries: a false stop.
                            if ckey.set_stecker_array(&stop.to_stecker()).is_err() {
                                continue;
                            }
                            let tri = ckey.tri_score_uncached(ciphertext, len, stats);
                            let ic = ckey.ic_score_uncached(ciphertext, len);
                            ckey.score = Self::score_for_menus(tri, ic);

                            if ckey.score > 0 {
                                *n_stops += 1;
                                if *n_stops == (MAX_TOPS as u64 - 1) {
                                    reporter.write_warning(&format!(
                                        "Too many stops - only the top {MAX_TOPS} keys are kept for refinement. Reduce the key range, use a longer crib, or pin the crib position."
                                    ));
                                }
                                if top_keys.len() < MAX_TOPS {
                                    top_keys.push(ckey.clone());
                                    top_keys.sort_by(|a, b| b.score.cmp(&a.score));
                                } else if ckey.score
                                    > top_keys.last().expect("non-empty").score
                                {
                                    *top_keys.last_mut().expect("non-empty") = ckey.clone();
                                    top_keys.sort_by(|a, b| b.score.cmp(&a.score));
                                }
                            }

                            if ckey.score == *best_score {
                                *counter_same_max += 1;
                                if *counter_same_max == SAME_SCORE_NOISE_LIMIT {
                                    reporter.write_warning(&format!(
                                        "Too many stops with score {best_score}; only higher-scoring stops will be displayed"
                                    ));
                                }
                            }

                            if ckey.score > *best_score
                                || (ckey.score == *best_score
                                    && *counter_same_max < SAME_SCORE_NOISE_LIMIT)
                            {
                                if ckey.score > *best_score {
                                    *counter_same_max = 0;
                                }
                                *best_score = ckey.score;
                                Self::report_stop(
                                    menu, ciphertext, len, ckey, ic, tri, &stop, start_time,
                                    total_keys, *count_keys, reporter,
                                );
                            }
                            // One stop per key is enough; other menus would
                            // only duplicate it.
                            break;
                        }
                    }
                }
            }
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn report_stop(
        menu: &BombeMenu,
        ciphertext: &[Letter],
        len: usize,
        ckey: &mut Key,
        ic: f64,
        tri: i64,
        stop: &StbAssumption,
        start_time: Instant,
        total_keys: u64,
        counter_keys: u64,
        reporter: &dyn ResultReporter,
    ) {
        if !reporter.should_push(ckey.score) {
            return;
        }
        let mut plaintext = vec![0; len];
        ckey.encipher_all(ciphertext, &mut plaintext, len);
        let plains = to_string(&plaintext);

        let elapsed = start_time.elapsed().as_millis().max(1) as u64;
        let desc = format!(
            "BOMBE [Pos: {}][{}K/{}K][{}K/sec][{} Sec]",
            menu.crib_start_pos,
            counter_keys / 1000,
            total_keys / 1000,
            counter_keys / elapsed,
            elapsed / 1000
        );
        reporter.report_result(ckey, ckey.score, &plains, &desc, Some(menu.crib_start_pos));
        reporter.write_message(&format!(
            "MENU STOP NEW BEST - pos {} score {} (tri {tri} ic {ic:.4}) crib {}",
            menu.crib_start_pos,
            ckey.score,
            to_string(&menu.crib)
        ));
        reporter.write_message(&format!(
            "Stecker: [pairs {} self {}] key {}",
            stop.pairs_string(),
            stop.selfs_string(),
            ckey.key_string_long()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Model;
    use crate::report::ConsoleReporter;

    #[test]
    fn blended_score_fixed_points() {
        assert_eq!(BombeSearch::score_for_menus(12_000, 0.04), 12_000);
        assert_eq!(BombeSearch::score_for_menus(5_000, 0.060), 12_000);
        assert_eq!(BombeSearch::score_for_menus(5_000, 0.040), 4_000);
        // Below the noise floor the stop is discarded.
        assert_eq!(BombeSearch::score_for_menus(2_000, 0.040), 0);
        assert_eq!(BombeSearch::score_for_menus(1_000, 0.01), 0);
    }

    #[test]
    fn overlong_crib_is_rejected() {
        let ct = vec![0 as Letter; 100];
        let crib = "A".repeat(60);
        let from = Key::new(Model::M3);
        let reporter = ConsoleReporter::default();
        let stats = EnigmaStats::new();
        let err = BombeSearch.bombe_search(
            &crib,
            &ct,
            ct.len(),
            &from,
            &from.clone(),
            &BombeParams::default(),
            &stats,
            &reporter,
        );
        assert!(err.is_err());
    }
}
