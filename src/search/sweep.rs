//! Exhaustive IC / trigram sweep: scores every configuration in a range
//! directly, tracks a bounded best list, and optionally hands it to the
//! plugboard refiner.

use crate::key::{Key, Letter, MRingScope};
use crate::report::ResultReporter;
use crate::search::HillClimb;
use crate::stats::EnigmaStats;
use std::time::Instant;

/// Keys retained for post-sweep refinement.
const MAX_TOP_KEYS: usize = 1000;

pub struct SweepParams {
    /// Score by index of coincidence instead of trigrams.
    pub find_settings_ic: bool,
    pub m_ring_scope: MRingScope,
    pub r_ring_spacing: usize,
    /// Refine each new running best immediately, not just the final list.
    pub hc_every_best: bool,
    pub hc_sa_cycles: usize,
    pub min_score_to_print: i64,
    pub threads: usize,
    pub indicator: String,
    pub indicator_message_key: String,
    pub seed: Option<u64>,
}

impl Default for SweepParams {
    fn default() -> Self {
        SweepParams {
            find_settings_ic: false,
            m_ring_scope: MRingScope::All,
            r_ring_spacing: 1,
            hc_every_best: false,
            hc_sa_cycles: 0,
            min_score_to_print: 0,
            threads: 1,
            indicator: String::new(),
            indicator_message_key: String::new(),
            seed: None,
        }
    }
}

pub struct TrigramIcSearch;

impl TrigramIcSearch {
    /// Sweeps the whole range, returns the best key found (scored), or
    /// `None` if the sweep was cancelled before any configuration scored.
    pub fn search(
        &self,
        from: &Key,
        to: &Key,
        params: &SweepParams,
        ciphertext: &[Letter],
        len: usize,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
    ) -> Option<Key> {
        let low = from;
        let high = to;
        let r_ring_spacing = params.r_ring_spacing.max(1);
        let mut m_ring_scope = params.m_ring_scope;
        if low.m_ring == high.m_ring {
            m_ring_scope = MRingScope::All;
        }
        let check_indicator =
            !params.indicator.is_empty() && !params.indicator_message_key.is_empty();
        let total_keys = Key::number_of_possible_keys(
            low,
            high,
            len,
            m_ring_scope,
            r_ring_spacing,
            check_indicator,
        );
        let objective = if params.find_settings_ic { "IC" } else { "TRIGRAMS" };
        reporter.write_message(&format!(
            "Starting {objective} search: {total_keys} keys to check"
        ));

        let start_time = Instant::now();
        let mut best_key: Option<Key> = None;
        let mut best_score = 0i64;
        let mut top_keys: Vec<Key> = Vec::new();
        let mut count = 0u64;

        let mut ckey = from.clone();
        for ukw_num in low.ukw_num..=high.ukw_num {
            ckey.ukw_num = ukw_num;
            for g_slot in low.g_slot..=high.g_slot {
                ckey.g_slot = g_slot;
                for l_slot in low.l_slot..=high.l_slot {
                    ckey.l_slot = l_slot;
                    for m_slot in low.m_slot..=high.m_slot {
                        if m_slot == l_slot {
                            continue;
                        }
                        ckey.m_slot = m_slot;
                        for r_slot in low.r_slot..=high.r_slot {
                            if r_slot == l_slot || r_slot == m_slot {
                                continue;
                            }
                            ckey.r_slot = r_slot;
                            for g_ring in low.g_ring..=high.g_ring {
                                ckey.g_ring = g_ring;
                                for l_ring in low.l_ring..=high.l_ring {
                                    ckey.l_ring = l_ring;
                                    for m_ring in low.m_ring..=high.m_ring {
                                        ckey.m_ring = m_ring;
                                        for r_ring in low.r_ring..=high.r_ring {
                                            if r_ring % r_ring_spacing != 0 {
                                                continue;
                                            }
                                            ckey.r_ring = r_ring;
                                            reporter.update_step(&format!(
                                                "{objective} search ({})",
                                                ckey.key_string_short(false)
                                            ));
                                            if self.scan_positions(
                                                &mut ckey,
                                                low,
                                                high,
                                                params,
                                                m_ring_scope,
                                                check_indicator,
                                                ciphertext,
                                                len,
                                                stats,
                                                reporter,
                                                total_keys,
                                                &mut count,
                                                &mut best_score,
                                                &mut best_key,
                                                &mut top_keys,
                                            ) {
                                                return best_key;
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

        reporter.write_message(&format!(
            "{objective} search finished: {count} keys in {:.1}s, best {best_score}",
            start_time.elapsed().as_secs_f64()
        ));

        if params.hc_sa_cycles > 0 && !top_keys.is_empty() {
            reporter.write_message(&format!(
                "{objective} search - refining top {} keys",
                top_keys.len()
            ));
            HillClimb.hill_climb_batch(
                &top_keys,
                params.hc_sa_cycles,
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
        best_key
    }

    /// Innermost message-setting loops for one ring configuration. Returns
    /// true when the sweep should stop (cancellation).
    #[allow(clippy::too_many_arguments)]
    fn scan_positions(
        &self,
        ckey: &mut Key,
        low: &Key,
        high: &Key,
        params: &SweepParams,
        m_ring_scope: MRingScope,
        check_indicator: bool,
        ciphertext: &[Letter],
        len: usize,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
        total_keys: u64,
        count: &mut u64,
        best_score: &mut i64,
        best_key: &mut Option<Key>,
        top_keys: &mut Vec<Key>,
    ) -> bool {
        for g_mesg in low.g_mesg..=high.g_mesg {
            ckey.g_mesg = g_mesg;
            let key_from_indicator = if check_indicator {
                ckey.key_from_indicator(&params.indicator, &params.indicator_message_key)
            } else {
                None
            };
            for l_mesg in low.l_mesg..=high.l_mesg {
                if let Some(ind) = &key_from_indicator {
                    if l_mesg != ind.l_mesg {
                        continue;
                    }
                }
                ckey.l_mesg = l_mesg;
                for m_mesg in low.m_mesg..=high.m_mesg {
                    if let Some(ind) = &key_from_indicator {
                        if m_mesg != ind.m_mesg {
                            continue;
                        }
                    }
                    ckey.m_mesg = m_mesg;
                    for r_mesg in low.r_mesg..=high.r_mesg {
                        if let Some(ind) = &key_from_indicator {
                            if r_mesg != ind.r_mesg {
                                continue;
                            }
                        }
                        ckey.r_mesg = r_mesg;
                        if reporter.should_terminate() {
                            return true;
                        }
                        if m_ring_scope != MRingScope::All {
                            let stepping = ckey.left_rotor_stepping_position(len);
                            if !Key::valid_wheels_state(len, stepping, m_ring_scope) {
                                continue;
                            }
                        }

                        *count += 1;
                        reporter.display_progress(*count, total_keys);

                        let score = if params.find_settings_ic {
                            (300_000.0 * ckey.ic_score_uncached(ciphertext, len)) as i64
                        } else {
                            ckey.tri_score_uncached(ciphertext, len, stats)
                        };
                        ckey.score = score;

                        if score > *best_score {
                            *best_score = score;
                            *best_key = Some(ckey.clone());
                            if score > params.min_score_to_print
                                && reporter.should_push(score)
                            {
                                let mut scored = ckey.clone();
                                scored.build_lookup(len);
                                let plain = scored.plaintext_string(ciphertext, len);
                                let desc =
                                    format!("{} SWEEP [{}/{}]",
                                        if params.find_settings_ic { "IC" } else { "TRIGRAMS" },
                                        *count, total_keys);
                                reporter.report_result(&scored, score, &plain, &desc, None);
                            }
                            if params.hc_every_best && params.hc_sa_cycles > 0 {
                                HillClimb.hill_climb_batch(
                                    std::slice::from_ref(ckey),
                                    1,
                                    params.threads,
                                    10_000,
                                    ciphertext,
                                    len,
                                    params.r_ring_spacing,
                                    params.seed,
                                    stats,
                                    reporter,
                                );
                            }
                        }

                        if top_keys.len() < MAX_TOP_KEYS {
                            top_keys.push(ckey.clone());
                            top_keys.sort_by(|a, b| b.score.cmp(&a.score));
                        } else if score > top_keys.last().expect("non-empty").score {
                            *top_keys.last_mut().expect("non-empty") = ckey.clone();
                            top_keys.sort_by(|a, b| b.score.cmp(&a.score));
                        }
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{to_letters, to_string};
    use crate::key::Model;
    use crate::report::ConsoleReporter;

    #[test]
    fn ic_sweep_recovers_message_setting() {
        // Encipher a redundant plaintext, then sweep the right rotor's
        // message setting by IC: the true setting must win.
        let mut true_key = Key::new(Model::M3);
        true_key.set_key("B:123:AAA:ABQ", Model::M3).unwrap();
        let plain = to_letters(&"DEUTSCHETRUPPENSINDJETZT".repeat(4));
        let mut ct = vec![0; plain.len()];
        true_key.encipher_all(&plain, &mut ct, plain.len());

        let mut from = Key::new(Model::M3);
        let mut to = Key::new(Model::M3);
        Key::set_range(&mut from, &mut to, "B:123:AAA:ABA", "B:123:AAA:ABZ", Model::M3)
            .unwrap();

        let stats = EnigmaStats::new();
        let reporter = ConsoleReporter::default();
        let params = SweepParams {
            find_settings_ic: true,
            ..Default::default()
        };
        let best = TrigramIcSearch
            .search(&from, &to, &params, &ct, ct.len(), &stats, &reporter)
            .expect("sweep produced a best key");
        assert_eq!(best.r_mesg, true_key.r_mesg);

        let mut check = best.clone();
        check.build_lookup(ct.len());
        assert_eq!(
            check.plaintext_string(&ct, ct.len()),
            to_string(&plain)
        );
    }

    #[test]
    fn cancelled_sweep_returns_none() {
        let mut from = Key::new(Model::M3);
        let mut to = Key::new(Model::M3);
        Key::set_range(&mut from, &mut to, "B:123:AAA:AAA", "B:123:AAA:ZZZ", Model::M3)
            .unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = EnigmaStats::new();
        let reporter = ConsoleReporter::default();
        reporter.cancel();
        let best = TrigramIcSearch.search(
            &from,
            &to,
            &SweepParams::default(),
            &ct,
            ct.len(),
            &stats,
            &reporter,
        );
        assert!(best.is_none());
    }
}
