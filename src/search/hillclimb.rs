//! Batch-synchronous orchestration of the plugboard optimizers over key
//! ranges and over pre-collected candidate lists.

use crate::alphabet::{estimated_time_string, to_string};
use crate::key::{Key, Letter, MRingScope, MAX_LEN};
use crate::report::ResultReporter;
use crate::search::worker::{HcSaWorker, OptimizerMode};
use crate::search::{build_pool, run_batch};
use crate::stats::EnigmaStats;
use std::time::Instant;

/// Candidate batches from top-key lists are cut to this size.
const BATCH_SIZE: usize = 26 * 26 * 26;

fn mode_label(mode: OptimizerMode, rounds: usize) -> String {
    match mode {
        OptimizerMode::HillClimb => format!("HILLCLIMBING-{rounds}"),
        OptimizerMode::Annealing => format!("ANNEALING-{rounds}"),
        OptimizerMode::GreedyPairs => format!("GREEDY-{rounds}"),
    }
}

fn mode_rates(mode: OptimizerMode) -> (u64, u64) {
    match mode {
        OptimizerMode::HillClimb => (2000, 2800),
        OptimizerMode::Annealing => (70, 140),
        OptimizerMode::GreedyPairs => (35, 50),
    }
}

pub struct HillClimb;

impl HillClimb {
    /// Sweeps every configuration in the range, running one optimizer unit
    /// per message setting. Batches are one (middle, right) message-key
    /// block; the orchestrator waits on the whole batch before harvesting.
    /// Returns the best score found, or `i64::MIN` on cancellation.
    #[allow(clippy::too_many_arguments)]
    pub fn hill_climb_range(
        &self,
        from: &Key,
        to: &Key,
        cycles: usize,
        threads: usize,
        min_score_to_print: i64,
        mut m_ring_scope: MRingScope,
        r_ring_spacing: usize,
        ciphertext: &[Letter],
        len: usize,
        mode: OptimizerMode,
        rounds: usize,
        seed: Option<u64>,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
    ) -> i64 {
        let low = from;
        let high = to;
        let r_ring_spacing = r_ring_spacing.max(1);
        if low.m_ring == high.m_ring {
            m_ring_scope = MRingScope::All;
        }
        let total_keys_per_cycle =
            Key::number_of_possible_keys(low, high, len, m_ring_scope, r_ring_spacing, false);

        let label = mode_label(mode, rounds);
        let (min_rate, max_rate) = mode_rates(mode);
        let normalized = total_keys_per_cycle * rounds as u64;
        reporter.write_message(&format!(
            "Starting {label} search: {total_keys_per_cycle} settings x {cycles} cycles = {} total. Estimated time per cycle: {}",
            cycles as u64 * total_keys_per_cycle,
            estimated_time_string(normalized, min_rate, max_rate)
        ));

        let pool = build_pool(threads);
        let mut global_score = 0i64;
        let mut count = 0u64;
        let mut rejected = 0u64;
        let mut worker_index = 0u64;
        let start_time = Instant::now();

        let mut ckey = from.clone();
        for cycle in 0..cycles {
            let mut keys_in_cycle = 0u64;
            if cycle >= 100 && cycle % 100 == 0 && global_score > min_score_to_print {
                reporter.write_message(&format!(
                    "{label} cycle {} best {global_score} (elapsed {:.1}s)",
                    cycle + 1,
                    start_time.elapsed().as_secs_f64()
                ));
            }
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
                                                ckey.r_ring = r_ring;
                                                reporter.update_step(&format!(
                                                    "{label} ({})",
                                                    ckey.key_string_short(false)
                                                ));
                                                for g_mesg in low.g_mesg..=high.g_mesg {
                                                    ckey.g_mesg = g_mesg;
                                                    for l_mesg in low.l_mesg..=high.l_mesg {
                                                        ckey.l_mesg = l_mesg;

                                                        let mut workers: Vec<HcSaWorker> =
                                                            Vec::with_capacity(26 * 26);
                                                        for m_mesg in low.m_mesg..=high.m_mesg {
                                                            ckey.m_mesg = m_mesg;
                                                            for r_mesg in low.r_mesg..=high.r_mesg
                                                            {
                                                                ckey.r_mesg = r_mesg;
                                                                if reporter.should_terminate() {
                                                                    return i64::MIN;
                                                                }
                                                                if ckey.r_ring % r_ring_spacing
                                                                    != cycle % r_ring_spacing
                                                                {
                                                                    rejected += 1;
                                                                    continue;
                                                                }
                                                                if m_ring_scope != MRingScope::All
                                                                {
                                                                    let stepping = ckey
                                                                        .left_rotor_stepping_position(len);
                                                                    if !Key::valid_wheels_state(
                                                                        len,
                                                                        stepping,
                                                                        m_ring_scope,
                                                                    ) {
                                                                        rejected += 1;
                                                                        continue;
                                                                    }
                                                                }
                                                                workers.push(HcSaWorker::new(
                                                                    &ckey,
                                                                    &from.stbrett,
                                                                    ciphertext,
                                                                    len,
                                                                    cycle == 0,
                                                                    mode,
                                                                    rounds,
                                                                    r_ring_spacing,
                                                                    seed.map(|s| {
                                                                        s + worker_index
                                                                    }),
                                                                ));
                                                                worker_index += 1;
                                                                keys_in_cycle += 1;
                                                            }
                                                        }
                                                        if workers.is_empty() {
                                                            continue;
                                                        }
                                                        run_batch(
                                                            &pool,
                                                            &mut workers,
                                                            stats,
                                                            reporter,
                                                        );
                                                        reporter.display_progress(
                                                            keys_in_cycle,
                                                            total_keys_per_cycle,
                                                        );
                                                        for worker in &mut workers {
                                                            count += 1;
                                                            if worker.key.score > global_score {
                                                                global_score = worker.key.score;
                                                            }
                                                            if global_score > min_score_to_print
                                                                && reporter
                                                                    .should_push(worker.key.score)
                                                            {
                                                                Self::report_worker(
                                                                    worker,
                                                                    &label,
                                                                    count,
                                                                    cycle,
                                                                    keys_in_cycle,
                                                                    total_keys_per_cycle,
                                                                    start_time,
                                                                    ciphertext,
                                                                    len,
                                                                    reporter,
                                                                );
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
                    }
                }
            }
        }

        if global_score > min_score_to_print {
            reporter.write_message(&format!(
                "{label} - finished after {cycles} cycles - best {global_score}, checked {count} ({rejected} filtered) in {:.1}s",
                start_time.elapsed().as_secs_f64()
            ));
        }
        global_score
    }

    #[allow(clippy::too_many_arguments)]
    fn report_worker(
        worker: &mut HcSaWorker,
        label: &str,
        count: u64,
        cycle: usize,
        keys_in_cycle: u64,
        total_keys: u64,
        start_time: Instant,
        ciphertext: &[Letter],
        len: usize,
        reporter: &dyn ResultReporter,
    ) {
        let offset = worker.best_offset;
        worker.key.add_right_rotor_offset(offset);
        worker.key.build_lookup(len);
        let plain = worker.key.plaintext_string(ciphertext, len);
        let elapsed = start_time.elapsed().as_millis().max(1) as u64;
        let desc = format!(
            "{label} [{}K][{}: {}/{}][{}/sec][{} Sec][Offset: {offset}]",
            count / 1000,
            cycle + 1,
            keys_in_cycle,
            total_keys,
            count * 1000 / elapsed,
            elapsed / 1000,
        );
        reporter.report_result(&worker.key, worker.key.score, &plain, &desc, None);
        worker.key.sub_right_rotor_offset(offset);
    }

    /// Polishes a pre-collected list of candidate keys (for example Bombe
    /// stops). Each pass re-seeds the optimizers from the candidates' own
    /// deduced plugboards; the first pass polishes those boards directly.
    #[allow(clippy::too_many_arguments)]
    pub fn hill_climb_batch(
        &self,
        keys: &[Key],
        hc_max_pass: usize,
        threads: usize,
        min_score_to_print: i64,
        ciphertext: &[Letter],
        len: usize,
        r_ring_spacing: usize,
        seed: Option<u64>,
        stats: &EnigmaStats,
        reporter: &dyn ResultReporter,
    ) -> i64 {
        let pool = build_pool(threads);
        let mut best_score = 0i64;
        let mut count = 0u64;
        let mut worker_index = 0u64;
        let start_time = Instant::now();

        for pass in 0..hc_max_pass {
            if reporter.should_terminate() {
                break;
            }
            reporter.update_step(&format!(
                "Hill Climbing Batch Pass {} of {hc_max_pass}",
                pass + 1
            ));
            let mut count_in_pass = 0u64;
            if keys.len() * hc_max_pass > 10_000 {
                reporter.write_message(&format!(
                    "HILL CLIMBING BATCH OF {} keys - pass {} of {hc_max_pass}",
                    keys.len(),
                    pass + 1
                ));
            }

            for chunk in keys.chunks(BATCH_SIZE) {
                if reporter.should_terminate() {
                    break;
                }
                let mut workers: Vec<HcSaWorker> = chunk
                    .iter()
                    .map(|key| {
                        let w = HcSaWorker::new(
                            key,
                            &key.stbrett,
                            ciphertext,
                            len,
                            pass == 0,
                            OptimizerMode::Annealing,
                            1,
                            r_ring_spacing,
                            seed.map(|s| s + worker_index),
                        );
                        worker_index += 1;
                        w
                    })
                    .collect();

                run_batch(&pool, &mut workers, stats, reporter);

                for worker in &mut workers {
                    if reporter.should_terminate() {
                        break;
                    }
                    count += 1;
                    count_in_pass += 1;
                    let score = worker.key.score;
                    if score > min_score_to_print {
                        if reporter.should_push(score) {
                            let offset = worker.best_offset;
                            worker.key.add_right_rotor_offset(offset);
                            worker.key.build_lookup(len);
                            let plain = worker.key.plaintext_string(ciphertext, len);
                            let elapsed = start_time.elapsed().as_millis().max(1) as u64;
                            let desc = format!(
                                "HILLCLIMBING TOP [{}K][{}: {count_in_pass}/{}][{} Sec][{}/sec]",
                                count / 1000,
                                pass + 1,
                                keys.len(),
                                elapsed / 1000,
                                count * 1000 / elapsed,
                            );
                            reporter.report_result(&worker.key, score, &plain, &desc, None);
                            worker.key.sub_right_rotor_offset(offset);
                        }
                        if score > best_score {
                            best_score = score;
                            worker.key.build_lookup(len);
                            let plain = worker.key.plaintext_string(ciphertext, len);
                            let mut steppings = [0 as Letter; MAX_LEN];
                            worker.key.show_steppings(&mut steppings, len);
                            let trace = to_string(&steppings[..len]).replace('X', "");
                            reporter.write_message(&format!("{plain} {trace}"));
                        }
                    }
                }
            }
        }
        best_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::to_letters;
    use crate::key::Model;
    use crate::report::ConsoleReporter;

    fn flat_stats() -> EnigmaStats {
        let mut stats = EnigmaStats::new();
        stats.biflat.iter_mut().for_each(|v| *v = 100);
        stats.triflat.iter_mut().for_each(|v| *v = 100);
        stats
    }

    #[test]
    fn range_sweep_over_single_setting_completes() {
        let mut from = Key::new(Model::M3);
        let mut to = Key::new(Model::M3);
        Key::set_range(&mut from, &mut to, "B:123:AAA:AAA", "B:123:AAA:AAC", Model::M3)
            .unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNMQWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = flat_stats();
        let reporter = ConsoleReporter::default();
        let best = HillClimb.hill_climb_range(
            &from,
            &to,
            1,
            2,
            0,
            MRingScope::All,
            1,
            &ct,
            ct.len(),
            OptimizerMode::HillClimb,
            1,
            Some(5),
            &stats,
            &reporter,
        );
        assert!(best > 0);
    }

    #[test]
    fn cancelled_range_sweep_stops_early() {
        let mut from = Key::new(Model::M3);
        let mut to = Key::new(Model::M3);
        Key::set_range(&mut from, &mut to, "B:123:AAA:AAA", "B:123:AAA:ZZZ", Model::M3)
            .unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = flat_stats();
        let reporter = ConsoleReporter::default();
        reporter.cancel();
        let best = HillClimb.hill_climb_range(
            &from,
            &to,
            1,
            2,
            0,
            MRingScope::All,
            1,
            &ct,
            ct.len(),
            OptimizerMode::HillClimb,
            1,
            Some(5),
            &stats,
            &reporter,
        );
        assert_eq!(best, i64::MIN);
    }

    #[test]
    fn batch_polishes_seeded_keys() {
        let mut key = Key::new(Model::M3);
        key.set_key("B:123:AAA:AAA", Model::M3).unwrap();
        key.set_stecker("AB").unwrap();
        let ct = to_letters("QWERTZUIOPASDFGHJKLYXCVBNMQWERTZUIOPASDFGHJKLYXCVBNM");
        let stats = flat_stats();
        let reporter = ConsoleReporter::default();
        let best = HillClimb.hill_climb_batch(
            &[key],
            1,
            2,
            0,
            &ct,
            ct.len(),
            1,
            Some(9),
            &stats,
            &reporter,
        );
        assert!(best > 0);
    }
}
