//! Language n-gram statistics shared read-only by all search workers.
//!
//! Two table flavors exist in the wild: raw corpus counts, and resources that
//! were already log-scaled once and only need min-normalization. Both load
//! paths are provided; tables are immutable after load.

use crate::alphabet::{digit_index, letter_index};
use std::io::BufRead;
use tracing::{debug, warn};

/// Historical German letter counts (per mille), the built-in unigram table.
const DEFAULT_UNIGRAMS: [i64; 26] = [
    609, 220, 72, 290, 1291, 303, 281, 188, 616, 41, 199, 390, 272, 841, 442, 147, 202, 687, 623,
    541, 447, 138, 168, 698, 89, 205,
];

pub struct EnigmaStats {
    pub unidict: [i64; 26],
    /// Bigram log frequencies, indexed `(l1 << 5) + l2`.
    pub biflat: Vec<i64>,
    /// Trigram log frequencies, indexed `((l1 << 5) + l2) << 5) + l3`.
    pub triflat: Vec<i64>,
    new_trigrams: bool,
}

impl Default for EnigmaStats {
    fn default() -> Self {
        EnigmaStats {
            unidict: DEFAULT_UNIGRAMS,
            biflat: vec![0; 32 * 32],
            triflat: vec![0; 32 * 32 * 32],
            new_trigrams: false,
        }
    }
}

#[inline(always)]
pub fn tri_index(l1: usize, l2: usize, l3: usize) -> usize {
    (((l1 << 5) + l2) << 5) + l3
}

/// Parses `<letters><frequency>` from one line: `n` leading letters, then
/// digits accumulated from the rest (separator characters are skipped).
fn parse_line(line: &str, n: usize) -> Option<(Vec<usize>, i64)> {
    let mut chars = line.chars();
    let mut letters = Vec::with_capacity(n);
    for _ in 0..n {
        let l = letter_index(chars.next()?);
        if l < 0 {
            return None;
        }
        letters.push(l as usize);
    }
    let mut freq = 0i64;
    for c in chars {
        let d = digit_index(c);
        if d >= 0 {
            freq = freq * 10 + d as i64;
        }
    }
    Some((letters, freq))
}

impl EnigmaStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescales the unigram counts to the shared integer log scale.
    pub fn unidict_to_log(&mut self) {
        let min = *self.unidict.iter().min().expect("26 entries");
        for v in self.unidict.iter_mut() {
            *v = (10000.0 * ((std::f64::consts::E * *v as f64) / min as f64).ln()) as i64;
        }
    }

    /// Loads raw bigram counts and converts them to the integer log scale
    /// `round(10000 * ln(e * freq / min_nonzero))`; unseen stays zero.
    pub fn load_bigrams_from_counts<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        self.biflat.iter_mut().for_each(|v| *v = 0);
        let mut items = 0;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                break;
            }
            if let Some((l, freq)) = parse_line(&line, 2) {
                self.biflat[(l[0] << 5) + l[1]] = freq;
                items += 1;
            }
        }
        let min = self.min_nonzero_bi();
        for l1 in 0..26 {
            for l2 in 0..26 {
                let v = &mut self.biflat[(l1 << 5) + l2];
                if *v != 0 {
                    *v = (10000.0 * ((std::f64::consts::E * *v as f64) / min as f64).ln()) as i64;
                }
            }
        }
        debug!(items, "bigram counts loaded and converted to log scale");
        Ok(items)
    }

    /// Loads raw trigram counts and converts to the integer log scale.
    pub fn load_trigrams_from_counts<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        self.triflat.iter_mut().for_each(|v| *v = 0);
        let mut items = 0;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                break;
            }
            if let Some((l, freq)) = parse_line(&line, 3) {
                self.triflat[tri_index(l[0], l[1], l[2])] = freq;
                items += 1;
            }
        }
        let min = self.min_nonzero_tri();
        for l1 in 0..26 {
            for l2 in 0..26 {
                for l3 in 0..26 {
                    let v = &mut self.triflat[tri_index(l1, l2, l3)];
                    if *v != 0 {
                        *v = (10000.0 * ((std::f64::consts::E * *v as f64) / min as f64).ln())
                            as i64;
                    }
                }
            }
        }
        debug!(items, "trigram counts loaded and converted to log scale");
        Ok(items)
    }

    /// Loads pre-logged bigram resource text; values are renormalized so the
    /// minimum non-zero entry maps to 1000.
    pub fn load_bigrams_prelogged(&mut self, resource: &str) -> usize {
        let mut min_nonzero = i64::MAX;
        let mut items = 0;
        for line in resource.lines() {
            if let Some((l, freq)) = parse_line(line, 2) {
                self.biflat[(l[0] << 5) + l[1]] = freq;
                if freq > 0 && freq < min_nonzero {
                    min_nonzero = freq;
                }
                items += 1;
            }
        }
        if min_nonzero < 1000 {
            for l1 in 0..26 {
                for l2 in 0..26 {
                    let v = &mut self.biflat[(l1 << 5) + l2];
                    if *v != 0 {
                        *v = if *v == min_nonzero {
                            1000
                        } else {
                            (*v * 1000) / min_nonzero
                        };
                    }
                }
            }
        }
        if items == 0 {
            warn!("bigram resource contained no usable lines");
        }
        items
    }

    /// Loads pre-logged trigram resource text. `new_flavor` selects the
    /// newer table family, which carries its own acceptance thresholds.
    pub fn load_trigrams_prelogged(&mut self, resource: &str, new_flavor: bool) -> usize {
        self.new_trigrams = new_flavor;
        let mut min_nonzero = i64::MAX;
        let mut items = 0;
        for line in resource.lines() {
            if let Some((l, freq)) = parse_line(line, 3) {
                self.triflat[tri_index(l[0], l[1], l[2])] = freq;
                if freq > 0 && freq < min_nonzero {
                    min_nonzero = freq;
                }
                items += 1;
            }
        }
        if min_nonzero < 1000 {
            let mult = if new_flavor { 1500.0 } else { 1000.0 } / min_nonzero as f64;
            for v in self.triflat.iter_mut() {
                if *v != 0 {
                    *v = (*v as f64 * mult) as i64;
                }
            }
        }
        if items == 0 {
            warn!("trigram resource contained no usable lines");
        }
        items
    }

    /// Length-tiered trigram acceptance threshold: a decoded candidate whose
    /// trigram score clears this is worth expensive follow-up. The tiers are
    /// a fixed empirical contract, a step function, never interpolated.
    pub fn tri_threshold(&self, len: usize) -> f64 {
        if self.new_trigrams {
            if len <= 50 {
                13000.0
            } else if len <= 100 {
                11000.0
            } else {
                10000.0
            }
        } else {
            10000.0
        }
    }

    fn min_nonzero_bi(&self) -> i64 {
        let mut min = i64::MAX;
        for l1 in 0..26 {
            for l2 in 0..26 {
                let v = self.biflat[(l1 << 5) + l2];
                if v != 0 && v < min {
                    min = v;
                }
            }
        }
        if min == i64::MAX {
            1
        } else {
            min
        }
    }

    fn min_nonzero_tri(&self) -> i64 {
        let mut min = i64::MAX;
        for l1 in 0..26 {
            for l2 in 0..26 {
                for l3 in 0..26 {
                    let v = self.triflat[tri_index(l1, l2, l3)];
                    if v != 0 && v < min {
                        min = v;
                    }
                }
            }
        }
        if min == i64::MAX {
            1
        } else {
            min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn count_loading_log_scales() {
        let mut stats = EnigmaStats::new();
        let data = "AB 10\nBC 100\nCD 1000\n";
        let items = stats
            .load_bigrams_from_counts(Cursor::new(data))
            .unwrap();
        assert_eq!(items, 3);
        // Minimum non-zero entry maps to round(10000 * ln(e)) = 10000.
        assert_eq!(stats.biflat[(0 << 5) + 1], 10000);
        let bc = stats.biflat[(1 << 5) + 2];
        let expected = (10000.0 * (std::f64::consts::E * 10.0f64).ln()) as i64;
        assert_eq!(bc, expected);
        // Unseen entries stay zero, never negative infinity.
        assert_eq!(stats.biflat[(4 << 5) + 4], 0);
    }

    #[test]
    fn prelogged_loading_normalizes_minimum() {
        let mut stats = EnigmaStats::new();
        let data = "ABC 5\nBCD 10\n";
        stats.load_trigrams_prelogged(data, false);
        assert_eq!(stats.triflat[tri_index(0, 1, 2)], 1000);
        assert_eq!(stats.triflat[tri_index(1, 2, 3)], 2000);
    }

    #[test]
    fn threshold_tiers() {
        let mut stats = EnigmaStats::new();
        stats.load_trigrams_prelogged("ABC 5\n", true);
        assert_eq!(stats.tri_threshold(30), 13000.0);
        assert_eq!(stats.tri_threshold(50), 13000.0);
        assert_eq!(stats.tri_threshold(75), 11000.0);
        assert_eq!(stats.tri_threshold(100), 11000.0);
        assert_eq!(stats.tri_threshold(101), 10000.0);

        let mut legacy = EnigmaStats::new();
        legacy.load_trigrams_prelogged("ABC 5\n", false);
        assert_eq!(legacy.tri_threshold(30), 10000.0);
    }

    #[test]
    fn unigram_log_conversion() {
        let mut stats = EnigmaStats::new();
        stats.unidict_to_log();
        // The rarest letter (J) maps to round(10000 * ln(e)) = 10000.
        assert_eq!(stats.unidict[9], 10000);
        assert!(stats.unidict[4] > stats.unidict[9]);
    }
}
