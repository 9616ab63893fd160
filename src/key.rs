//! The machine configuration under test: rotor selection, ring and message
//! settings, plugboard, the derived per-position substitution table, and the
//! scoring primitives every search component funnels through.

use crate::alphabet::{digit_index, letter_char, letter_index};
use crate::error::{EnResult, EnigmaError};
use crate::stats::EnigmaStats;
use crate::wiring::{self, WiringSet};
use std::fmt::Write as _;
use strum_macros::{Display, EnumIter, EnumString};

pub use crate::alphabet::Letter;

/// Longest supported message.
pub const MAX_LEN: usize = 1800;
/// Hardware limit: at most 20 letters may be plugged (10 cables).
pub const MAX_STB_PLUGS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Model {
    /// Army/air force 3-rotor machine, wheels I-V, reflectors A/B/C.
    H,
    /// Navy 3-rotor machine, wheels I-VIII, reflectors B/C.
    M3,
    /// Navy 4-rotor machine, thin reflectors plus Beta/Gamma greek wheel.
    M4,
    /// Pre-war commercial variant, fixed reflector.
    A16081,
    /// Pre-war commercial variant, fixed reflector.
    A16101,
}

impl Model {
    pub fn rotor_count(self) -> usize {
        if self == Model::M4 {
            4
        } else {
            3
        }
    }

    /// Inclusive range of selectable reflector indices.
    pub fn ukw_range(self) -> (usize, usize) {
        match self {
            Model::H => (0, 2),
            Model::M3 => (1, 2),
            Model::M4 => (3, 4),
            Model::A16081 | Model::A16101 => (0, 0),
        }
    }

    /// Inclusive range of wheel numbers accepted in the l/m/r slots.
    pub fn slot_range(self) -> (usize, usize) {
        match self {
            Model::M3 | Model::M4 => (1, 8),
            _ => (1, 5),
        }
    }

    /// Greek-slot values: Beta/Gamma on M4, the identity wheel otherwise.
    pub fn g_slot_range(self) -> (usize, usize) {
        if self == Model::M4 {
            (9, 10)
        } else {
            (0, 0)
        }
    }
}

/// Scoring objective used by `Key::eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum ScoreMode {
    Ic,
    Uni,
    Bi,
    Tri,
}

/// Middle-ring enumeration pruning policies. Only `All` is exhaustive; the
/// others restrict to settings classified by where (if at all) the middle
/// rotor kicks the left rotor inside the message window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
pub enum MRingScope {
    #[default]
    All,
    OneNonStepping,
    AllSteppingInsideMsg,
    AllNonStepping,
    AllSteppingInsideMsgAndOneNonStepping,
    SteppingInsideMsgWithSmallImpact,
}

/// Derived per-position substitution cache, stride 32 per position.
/// Deliberately not part of the cloned value: a cloned key starts cold and
/// rebuilds on demand.
#[derive(Debug, Default)]
pub struct PathLookup {
    table: Vec<i16>,
}

impl Clone for PathLookup {
    fn clone(&self) -> Self {
        PathLookup::default()
    }
}

impl PathLookup {
    #[inline(always)]
    pub fn at(&self, pos: usize, c: Letter) -> Letter {
        self.table[(pos << 5) + c as usize]
    }

    pub fn covers(&self, len: usize) -> bool {
        self.table.len() >= len << 5
    }

    fn ensure(&mut self, positions: usize) {
        let needed = positions << 5;
        if self.table.len() != needed {
            self.table = vec![0; needed];
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Offsets {
    g: usize,
    l: usize,
    m: usize,
    r: usize,
}

#[derive(Debug, Clone)]
pub struct Key {
    pub model: Model,
    pub ukw_num: usize,
    pub g_slot: usize,
    pub l_slot: usize,
    pub m_slot: usize,
    pub r_slot: usize,
    pub g_ring: usize,
    pub l_ring: usize,
    pub m_ring: usize,
    pub r_ring: usize,
    pub g_mesg: usize,
    pub l_mesg: usize,
    pub m_mesg: usize,
    pub r_mesg: usize,
    /// Plugboard: an involution over 0..26. `stbrett[i] == i` means unplugged.
    pub stbrett: [Letter; 26],
    /// Last fitness value; -1 marks "not yet scored".
    pub score: i64,
    pub lookup: PathLookup,
}

impl Key {
    pub fn new(model: Model) -> Key {
        let mut key = Key {
            model,
            ukw_num: 0,
            g_slot: 0,
            l_slot: 1,
            m_slot: 2,
            r_slot: 3,
            g_ring: 0,
            l_ring: 0,
            m_ring: 0,
            r_ring: 0,
            g_mesg: 0,
            l_mesg: 0,
            m_mesg: 0,
            r_mesg: 0,
            stbrett: [0; 26],
            score: 0,
            lookup: PathLookup::default(),
        };
        key.init_defaults(model);
        key
    }

    /// Resets to the baseline configuration for `model`: first wheels, first
    /// reflector, zero rings and positions, empty plugboard.
    pub fn init_defaults(&mut self, model: Model) {
        self.model = model;
        self.l_slot = 1;
        self.m_slot = 2;
        self.r_slot = 3;
        self.g_ring = 0;
        self.l_ring = 0;
        self.m_ring = 0;
        self.r_ring = 0;
        self.g_mesg = 0;
        self.l_mesg = 0;
        self.m_mesg = 0;
        self.r_mesg = 0;
        self.score = 0;
        self.lookup = PathLookup::default();
        match model {
            Model::H | Model::M3 => {
                self.ukw_num = 1;
                self.g_slot = 0;
            }
            Model::M4 => {
                self.ukw_num = 3;
                self.g_slot = 9;
            }
            Model::A16081 | Model::A16101 => {
                self.ukw_num = 0;
                self.g_slot = 0;
            }
        }
        for i in 0..26 {
            self.stbrett[i] = i as Letter;
        }
    }

    fn wiring(&self) -> &'static WiringSet {
        wiring::for_model(self.model)
    }

    fn offsets(&self) -> Offsets {
        Offsets {
            g: (self.g_mesg + 26 - self.g_ring) % 26,
            l: (self.l_mesg + 26 - self.l_ring) % 26,
            m: (self.m_mesg + 26 - self.m_ring) % 26,
            r: (self.r_mesg + 26 - self.r_ring) % 26,
        }
    }

    /// One keypress worth of rotor motion. The middle rotor at its own notch
    /// advances itself and the left rotor in the same tick (double-step);
    /// the greek wheel never moves.
    #[inline(always)]
    fn step_offsets(off: &mut Offsets, r_turn: &[bool; 26], m_turn: &[bool; 26]) {
        if m_turn[off.m] {
            off.r = (off.r + 1) % 26;
            off.m = (off.m + 1) % 26;
            off.l = (off.l + 1) % 26;
        } else if r_turn[off.r] {
            off.r = (off.r + 1) % 26;
            off.m = (off.m + 1) % 26;
        } else {
            off.r = (off.r + 1) % 26;
        }
    }

    /// Substitution through rotors and reflector (entry wheel is identity on
    /// these models; the plugboard is applied by callers).
    #[inline(always)]
    fn scramble(&self, w: &WiringSet, off: &Offsets, c: Letter) -> Letter {
        let fr = &w.forward[self.r_slot];
        let fm = &w.forward[self.m_slot];
        let fl = &w.forward[self.l_slot];
        let fg = &w.forward[self.g_slot];
        let ukw = &w.reflector[self.ukw_num];
        let rg = &w.reverse[self.g_slot];
        let rl = &w.reverse[self.l_slot];
        let rm = &w.reverse[self.m_slot];
        let rr = &w.reverse[self.r_slot];

        let mut c = c as usize;
        c = fr[c + off.r + 26] as usize;
        c = fm[c + 26 + off.m - off.r] as usize;
        c = fl[c + 26 + off.l - off.m] as usize;
        c = fg[c + 26 + off.g - off.l] as usize;
        c = ukw[c + 26 - off.g] as usize;
        c = rg[c + off.g] as usize;
        c = rl[c + 26 + off.l - off.g] as usize;
        c = rm[c + 26 + off.m - off.l] as usize;
        c = rr[c + 26 + off.r - off.m] as usize;
        ((c + 26 - off.r) % 26) as Letter
    }

    /// Builds the substitution table for positions 0..len.
    pub fn build_lookup(&mut self, len: usize) {
        self.build_lookup_range(0, len);
    }

    /// Builds the table for the window `from..from+len`, stepping through the
    /// leading positions without emitting them.
    pub fn build_lookup_range(&mut self, from: usize, len: usize) {
        let w = self.wiring();
        let positions = from + len;
        let mut lookup = std::mem::take(&mut self.lookup);
        lookup.ensure(positions);

        let mut off = self.offsets();
        let r_turn = wiring::turnover_points(w, self.r_slot, self.r_ring);
        let m_turn = wiring::turnover_points(w, self.m_slot, self.m_ring);

        for i in 0..positions {
            Self::step_offsets(&mut off, &r_turn, &m_turn);
            if i >= from {
                for k in 0..26 {
                    lookup.table[(i << 5) + k] = self.scramble(w, &off, k as Letter);
                }
            }
        }
        self.lookup = lookup;
    }

    /// Enciphers (equivalently deciphers) `input` from the stored rotor
    /// positions. Does not use or require the cached lookup; the stepping
    /// sequence is identical to `build_lookup` by construction.
    pub fn encipher_all(&self, input: &[Letter], output: &mut [Letter], len: usize) {
        let w = self.wiring();
        let mut off = self.offsets();
        let r_turn = wiring::turnover_points(w, self.r_slot, self.r_ring);
        let m_turn = wiring::turnover_points(w, self.m_slot, self.m_ring);

        for i in 0..len {
            Self::step_offsets(&mut off, &r_turn, &m_turn);
            let c = self.stbrett[input[i] as usize];
            let c = self.scramble(w, &off, c);
            output[i] = self.stbrett[c as usize];
        }
    }

    /// Position (0-based keypress index) at which the middle rotor advances
    /// the left rotor, scanning one full right-rotor revolution past the
    /// message; `None` if it never does within that horizon.
    pub fn left_rotor_stepping_position(&self, len: usize) -> Option<usize> {
        let w = self.wiring();
        let mut off = self.offsets();
        let r_turn = wiring::turnover_points(w, self.r_slot, self.r_ring);
        let m_turn = wiring::turnover_points(w, self.m_slot, self.m_ring);

        for i in 0..(len + 26) {
            if m_turn[off.m] {
                return Some(i);
            } else if r_turn[off.r] {
                off.r = (off.r + 1) % 26;
                off.m = (off.m + 1) % 26;
            } else {
                off.r = (off.r + 1) % 26;
            }
        }
        None
    }

    /// Whether a middle-ring setting is inside the enumeration scope, judged
    /// by the left-rotor stepping position for this message length.
    pub fn valid_wheels_state(len: usize, stepping: Option<usize>, scope: MRingScope) -> bool {
        match scope {
            MRingScope::All => true,
            MRingScope::OneNonStepping => matches!(stepping, Some(p) if p >= len),
            MRingScope::AllSteppingInsideMsg => matches!(stepping, Some(p) if p < len),
            MRingScope::AllNonStepping => stepping.is_none(),
            MRingScope::AllSteppingInsideMsgAndOneNonStepping => stepping.is_some(),
            MRingScope::SteppingInsideMsgWithSmallImpact => {
                matches!(stepping, Some(p) if p >= 4 * len / 5 || p < len / 5)
            }
        }
    }

    // ---- plugboard -------------------------------------------------------

    pub fn stb_connect(&mut self, x: Letter, y: Letter) {
        assert_ne!(x, y, "cannot plug a letter to itself");
        self.stbrett[x as usize] = y;
        self.stbrett[y as usize] = x;
    }

    pub fn stb_disconnect(&mut self, x: Letter, y: Letter) {
        self.stbrett[x as usize] = x;
        self.stbrett[y as usize] = y;
    }

    pub fn swap(&mut self, x: Letter, y: Letter) {
        assert_ne!(x, y, "not a real swap");
        self.stbrett.swap(x as usize, y as usize);
    }

    pub fn stb_count(&self) -> usize {
        (0..26).filter(|&i| self.stbrett[i] != i as Letter).count()
    }

    /// Plugged pairs, each reported once with the lower letter first.
    pub fn stecker_pairs(&self) -> Vec<(Letter, Letter)> {
        let mut pairs = Vec::new();
        for i in 0..26 {
            let s = self.stbrett[i];
            if s > i as Letter {
                pairs.push((i as Letter, s));
            }
        }
        pairs
    }

    pub fn stb_string(&self) -> String {
        let mut s = String::new();
        for (a, b) in self.stecker_pairs() {
            s.push(letter_char(a));
            s.push(letter_char(b));
        }
        s
    }

    /// Bulk plugboard replacement from a pair string like "ABCD" (A-B, C-D).
    pub fn set_stecker(&mut self, s: &str) -> EnResult<()> {
        for i in 0..26 {
            self.stbrett[i] = i as Letter;
        }
        if s.is_empty() {
            return Ok(());
        }
        if s.len() > MAX_STB_PLUGS || s.len() % 2 != 0 {
            return Err(EnigmaError::Config(format!(
                "invalid stecker string '{s}': need an even number of letters, at most {MAX_STB_PLUGS}"
            )));
        }
        let mut letters = Vec::with_capacity(s.len());
        for c in s.chars() {
            let l = letter_index(c);
            if l < 0 {
                return Err(EnigmaError::Config(format!(
                    "invalid stecker string '{s}': non-alphabetic character"
                )));
            }
            if letters.contains(&l) {
                return Err(EnigmaError::Config(format!(
                    "invalid stecker string '{s}': letter {} repeated",
                    letter_char(l)
                )));
            }
            letters.push(l);
        }
        for pair in letters.chunks(2) {
            self.swap(pair[0], pair[1]);
        }
        Ok(())
    }

    /// Bulk plugboard replacement from a full mapping. Rejects mappings that
    /// are not involutions or exceed the plug limit.
    pub fn set_stecker_array(&mut self, stb: &[Letter; 26]) -> EnResult<()> {
        let mut plugged = 0;
        for i in 0..26 {
            let s = stb[i];
            if !(0..26).contains(&s) || stb[s as usize] != i as Letter {
                return Err(EnigmaError::Config(format!(
                    "plugboard mapping is not an involution at {}",
                    letter_char(i as Letter)
                )));
            }
            if s != i as Letter {
                plugged += 1;
            }
        }
        if plugged > MAX_STB_PLUGS {
            return Err(EnigmaError::Config(format!(
                "plugboard uses {plugged} letters, hardware limit is {MAX_STB_PLUGS}"
            )));
        }
        self.stbrett = *stb;
        Ok(())
    }

    /// Number of positions at which a pair-string plugboard agrees with the
    /// current board (26 = identical boards).
    pub fn compare_stecker(&self, s: &str) -> EnResult<usize> {
        let mut other = Key::new(self.model);
        other.set_stecker(s)?;
        Ok((0..26)
            .filter(|&i| other.stbrett[i] == self.stbrett[i])
            .count())
    }

    // ---- scoring through the cached lookup -------------------------------

    fn assert_lookup(&self, len: usize) {
        assert!(
            self.lookup.covers(len),
            "lookup table not built for message length {len}"
        );
    }

    /// Index of coincidence of the decryption. The trailing plugboard pass is
    /// omitted: IC is invariant under any fixed permutation of the output.
    pub fn ic_score(&self, ciphertext: &[Letter], len: usize) -> f64 {
        if len < 2 {
            return 0.0;
        }
        self.assert_lookup(len);
        let mut f = [0i64; 26];
        for (i, &ct) in ciphertext.iter().take(len).enumerate() {
            let c = self.stbrett[ct as usize];
            let c = self.lookup.at(i, c);
            f[c as usize] += 1;
        }
        let mut ic = 0.0;
        for fi in f {
            ic += (fi * (fi - 1)) as f64;
        }
        ic / (len * (len - 1)) as f64
    }

    pub fn uni_score(&self, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        self.assert_lookup(len);
        let mut s = 0;
        for (i, &ct) in ciphertext.iter().take(len).enumerate() {
            let c = self.stbrett[ct as usize];
            let c = self.lookup.at(i, c);
            let c = self.stbrett[c as usize];
            s += stats.unidict[c as usize];
        }
        s / len as i64
    }

    pub fn bi_score(&self, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        self.assert_lookup(len);
        let mut s = 0;
        let mut c1 = self.stbrett[ciphertext[0] as usize];
        c1 = self.lookup.at(0, c1);
        c1 = self.stbrett[c1 as usize];
        for i in 1..len {
            let mut c2 = self.stbrett[ciphertext[i] as usize];
            c2 = self.lookup.at(i, c2);
            c2 = self.stbrett[c2 as usize];
            s += stats.biflat[((c1 as usize) << 5) + c2 as usize];
            c1 = c2;
        }
        s / (len - 1) as i64
    }

    pub fn tri_score(&self, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        self.assert_lookup(len);
        let mut s = 0;
        let mut tri_index = 0usize;
        for (i, &ct) in ciphertext.iter().take(len).enumerate() {
            let c = self.stbrett[ct as usize];
            let c = self.lookup.at(i, c);
            let c = self.stbrett[c as usize];
            tri_index = ((tri_index & 0x3ff) << 5) + c as usize;
            if i >= 2 {
                s += stats.triflat[tri_index];
            }
        }
        s / (len - 2) as i64
    }

    /// Unified objective with the historical scale factors, so scores from
    /// different stages land on comparable magnitudes.
    pub fn eval(&self, mode: ScoreMode, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        match mode {
            ScoreMode::Ic => (300_000.0 * self.ic_score(ciphertext, len)) as i64,
            ScoreMode::Bi => (self.bi_score(ciphertext, len, stats) as f64 * 0.50) as i64,
            ScoreMode::Tri => self.tri_score(ciphertext, len, stats),
            ScoreMode::Uni => 30 * self.uni_score(ciphertext, len, stats),
        }
    }

    // ---- uncached scoring (no lookup build) ------------------------------

    fn decode_uncached(&self, ciphertext: &[Letter], len: usize, out: &mut [Letter]) {
        let w = self.wiring();
        let mut off = self.offsets();
        let r_turn = wiring::turnover_points(w, self.r_slot, self.r_ring);
        let m_turn = wiring::turnover_points(w, self.m_slot, self.m_ring);
        for i in 0..len {
            Self::step_offsets(&mut off, &r_turn, &m_turn);
            let c = self.stbrett[ciphertext[i] as usize];
            let c = self.scramble(w, &off, c);
            out[i] = self.stbrett[c as usize];
        }
    }

    /// IC without building the lookup table; used when only a handful of
    /// candidates are scored and the table build would dominate.
    pub fn ic_score_uncached(&self, ciphertext: &[Letter], len: usize) -> f64 {
        if len < 2 {
            return 0.0;
        }
        let mut plain = vec![0; len];
        self.decode_uncached(ciphertext, len, &mut plain);
        let mut f = [0i64; 26];
        for &c in &plain {
            f[c as usize] += 1;
        }
        let mut ic = 0.0;
        for fi in f {
            ic += (fi * (fi - 1)) as f64;
        }
        ic / (len * (len - 1)) as f64
    }

    pub fn tri_score_uncached(&self, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        let mut plain = vec![0; len];
        self.decode_uncached(ciphertext, len, &mut plain);
        let mut s = 0;
        let mut c1 = plain[0] as usize;
        let mut c2 = plain[1] as usize;
        for &p in plain.iter().take(len).skip(2) {
            let c3 = p as usize;
            s += stats.triflat[(((c1 << 5) + c2) << 5) + c3];
            c1 = c2;
            c2 = c3;
        }
        s / (len - 2) as i64
    }

    pub fn uni_score_uncached(&self, ciphertext: &[Letter], len: usize, stats: &EnigmaStats) -> i64 {
        let mut plain = vec![0; len];
        self.decode_uncached(ciphertext, len, &mut plain);
        plain
            .iter()
            .map(|&c| stats.unidict[c as usize])
            .sum::<i64>()
            / len as i64
    }

    // ---- indicators ------------------------------------------------------

    /// Deciphers a doubled indicator group under trial message keys and
    /// counts position-wise repeats; 1000 = all indicators doubled cleanly.
    pub fn indic_score(
        &self,
        indic_msg_keys: Option<&[[Letter; 3]]>,
        indic_ciphertext: &[[Letter; 6]],
    ) -> i64 {
        let n = indic_ciphertext.len();
        let mut plain = [0; 6];
        let mut score = 0;
        for (i, ct) in indic_ciphertext.iter().enumerate() {
            match indic_msg_keys {
                None => self.encipher_all(ct, &mut plain, 6),
                Some(keys) => {
                    let mut indic_key = self.clone();
                    indic_key.l_mesg = keys[i][0] as usize;
                    indic_key.m_mesg = keys[i][1] as usize;
                    indic_key.r_mesg = keys[i][2] as usize;
                    indic_key.encipher_all(ct, &mut plain, 6);
                }
            }
            score += (0..3).filter(|&k| plain[k] == plain[k + 3]).count() as i64;
        }
        1000 * score / (3 * n as i64)
    }

    /// Derives the message key implied by an enciphered indicator: set the
    /// indicator message key, decipher the indicator, use the result as the
    /// message setting. `None` if either string is malformed.
    pub fn key_from_indicator(&self, indicator: &str, indicator_message_key: &str) -> Option<Key> {
        let expected = self.model.rotor_count();
        let mut temp = self.clone();
        temp.set_mesg(indicator_message_key).ok()?;
        let crypt: Vec<Letter> = crate::alphabet::to_letters(indicator)
            .into_iter()
            .filter(|&l| l >= 0)
            .collect();
        if crypt.len() != expected {
            return None;
        }
        let mut plain = vec![0; expected];
        temp.encipher_all(&crypt, &mut plain, expected);
        temp.set_mesg(&crate::alphabet::to_string(&plain)).ok()?;
        Some(temp)
    }

    // ---- right-rotor offset correction -----------------------------------

    pub fn add_right_rotor_offset(&mut self, offset: i32) {
        self.r_ring = ((self.r_ring as i32 + offset + 26) % 26) as usize;
        self.r_mesg = ((self.r_mesg as i32 + offset + 26) % 26) as usize;
    }

    pub fn sub_right_rotor_offset(&mut self, offset: i32) {
        self.add_right_rotor_offset(-offset);
    }

    // ---- stepping trace --------------------------------------------------

    /// Writes the stepping trace: L where the left rotor stepped, M where
    /// only the middle rotor did, X otherwise.
    pub fn show_steppings(&self, output: &mut [Letter], len: usize) {
        let w = self.wiring();
        let mut off = self.offsets();
        let r_turn = wiring::turnover_points(w, self.r_slot, self.r_ring);
        let m_turn = wiring::turnover_points(w, self.m_slot, self.m_ring);
        let (x, m, l) = (
            letter_index('X'),
            letter_index('M'),
            letter_index('L'),
        );
        for out in output.iter_mut().take(len) {
            if m_turn[off.m] {
                Self::step_offsets(&mut off, &r_turn, &m_turn);
                *out = l;
            } else if r_turn[off.r] {
                Self::step_offsets(&mut off, &r_turn, &m_turn);
                *out = m;
            } else {
                off.r = (off.r + 1) % 26;
                *out = x;
            }
        }
    }

    // ---- decoded text ----------------------------------------------------

    pub fn plaintext_string(&self, ciphertext: &[Letter], len: usize) -> String {
        self.assert_lookup(len);
        let mut s = String::with_capacity(len);
        for (i, &ct) in ciphertext.iter().take(len).enumerate() {
            let c = self.stbrett[ct as usize];
            let c = self.lookup.at(i, c);
            let c = self.stbrett[c as usize];
            s.push(letter_char(c));
        }
        s
    }

    // ---- randomization ---------------------------------------------------

    fn rand_in_range(rng: &mut fastrand::Rng, from: usize, to: usize) -> usize {
        if from >= to {
            from
        } else {
            rng.usize(from..=to)
        }
    }

    /// Random configuration inside a range, with a random plugboard.
    pub fn init_random(&mut self, from: &Key, to: &Key, stb_plugs: usize, rng: &mut fastrand::Rng) {
        self.model = from.model;
        self.g_slot = Self::rand_in_range(rng, from.g_slot, to.g_slot);
        self.l_slot = Self::rand_in_range(rng, from.l_slot, to.l_slot);
        loop {
            self.m_slot = Self::rand_in_range(rng, from.m_slot, to.m_slot);
            if self.m_slot != self.l_slot {
                break;
            }
        }
        loop {
            self.r_slot = Self::rand_in_range(rng, from.r_slot, to.r_slot);
            if self.r_slot != self.l_slot && self.r_slot != self.m_slot {
                break;
            }
        }
        self.g_ring = Self::rand_in_range(rng, from.g_ring, to.g_ring);
        self.l_ring = Self::rand_in_range(rng, from.l_ring, to.l_ring);
        self.m_ring = Self::rand_in_range(rng, from.m_ring, to.m_ring);
        self.r_ring = Self::rand_in_range(rng, from.r_ring, to.r_ring);
        self.g_mesg = Self::rand_in_range(rng, from.g_mesg, to.g_mesg);
        self.l_mesg = Self::rand_in_range(rng, from.l_mesg, to.l_mesg);
        self.m_mesg = Self::rand_in_range(rng, from.m_mesg, to.m_mesg);
        self.r_mesg = Self::rand_in_range(rng, from.r_mesg, to.r_mesg);
        self.ukw_num = Self::rand_in_range(rng, from.ukw_num, to.ukw_num);
        self.set_random_stb(stb_plugs, rng);
    }

    pub fn set_random_stb(&mut self, stb_plugs: usize, rng: &mut fastrand::Rng) {
        let stb_plugs = stb_plugs.min(13);
        for i in 0..26 {
            self.stbrett[i] = i as Letter;
        }
        let mut swaps = 0;
        while swaps < stb_plugs {
            let p1 = rng.i16(0..26);
            if self.stbrett[p1 as usize] != p1 {
                continue;
            }
            let p2 = rng.i16(0..26);
            if p1 == p2 || self.stbrett[p2 as usize] != p2 {
                continue;
            }
            self.swap(p1, p2);
            swaps += 1;
        }
    }

    pub fn set_random_mesg(&mut self, rng: &mut fastrand::Rng) {
        self.g_mesg = rng.usize(0..26);
        self.l_mesg = rng.usize(0..26);
        self.m_mesg = rng.usize(0..26);
        self.r_mesg = rng.usize(0..26);
    }

    // ---- key-string parsing ----------------------------------------------

    fn set_ukw(&mut self, s: &str) -> EnResult<()> {
        let ukw = match (s, self.model) {
            ("A" | "a", Model::H) => 0,
            ("A" | "a", Model::A16081 | Model::A16101) => 0,
            ("B" | "b", Model::M4) => 3,
            ("B" | "b", _) => 1,
            ("C" | "c", Model::M4) => 4,
            ("C" | "c", _) => 2,
            _ => {
                return Err(EnigmaError::Config(format!(
                    "invalid reflector '{s}' for model {}",
                    self.model
                )))
            }
        };
        self.ukw_num = ukw;
        Ok(())
    }

    fn set_walze(&mut self, s: &str, allow_repetitions: bool) -> EnResult<()> {
        let lmr = if self.model == Model::M4 {
            if s.len() != 4 {
                return Err(EnigmaError::Config(format!("invalid wheel string '{s}'")));
            }
            self.g_slot = match &s[0..1] {
                "B" | "b" => 9,
                "G" | "g" => 10,
                _ => return Err(EnigmaError::Config(format!("invalid greek wheel in '{s}'"))),
            };
            &s[1..]
        } else {
            if s.len() != 3 {
                return Err(EnigmaError::Config(format!("invalid wheel string '{s}'")));
            }
            s
        };
        let digits: Vec<i16> = lmr.chars().map(digit_index).collect();
        let (l, m, r) = (digits[0], digits[1], digits[2]);
        if !allow_repetitions && (l == m || l == r || m == r) {
            return Err(EnigmaError::Config(format!("repeated wheel in '{s}'")));
        }
        let (lo, hi) = self.model.slot_range();
        for &d in &[l, m, r] {
            if d < lo as i16 || d > hi as i16 {
                return Err(EnigmaError::Config(format!(
                    "wheel out of range in '{s}' for model {}",
                    self.model
                )));
            }
        }
        self.l_slot = l as usize;
        self.m_slot = m as usize;
        self.r_slot = r as usize;
        Ok(())
    }

    fn set_ring(&mut self, s: &str) -> EnResult<()> {
        let lmr = if self.model == Model::M4 {
            if s.len() != 4 {
                return Err(EnigmaError::Config(format!("invalid ring string '{s}'")));
            }
            let g = letter_index(s.chars().next().unwrap());
            if g < 0 {
                return Err(EnigmaError::Config(format!("invalid ring string '{s}'")));
            }
            self.g_ring = g as usize;
            &s[1..]
        } else {
            if s.len() != 3 {
                return Err(EnigmaError::Config(format!("invalid ring string '{s}'")));
            }
            s
        };
        let vals: Vec<Letter> = lmr.chars().map(letter_index).collect();
        if vals.iter().any(|&v| v < 0) {
            return Err(EnigmaError::Config(format!("invalid ring string '{s}'")));
        }
        self.l_ring = vals[0] as usize;
        self.m_ring = vals[1] as usize;
        self.r_ring = vals[2] as usize;
        Ok(())
    }

    pub fn set_mesg(&mut self, s: &str) -> EnResult<()> {
        let lmr = if self.model == Model::M4 {
            if s.len() != 4 {
                return Err(EnigmaError::Config(format!("invalid message key '{s}'")));
            }
            let g = letter_index(s.chars().next().unwrap());
            if g < 0 {
                return Err(EnigmaError::Config(format!("invalid message key '{s}'")));
            }
            self.g_mesg = g as usize;
            &s[1..]
        } else {
            if s.len() != 3 {
                return Err(EnigmaError::Config(format!("invalid message key '{s}'")));
            }
            s
        };
        let vals: Vec<Letter> = lmr.chars().map(letter_index).collect();
        if vals.iter().any(|&v| v < 0) {
            return Err(EnigmaError::Config(format!("invalid message key '{s}'")));
        }
        self.l_mesg = vals[0] as usize;
        self.m_mesg = vals[1] as usize;
        self.r_mesg = vals[2] as usize;
        Ok(())
    }

    pub fn mesg_string(&self) -> String {
        let mut s = String::new();
        if self.model == Model::M4 {
            s.push(letter_char(self.g_mesg as Letter));
        }
        s.push(letter_char(self.l_mesg as Letter));
        s.push(letter_char(self.m_mesg as Letter));
        s.push(letter_char(self.r_mesg as Letter));
        s
    }

    /// Parses "U:WWW:RRR:MMM" (H/M3), "U:GWWW:RRRR:MMMM" (M4), or the
    /// numeric-ring form "U:WWW:RRRRRR:MMM" with two digits per ring.
    pub fn set_key(&mut self, s: &str, model: Model) -> EnResult<()> {
        self.init_defaults(model);
        let bad = || EnigmaError::Config(format!("invalid key string '{s}' for model {model}"));
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(bad());
        }
        let (ukw_s, walze_s, ring_s) = (parts[0], parts[1], parts[2]);
        let mesg_s = parts[3];
        if model == Model::M4 {
            if s.len() != 16 {
                return Err(bad());
            }
            self.set_ukw(ukw_s)?;
            self.set_walze(walze_s, true)?;
            self.set_ring(ring_s)?;
            self.set_mesg(mesg_s)?;
            return Ok(());
        }
        let ring_letters = if ring_s.len() == 6 {
            // numeric ring settings, two digits each, 01-26
            let mut letters = String::new();
            for pair in ring_s.as_bytes().chunks(2) {
                let d1 = digit_index(pair[0] as char);
                let d2 = digit_index(pair[1] as char);
                if d1 < 0 || d2 < 0 {
                    return Err(bad());
                }
                let val = d1 * 10 + d2 - 1;
                if !(0..26).contains(&val) {
                    return Err(bad());
                }
                letters.push(letter_char(val));
            }
            letters
        } else if ring_s.len() == 3 {
            ring_s.to_string()
        } else {
            return Err(bad());
        };
        self.set_ukw(ukw_s)?;
        self.set_walze(walze_s, true)?;
        self.set_ring(&ring_letters)?;
        self.set_mesg(mesg_s)?;
        Ok(())
    }

    /// Sets up an inclusive search range; fails if `kf` sorts after `kt`.
    pub fn set_range(
        from: &mut Key,
        to: &mut Key,
        kf: &str,
        kt: &str,
        model: Model,
    ) -> EnResult<()> {
        from.set_key(kf, model)?;
        to.set_key(kt, model)?;
        if Key::compare(from, to) == std::cmp::Ordering::Greater {
            return Err(EnigmaError::Config(format!(
                "key range '{kf}'-'{kt}' is reversed"
            )));
        }
        Ok(())
    }

    /// Enumeration order over range fields. The greek and left rings are
    /// omitted: they only shift the whole message window, so ranges over
    /// them are compared elsewhere.
    pub fn compare(k1: &Key, k2: &Key) -> std::cmp::Ordering {
        (
            k1.ukw_num, k1.g_slot, k1.l_slot, k1.m_slot, k1.r_slot, k1.m_ring, k1.r_ring,
            k1.g_mesg, k1.l_mesg, k1.m_mesg, k1.r_mesg,
        )
            .cmp(&(
                k2.ukw_num, k2.g_slot, k2.l_slot, k2.m_slot, k2.r_slot, k2.m_ring, k2.r_ring,
                k2.g_mesg, k2.l_mesg, k2.m_mesg, k2.r_mesg,
            ))
    }

    // ---- key-space counting ----------------------------------------------

    /// Counts, without enumerating, the configurations a range sweep will
    /// visit under the given pruning scope and right-ring sampling stride.
    /// Must agree exactly with the search orchestrators' loops.
    pub fn number_of_possible_keys(
        lo: &Key,
        hi: &Key,
        len: usize,
        m_ring_scope: MRingScope,
        r_ring_spacing: usize,
        check_indicator: bool,
    ) -> u64 {
        let span = |a: usize, b: usize| (b - a + 1) as u64;
        let mut count = span(lo.ukw_num, hi.ukw_num)
            * span(lo.g_slot, hi.g_slot)
            * span(lo.g_ring, hi.g_ring)
            * span(lo.l_ring, hi.l_ring);

        if !check_indicator {
            count *= span(lo.g_mesg, hi.g_mesg)
                * span(lo.l_mesg, hi.l_mesg)
                * span(lo.m_mesg, hi.m_mesg)
                * span(lo.r_mesg, hi.r_mesg);
        }

        let mut r_ring_options = span(lo.r_ring, hi.r_ring);
        if r_ring_options == 26 {
            r_ring_options = (26 + r_ring_spacing as u64 - 1) / r_ring_spacing as u64;
        }
        count *= r_ring_options;

        let mut m_ring_options = match m_ring_scope {
            MRingScope::All => span(lo.m_ring, hi.m_ring),
            MRingScope::OneNonStepping => 1,
            MRingScope::AllSteppingInsideMsg => ((len / 26).max(1)).min(26) as u64,
            MRingScope::AllNonStepping => (26 - (len / 26).min(26)).max(1) as u64,
            MRingScope::AllSteppingInsideMsgAndOneNonStepping => ((len / 26) + 1).min(26) as u64,
            MRingScope::SteppingInsideMsgWithSmallImpact => ((3 * len / 5) / 26 + 1).min(26) as u64,
        };
        if hi.m_ring == lo.m_ring {
            m_ring_options = 1;
        }
        count *= m_ring_options;

        let mut wheel_possibilities = 0u64;
        for l_slot in lo.l_slot..=hi.l_slot {
            for m_slot in lo.m_slot..=hi.m_slot {
                if m_slot == l_slot {
                    continue;
                }
                for r_slot in lo.r_slot..=hi.r_slot {
                    if r_slot == l_slot || r_slot == m_slot {
                        continue;
                    }
                    wheel_possibilities += 1;
                }
            }
        }
        count * wheel_possibilities.max(1)
    }

    // ---- display ---------------------------------------------------------

    pub fn key_string_short(&self, include_steckers: bool) -> String {
        let mut s = String::new();
        if self.model == Model::M4 {
            let _ = write!(
                s,
                "{}:{}{}{}{}:{}{}{}{}:{}{}{}{}",
                if self.ukw_num == 3 { "B" } else { "C" },
                if self.g_slot == 9 { "B" } else { "G" },
                self.l_slot,
                self.m_slot,
                self.r_slot,
                letter_char(self.g_ring as Letter),
                letter_char(self.l_ring as Letter),
                letter_char(self.m_ring as Letter),
                letter_char(self.r_ring as Letter),
                letter_char(self.g_mesg as Letter),
                letter_char(self.l_mesg as Letter),
                letter_char(self.m_mesg as Letter),
                letter_char(self.r_mesg as Letter),
            );
        } else {
            let _ = write!(
                s,
                "{}:{}{}{}:{}{}{}:{}{}{}",
                letter_char(self.ukw_num as Letter),
                self.l_slot,
                self.m_slot,
                self.r_slot,
                letter_char(self.l_ring as Letter),
                letter_char(self.m_ring as Letter),
                letter_char(self.r_ring as Letter),
                letter_char(self.l_mesg as Letter),
                letter_char(self.m_mesg as Letter),
                letter_char(self.r_mesg as Letter),
            );
        }
        if include_steckers {
            let stecker = self.stb_string();
            if !stecker.is_empty() {
                let _ = write!(s, "|{stecker}");
            }
        }
        s
    }

    pub fn key_string_long(&self) -> String {
        let mut s = String::new();
        if self.score > 0 {
            let _ = write!(s, "Score: {} ", self.score);
        }
        let _ = write!(s, "Key:{}", self.key_string_short(false));
        let stecker = self.stb_string();
        if !stecker.is_empty() {
            let az: String = self
                .stbrett
                .iter()
                .map(|&c| letter_char(c))
                .collect();
            let _ = write!(s, " Stb:{stecker} ({az})");
        }
        s
    }
}
