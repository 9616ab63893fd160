//! Static rotor and reflector permutation tables.
//!
//! Rows are stored triple-width (3 x 26) for rotors and double-width for
//! reflectors so the signal-path arithmetic can add or subtract a rotor
//! offset without a modulo on every lookup. The wiring sets are immutable
//! after first use and shared by all workers.

use crate::alphabet::letter_index;
use crate::key::Model;
use std::sync::OnceLock;

pub const ROTOR_ROW: usize = 3 * 26;
pub const REFLECTOR_ROW: usize = 2 * 26;

/// Rotor slots: 0 is the identity "no greek wheel" entry, 1-8 are wheels
/// I-VIII, 9 and 10 are the non-stepping Beta and Gamma wheels.
pub const NUM_ROTOR_SLOTS: usize = 11;
/// Reflectors: A, B, C, B-thin, C-thin.
pub const NUM_REFLECTORS: usize = 5;

pub struct WiringSet {
    pub forward: [[i16; ROTOR_ROW]; NUM_ROTOR_SLOTS],
    pub reverse: [[i16; ROTOR_ROW]; NUM_ROTOR_SLOTS],
    pub reflector: [[i16; REFLECTOR_ROW]; NUM_REFLECTORS],
    /// Turnover letters per rotor slot (ring-independent notch positions).
    pub notches: [[i16; 2]; NUM_ROTOR_SLOTS],
}

const IDENTITY: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const STANDARD_ROTORS: [&str; NUM_ROTOR_SLOTS] = [
    IDENTITY,
    "EKMFLGDQVZNTOWYHXUSPAIBRCJ",
    "AJDKSIRUXBLHWTMCQGZNPYFVOE",
    "BDFHJLCPRTXVZNYEIWGAKMUSQO",
    "ESOVPZJAYQUIRHXLNFTGKDCMWB",
    "VZBRGITYUPSDNHLXAWMJQOFECK",
    "JPGVOUMFYQBENHZRDKASXLICTW",
    "NZJHGRCXMYSWBOUFAIVLPEKQDT",
    "FKQHTLXOCBJSPDZRAMEWNIUYGV",
    "LEYJVCNIXWPBQMDRTAKZGFUHOS",
    "FSOKANUERHMBTIYCWLQPZXVGJD",
];

const STANDARD_REFLECTORS: [&str; NUM_REFLECTORS] = [
    "EJMZALYXVBWFCRQUONTSPIKHGD",
    "YRUHQSLDPXNGOKMIEBFZCWVJAT",
    "FVPJIAOYEDRZXWGCTKUQSBNMHL",
    "ENKQAUYWJICOPBLMDXZVFTHRGS",
    "RDOBJNTKVEHMLFCWZAXGYIPSUQ",
];

const NOTCH_LETTERS: [&str; NUM_ROTOR_SLOTS] =
    ["", "Q", "E", "V", "J", "Z", "MZ", "MZ", "MZ", "", ""];

/// Pre-war commercial machine A16101: five wheels, one fixed reflector.
const A16101_ROTORS: [&str; 5] = [
    "OCHQZMJPFIWEXTYLGVBKDNURAS",
    "HWBEOSZFQMTXRKIGVJYPUCLNAD",
    "XTKFJRMLGYVQWUBIEHANPDSOZC",
    "IGTCNQWJMHXFEZVSYBLPROKDAU",
    "NXEKUZMQLVCTIRJYHSDGAFBPWO",
];
const A16101_REFLECTOR: &str = "YIOGTXDKBSHVWRCQPNJEZLMFAU";

/// Pre-war commercial machine A16081.
const A16081_ROTORS: [&str; 5] = [
    "CVFWJOBXANQTDZUMEYRPSKGILH",
    "XJGURHZMYDLATWKSEPNCQFOIBV",
    "SYIGXELDUKBVOAWTZHQNFCRMJP",
    "HKTZDSRFWPCQJIYXNVMUGELAOB",
    "WMGRKEJUAZFTOXINDYBQVHLCPS",
];
const A16081_REFLECTOR: &str = "DONAJUXTQELKSCBZIVMHFRYGWP";

fn fill_rotor(perm: &str, forward: &mut [i16; ROTOR_ROW], reverse: &mut [i16; ROTOR_ROW]) {
    for (i, c) in perm.chars().enumerate() {
        let v = letter_index(c);
        debug_assert!(v >= 0, "rotor wiring must be alphabetic");
        for rep in 0..3 {
            forward[rep * 26 + i] = v;
            reverse[rep * 26 + v as usize] = i as i16;
        }
    }
}

fn fill_reflector(perm: &str, row: &mut [i16; REFLECTOR_ROW]) {
    for (i, c) in perm.chars().enumerate() {
        let v = letter_index(c);
        row[i] = v;
        row[26 + i] = v;
    }
}

fn fill_notches(letters: &str, out: &mut [i16; 2]) {
    *out = [-1, -1];
    for (i, c) in letters.chars().take(2).enumerate() {
        out[i] = letter_index(c);
    }
}

fn build_standard() -> WiringSet {
    let mut set = WiringSet {
        forward: [[0; ROTOR_ROW]; NUM_ROTOR_SLOTS],
        reverse: [[0; ROTOR_ROW]; NUM_ROTOR_SLOTS],
        reflector: [[0; REFLECTOR_ROW]; NUM_REFLECTORS],
        notches: [[-1; 2]; NUM_ROTOR_SLOTS],
    };
    for slot in 0..NUM_ROTOR_SLOTS {
        fill_rotor(
            STANDARD_ROTORS[slot],
            &mut set.forward[slot],
            &mut set.reverse[slot],
        );
        fill_notches(NOTCH_LETTERS[slot], &mut set.notches[slot]);
    }
    for (i, perm) in STANDARD_REFLECTORS.iter().enumerate() {
        fill_reflector(perm, &mut set.reflector[i]);
    }
    set
}

fn build_commercial(rotors: &[&str; 5], reflector: &str) -> WiringSet {
    let mut set = build_standard();
    for (i, perm) in rotors.iter().enumerate() {
        fill_rotor(perm, &mut set.forward[i + 1], &mut set.reverse[i + 1]);
    }
    // A single physical reflector; every selectable index resolves to it.
    for row in set.reflector.iter_mut() {
        fill_reflector(reflector, row);
    }
    set
}

pub fn for_model(model: Model) -> &'static WiringSet {
    static STANDARD: OnceLock<WiringSet> = OnceLock::new();
    static A16101: OnceLock<WiringSet> = OnceLock::new();
    static A16081: OnceLock<WiringSet> = OnceLock::new();
    match model {
        Model::A16101 => A16101.get_or_init(|| build_commercial(&A16101_ROTORS, A16101_REFLECTOR)),
        Model::A16081 => A16081.get_or_init(|| build_commercial(&A16081_ROTORS, A16081_REFLECTOR)),
        _ => STANDARD.get_or_init(build_standard),
    }
}

/// Turnover points for a rotor in a given slot, shifted by the ring setting.
pub fn turnover_points(set: &WiringSet, slot: usize, ring: usize) -> [bool; 26] {
    let mut turnovers = [false; 26];
    for &notch in &set.notches[slot] {
        if notch >= 0 {
            turnovers[(26 + notch as usize - ring) % 26] = true;
        }
    }
    turnovers
}
