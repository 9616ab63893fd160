use rotorcrack::alphabet::{to_letters, to_string};
use rotorcrack::key::{Key, Model, ScoreMode};
use rotorcrack::stats::EnigmaStats;
use rstest::rstest;
use std::fs::File;
use std::io::{BufReader, Write};

fn encipher(key: &Key, plaintext: &str) -> String {
    let plain = to_letters(plaintext);
    let mut ct = vec![0; plain.len()];
    key.encipher_all(&plain, &mut ct, plain.len());
    to_string(&ct)
}

// The widely published Enigma I self-test vector: reflector B, wheels
// I-II-III, all rings and positions at A, no plugboard.
#[test]
fn enigma_i_reference_vector() {
    let mut key = Key::new(Model::H);
    key.set_key("B:123:AAA:AAA", Model::H).unwrap();
    assert_eq!(encipher(&key, "AAAAA"), "BDZGO");
}

// The thin B reflector with Beta at position A is wired to behave exactly
// like a 3-rotor machine with reflector B.
#[test]
fn m4_with_beta_at_a_matches_m3() {
    let mut m4 = Key::new(Model::M4);
    m4.set_key("B:B123:AAAA:AAAA", Model::M4).unwrap();
    assert_eq!(encipher(&m4, "AAAAA"), "BDZGO");

    let mut m3 = Key::new(Model::M3);
    m3.set_key("B:123:AAA:QEV", Model::M3).unwrap();
    let mut m4b = Key::new(Model::M4);
    m4b.set_key("B:B123:AAAA:AQEV", Model::M4).unwrap();
    let text = "DASOBERKOMMANDODERWEHRMACHTGIBTBEKANNT";
    assert_eq!(encipher(&m3, text), encipher(&m4b, text));
}

// Rotors I-II-III starting at ADU: the third keypress is the double step,
// where the middle rotor at its own notch drags the left rotor along.
#[test]
fn double_stepping_trace() {
    let mut key = Key::new(Model::H);
    key.set_key("B:123:AAA:ADU", Model::H).unwrap();
    let mut trace = [0; 5];
    key.show_steppings(&mut trace, 5);
    assert_eq!(to_string(&trace), "XMLXX");
}

#[test]
fn round_trip_with_plugboard() {
    let mut key = Key::new(Model::M3);
    key.set_key("C:528:AQT:CKD", Model::M3).unwrap();
    key.set_stecker("AZBYCXDW").unwrap();

    let plaintext = "ANBRITISCHENINSELNKEINEBESONDERENEREIGNISSE";
    let ciphertext = encipher(&key, plaintext);
    assert_ne!(ciphertext, plaintext);
    // Decoding restarts from the stored rotor positions.
    assert_eq!(encipher(&key, &ciphertext), plaintext);
}

#[rstest]
#[case(Model::H, "A:135:BCD:QRS")]
#[case(Model::M3, "B:876:ZZA:KKL")]
#[case(Model::M4, "C:G421:ABCD:WXYZ")]
fn no_letter_encrypts_to_itself(#[case] model: Model, #[case] key_str: &str) {
    let mut key = Key::new(model);
    key.set_key(key_str, model).unwrap();
    key.build_lookup(200);
    for pos in 0..200 {
        for c in 0..26 {
            assert_ne!(key.lookup.at(pos, c), c, "fixed point at position {pos}");
        }
    }
}

#[test]
fn cached_and_uncached_scoring_agree() {
    let mut stats = EnigmaStats::new();
    stats
        .load_trigrams_from_counts(std::io::Cursor::new(
            "ABC 50\nBCD 500\nCDE 5000\nEIN 900\nNEN 430\n",
        ))
        .unwrap();
    let mut key = Key::new(Model::M3);
    key.set_key("B:312:AAA:KQF", Model::M3).unwrap();
    key.set_stecker("ABCD").unwrap();
    let ct = to_letters("PQOWIEURYTLAKSJDHFGMZNXBCVPQOWIEURYTLAKSJDHFG");
    let len = ct.len();
    key.build_lookup(len);

    assert_eq!(
        key.tri_score(&ct, len, &stats),
        key.tri_score_uncached(&ct, len, &stats)
    );
    let cached = key.ic_score(&ct, len);
    let uncached = key.ic_score_uncached(&ct, len);
    assert!((cached - uncached).abs() < 1e-12);
    assert_eq!(
        key.uni_score(&ct, len, &stats),
        key.uni_score_uncached(&ct, len, &stats)
    );
}

#[test]
fn eval_scale_factors() {
    let stats = EnigmaStats::new();
    let mut key = Key::new(Model::M3);
    key.set_key("B:123:AAA:AAA", Model::M3).unwrap();
    let ct = to_letters("QQQQQQQQQQQQQQQQQQQQ");
    let len = ct.len();
    key.build_lookup(len);

    let ic = key.ic_score(&ct, len);
    assert_eq!(key.eval(ScoreMode::Ic, &ct, len, &stats), (300_000.0 * ic) as i64);
    assert_eq!(
        key.eval(ScoreMode::Uni, &ct, len, &stats),
        30 * key.uni_score(&ct, len, &stats)
    );
    assert_eq!(
        key.eval(ScoreMode::Bi, &ct, len, &stats),
        (key.bi_score(&ct, len, &stats) as f64 * 0.5) as i64
    );
}

#[test]
fn stats_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigrams.txt");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "DER 10000").unwrap();
    writeln!(f, "EIN 5000").unwrap();
    writeln!(f, "#comment line").unwrap();
    writeln!(f, "CHT 100").unwrap();
    drop(f);

    let mut stats = EnigmaStats::new();
    let items = stats
        .load_trigrams_from_counts(BufReader::new(File::open(&path).unwrap()))
        .unwrap();
    assert_eq!(items, 3);
    // Minimum non-zero entry lands on the 10000 baseline.
    let cht = rotorcrack::stats::tri_index(2, 7, 19);
    assert_eq!(stats.triflat[cht], 10_000);
}

#[test]
fn key_display_format() {
    let mut key = Key::new(Model::M3);
    key.set_key("B:528:AQT:CKD", Model::M3).unwrap();
    key.set_stecker("ANBY").unwrap();
    let re = regex::Regex::new(r"^[A-C]:\d{3}:[A-Z]{3}:[A-Z]{3}\|[A-Z]+$").unwrap();
    assert!(re.is_match(&key.key_string_short(true)));
}

#[test]
fn invalid_configurations_are_rejected() {
    let mut key = Key::new(Model::H);
    // Wheel 6 does not exist on the H model.
    assert!(key.set_key("B:126:AAA:AAA", Model::H).is_err());
    // Reflector A does not exist on the M3.
    assert!(key.set_key("A:123:AAA:AAA", Model::M3).is_err());
    // Malformed strings.
    assert!(key.set_key("B:123:AAA", Model::H).is_err());
    assert!(key.set_key("B:12:AAA:AAA", Model::H).is_err());
    // Reversed range.
    let mut lo = Key::new(Model::M3);
    let mut hi = Key::new(Model::M3);
    assert!(Key::set_range(&mut lo, &mut hi, "B:123:AAA:AAB", "B:123:AAA:AAA", Model::M3).is_err());
}

#[test]
fn commercial_models_encipher_reciprocally() {
    let mut key = Key::new(Model::A16101);
    key.set_key("A:123:AAA:AAA", Model::A16101).unwrap();
    let text = "GEHEIMEKOMMANDOSACHE";
    let ct = encipher(&key, text);
    assert_eq!(encipher(&key, &ct), text);
    assert_ne!(ct, text);
}

#[test]
fn indicator_doubling_scores_true_key_highest() {
    let mut key = Key::new(Model::H);
    key.set_key("B:123:AAA:AAA", Model::H).unwrap();

    // Build doubled indicators the 1938 way: message key enciphered twice.
    let mut indic_ct = Vec::new();
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..6 {
        let mk: Vec<i16> = (0..3).map(|_| rng.i16(0..26)).collect();
        let doubled = [mk[0], mk[1], mk[2], mk[0], mk[1], mk[2]];
        let mut ct = [0; 6];
        key.encipher_all(&doubled, &mut ct, 6);
        indic_ct.push(ct);
    }
    assert_eq!(key.indic_score(None, &indic_ct), 1000);

    let mut wrong = key.clone();
    wrong.set_key("B:123:AAA:QXV", Model::H).unwrap();
    assert!(wrong.indic_score(None, &indic_ct) < 1000);
}
