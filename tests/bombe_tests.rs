use rotorcrack::alphabet::{to_letters, to_string};
use rotorcrack::bombe::menu::{StbAssumption, UNASSIGNED};
use rotorcrack::bombe::{BombeCrib, BombeParams, BombeSearch};
use rotorcrack::key::{Key, Model};
use rotorcrack::report::{ConsoleReporter, ResultReporter};
use rotorcrack::stats::EnigmaStats;

const PLAINTEXT: &str = "WETTERVORHERSAGEFUERDIEREGIONOSTSEEHEUTEMORGENNEBELSPAETERSONNIGWETTERVORHERSAGE";

fn encipher(key: &Key, plain: &[i16]) -> Vec<i16> {
    let mut ct = vec![0; plain.len()];
    key.encipher_all(plain, &mut ct, plain.len());
    ct
}

/// Trigram statistics built from the plaintext itself, so a correct
/// decryption scores far above garbage.
fn stats_for(plain: &str) -> EnigmaStats {
    let letters = to_letters(plain);
    let mut counts = std::collections::BTreeMap::new();
    for w in letters.windows(3) {
        *counts
            .entry(format!(
                "{}{}{} ",
                rotorcrack::alphabet::letter_char(w[0]),
                rotorcrack::alphabet::letter_char(w[1]),
                rotorcrack::alphabet::letter_char(w[2])
            ))
            .or_insert(0u32) += 10;
    }
    let mut text = String::new();
    for (tri, count) in counts {
        text.push_str(&format!("{tri}{count}\n"));
    }
    let mut stats = EnigmaStats::new();
    stats
        .load_trigrams_from_counts(std::io::Cursor::new(text))
        .unwrap();
    stats
}

// With the correct rotor configuration and an empty true plugboard, the
// stop test's first trial (root self-paired) propagates cleanly: it must
// stop, and every deduced assignment must be a self-pair.
#[test]
fn stop_test_soundness_with_known_key() {
    let mut true_key = Key::new(Model::M3);
    true_key.set_key("B:123:AAA:ABC", Model::M3).unwrap();
    let plain = to_letters(PLAINTEXT);
    let ct = encipher(&true_key, &plain);

    let crib_len = 24;
    let crib = &plain[..crib_len];
    let bombe_crib = BombeCrib::new(&ct, crib, 0);
    assert!(!bombe_crib.menu.sub_graphs.is_empty());

    let mut ckey = true_key.clone(); // plugboard is empty on both
    ckey.build_lookup_range(0, crib_len);
    let stop = bombe_crib
        .menu
        .test_stop(0, &ckey.lookup, &StbAssumption::default())
        .expect("true configuration must produce a stop");

    for i in 0..26 {
        if stop.partner[i] != UNASSIGNED {
            assert_eq!(
                stop.partner[i], i as i16,
                "deduced pair must be a subset of the (empty) true plugboard"
            );
        }
    }
}

// Same soundness property with a plugboard on the machine: deduced pairs at
// the true configuration must agree with the true board.
#[test]
fn stop_test_reproduces_true_board_when_seeded() {
    let mut true_key = Key::new(Model::M3);
    true_key.set_key("B:123:AAA:ABC", Model::M3).unwrap();
    true_key.set_stecker("WERT").unwrap();
    let plain = to_letters(PLAINTEXT);
    let ct = encipher(&true_key, &plain);

    let crib_len = 24;
    let crib = &plain[..crib_len];
    let bombe_crib = BombeCrib::new(&ct, crib, 0);

    let mut ckey = true_key.clone();
    ckey.set_stecker("").unwrap();
    ckey.build_lookup_range(0, crib_len);

    // Seed the assumption with the true partners of the menu roots; the
    // propagation must then confirm, never contradict, the true board.
    let mut assumed = StbAssumption::default();
    for graph in &bombe_crib.menu.sub_graphs {
        let root = graph.links[0].l1;
        let partner = true_key.stbrett[root as usize];
        assumed.partner[root as usize] = partner;
        assumed.partner[partner as usize] = root;
    }
    let stop = bombe_crib
        .menu
        .test_stop(0, &ckey.lookup, &assumed)
        .expect("true configuration with true seed must stop");

    for i in 0..26 {
        if stop.partner[i] != UNASSIGNED {
            assert_eq!(
                stop.partner[i], true_key.stbrett[i],
                "deduced pairs must be a subset of the true plugboard"
            );
        }
    }
}

#[test]
fn bombe_search_recovers_message_setting() {
    let mut true_key = Key::new(Model::M3);
    true_key.set_key("B:123:AAA:AAQ", Model::M3).unwrap();
    let plain = to_letters(PLAINTEXT);
    let ct = encipher(&true_key, &plain);
    let stats = stats_for(PLAINTEXT);

    let mut from = Key::new(Model::M3);
    let mut to = Key::new(Model::M3);
    Key::set_range(&mut from, &mut to, "B:123:AAA:AAA", "B:123:AAA:AAZ", Model::M3).unwrap();

    let crib = to_string(&plain[..22]);
    let reporter = ConsoleReporter::new(5);
    let params = BombeParams {
        hillclimbing_cycles: 0,
        crib_position: Some((0, 0)),
        threads: 2,
        ..Default::default()
    };
    BombeSearch
        .bombe_search(&crib, &ct, ct.len(), &from, &to, &params, &stats, &reporter)
        .unwrap();

    let best = reporter.best_list();
    assert!(!best.is_empty(), "the true setting must produce a stop");
    assert_eq!(best[0].plaintext, PLAINTEXT);
    assert_eq!(best[0].crib_position, Some(0));
}

#[test]
fn cancelled_bombe_search_reports_nothing() {
    let mut true_key = Key::new(Model::M3);
    true_key.set_key("B:123:AAA:AAQ", Model::M3).unwrap();
    let plain = to_letters(PLAINTEXT);
    let ct = encipher(&true_key, &plain);
    let stats = EnigmaStats::new();

    let from = true_key.clone();
    let crib = to_string(&plain[..20]);
    let reporter = ConsoleReporter::default();
    reporter.cancel();
    BombeSearch
        .bombe_search(
            &crib,
            &ct,
            ct.len(),
            &from,
            &from.clone(),
            &BombeParams::default(),
            &stats,
            &reporter,
        )
        .unwrap();
    assert!(reporter.best_list().is_empty());
    assert!(reporter.should_terminate());
}
