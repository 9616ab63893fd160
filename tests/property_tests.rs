use proptest::prelude::*;
use rotorcrack::key::{Key, MRingScope, Model};

fn arb_model() -> impl Strategy<Value = Model> {
    prop_oneof![
        Just(Model::H),
        Just(Model::M3),
        Just(Model::M4),
        Just(Model::A16081),
        Just(Model::A16101),
    ]
}

prop_compose! {
    fn arb_key()(
        model in arb_model(),
        seed in any::<u64>(),
        plugs in 0usize..=10,
    ) -> Key {
        let mut rng = fastrand::Rng::with_seed(seed);
        let (ukw_lo, ukw_hi) = model.ukw_range();
        let (slot_lo, slot_hi) = model.slot_range();
        let (g_lo, g_hi) = model.g_slot_range();

        let mut from = Key::new(model);
        from.ukw_num = ukw_lo;
        from.g_slot = g_lo;
        from.l_slot = slot_lo;
        from.m_slot = slot_lo;
        from.r_slot = slot_lo;

        let mut to = Key::new(model);
        to.ukw_num = ukw_hi;
        to.g_slot = g_hi;
        to.l_slot = slot_hi;
        to.m_slot = slot_hi;
        to.r_slot = slot_hi;
        let four_rotor = model == Model::M4;
        to.g_ring = if four_rotor { 25 } else { 0 };
        to.l_ring = 25;
        to.m_ring = 25;
        to.r_ring = 25;
        to.g_mesg = if four_rotor { 25 } else { 0 };
        to.l_mesg = 25;
        to.m_mesg = 25;
        to.r_mesg = 25;

        let mut key = Key::new(model);
        key.init_random(&from, &to, plugs, &mut rng);
        key
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // After any randomized construction the plugboard is an involution.
    #[test]
    fn plugboard_is_always_an_involution(key in arb_key()) {
        for i in 0..26 {
            let p = key.stbrett[i];
            prop_assert!((0..26).contains(&p));
            prop_assert_eq!(key.stbrett[p as usize], i as i16);
        }
    }

    // Connect/disconnect sequences driven the way the optimizers drive them
    // keep the board self-inverse.
    #[test]
    fn mutation_sequences_preserve_involution(
        seed in any::<u64>(),
        steps in 1usize..200,
    ) {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut key = Key::new(Model::M3);
        for _ in 0..steps {
            let x = rng.i16(0..26);
            let y = rng.i16(0..26);
            if x == y {
                continue;
            }
            let px = key.stbrett[x as usize];
            let py = key.stbrett[y as usize];
            if px == x && py == y {
                key.stb_connect(x, y);
            } else {
                if px != x {
                    key.stb_disconnect(x, px);
                }
                if py != y {
                    key.stb_disconnect(y, py);
                }
            }
        }
        for i in 0..26 {
            let p = key.stbrett[i];
            prop_assert_eq!(key.stbrett[p as usize], i as i16);
        }
    }

    // decode(encode(text)) == text for any configuration; both directions
    // restart stepping from the stored rotor positions.
    #[test]
    fn encipher_is_self_inverse(key in arb_key(), seed in any::<u64>(), len in 1usize..300) {
        let mut rng = fastrand::Rng::with_seed(seed);
        let plain: Vec<i16> = (0..len).map(|_| rng.i16(0..26)).collect();
        let mut ct = vec![0; len];
        key.encipher_all(&plain, &mut ct, len);
        let mut back = vec![0; len];
        key.encipher_all(&ct, &mut back, len);
        prop_assert_eq!(plain, back);
    }

    // The rotor/reflector path never maps a letter to itself.
    #[test]
    fn substitution_has_no_fixed_points(key in arb_key()) {
        let mut key = key;
        key.build_lookup(60);
        for pos in 0..60 {
            for c in 0..26i16 {
                prop_assert_ne!(key.lookup.at(pos, c), c);
            }
        }
    }

    // The lookup table is an involution at every position: the same machine
    // enciphers and deciphers.
    #[test]
    fn substitution_is_reciprocal(key in arb_key()) {
        let mut key = key;
        key.build_lookup(40);
        for pos in 0..40 {
            for c in 0..26i16 {
                let m = key.lookup.at(pos, c);
                prop_assert_eq!(key.lookup.at(pos, m), c);
            }
        }
    }

    // A single-point range counts as exactly one key under every scope.
    #[test]
    fn single_point_count_is_one(
        key in arb_key(),
        scope_idx in 0usize..6,
        len in 30usize..200,
    ) {
        let scopes = [
            MRingScope::All,
            MRingScope::OneNonStepping,
            MRingScope::AllSteppingInsideMsg,
            MRingScope::AllNonStepping,
            MRingScope::AllSteppingInsideMsgAndOneNonStepping,
            MRingScope::SteppingInsideMsgWithSmallImpact,
        ];
        prop_assert_eq!(
            Key::number_of_possible_keys(&key, &key, len, scopes[scope_idx], 1, false),
            1
        );
    }
}
