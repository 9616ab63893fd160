use criterion::{criterion_group, criterion_main, Criterion};
use rotorcrack::key::{Key, Model, ScoreMode};
use rotorcrack::stats::EnigmaStats;
use std::hint::black_box;

fn setup() -> (Key, Vec<i16>, EnigmaStats) {
    let mut key = Key::new(Model::M3);
    key.set_key("B:528:AQT:CKD", Model::M3).expect("valid key");
    key.set_stecker("AZBYCXDWEV").expect("valid stecker");

    let mut rng = fastrand::Rng::with_seed(1);
    let ciphertext: Vec<i16> = (0..250).map(|_| rng.i16(0..26)).collect();

    let mut stats = EnigmaStats::new();
    let mut tri_text = String::new();
    for tri in ["DER", "EIN", "ICH", "NDE", "SCH", "DIE", "CHE", "END"] {
        tri_text.push_str(&format!("{tri} 5000\n"));
    }
    stats
        .load_trigrams_from_counts(std::io::Cursor::new(tri_text))
        .expect("trigram load");
    (key, ciphertext, stats)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (mut key, ciphertext, stats) = setup();
    let len = ciphertext.len();

    c.bench_function("build_lookup (250 positions)", |b| {
        b.iter(|| key.build_lookup(black_box(len)))
    });

    key.build_lookup(len);
    c.bench_function("tri_score via lookup", |b| {
        b.iter(|| key.eval(ScoreMode::Tri, black_box(&ciphertext), len, &stats))
    });

    c.bench_function("tri_score uncached", |b| {
        b.iter(|| key.tri_score_uncached(black_box(&ciphertext), len, &stats))
    });

    c.bench_function("ic_score via lookup", |b| {
        b.iter(|| key.ic_score(black_box(&ciphertext), len))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
