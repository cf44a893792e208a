use criterion::{black_box, criterion_group, criterion_main, Criterion};
use record_migrate::{
    Down, MigrationEngine, MigrationSequence, PropertyBag, Record, SequenceId, VersionStamp,
};

/// One sequence of `n` steps, each adding a field that its down removes.
fn field_adding_sequence(name: &str, n: u32) -> MigrationSequence {
    let id = SequenceId::new(name).unwrap();
    (1..=n)
        .fold(MigrationSequence::builder(id.clone()), |builder, v| {
            let field = format!("{name}_{v}");
            let removed = field.clone();
            builder.step(
                id.step(v),
                move |p: PropertyBag| Ok(p.with(field.as_str(), v as f64)),
                Down::reversible(move |p: PropertyBag| Ok(p.without(&removed))),
            )
        })
        .build()
        .unwrap()
}

fn wide_bag(fields: usize) -> PropertyBag {
    (0..fields).map(|i| (format!("field_{i}"), i as f64)).collect()
}

fn bench_upgrade_single_sequence(c: &mut Criterion) {
    let seq = field_adding_sequence("kind", 50);
    let id = seq.id().clone();
    let engine = MigrationEngine::builder().sequence(seq).build().unwrap();
    let kinds = [id];
    let record = Record::unversioned("r", "kind", wide_bag(20));

    c.bench_function("migrate up 50 steps", |b| {
        b.iter(|| black_box(engine.migrate_to_latest(&record, &kinds).unwrap()))
    });

    let latest = engine.migrate_to_latest(&record, &kinds).unwrap();
    c.bench_function("migrate down 50 steps", |b| {
        b.iter(|| {
            black_box(
                engine
                    .migrate(&latest, &VersionStamp::Unversioned, &kinds)
                    .unwrap(),
            )
        })
    });
}

fn bench_upgrade_many_sequences(c: &mut Criterion) {
    let mut builder = MigrationEngine::builder();
    let mut kinds = Vec::new();
    for i in 0..20 {
        let seq = field_adding_sequence(&format!("kind{i}"), 10);
        kinds.push(seq.id().clone());
        builder = builder.sequence(seq);
    }
    let engine = builder.build().unwrap();
    let record = Record::unversioned("r", "kind0", wide_bag(20));

    c.bench_function("migrate up 1 of 20 sequences", |b| {
        b.iter(|| black_box(engine.migrate_to_latest(&record, &kinds[..1]).unwrap()))
    });

    c.bench_function("migrate up all 20 sequences", |b| {
        b.iter(|| black_box(engine.migrate_to_latest(&record, &kinds).unwrap()))
    });
}

fn bench_engine_build(c: &mut Criterion) {
    c.bench_function("build engine 20x10 steps", |b| {
        b.iter(|| {
            let mut builder = MigrationEngine::builder();
            for i in 0..20 {
                builder = builder.sequence(field_adding_sequence(&format!("kind{i}"), 10));
            }
            black_box(builder.build().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_upgrade_single_sequence,
    bench_upgrade_many_sequences,
    bench_engine_build,
);
criterion_main!(benches);
