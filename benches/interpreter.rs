mod common;

use std::io;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lamp::Interpreter;

fn bench_interpreter(c: &mut Criterion) {
    for (label, path) in common::workloads() {
        let source = common::load_source(&path);
        let (program, hops) = common::load_program(&path);

        c.bench_function(&format!("interpreter_execute_{label}"), |b| {
            b.iter(|| {
                let mut interpreter = Interpreter::new(io::sink());
                interpreter
                    .interpret(black_box(&program), hops.clone())
                    .expect("run");
            })
        });

        c.bench_function(&format!("interpreter_total_{label}"), |b| {
            b.iter(|| {
                lamp::run(black_box(&source), io::sink()).expect("run");
            })
        });
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
