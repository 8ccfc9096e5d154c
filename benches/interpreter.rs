mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use scsa::interpreter::Interpreter;

fn bench_interpreter(c: &mut Criterion) {
    for (label, path) in common::WORKLOADS {
        let program = common::load_program(path);

        c.bench_function(&format!("interpreter_run_{label}"), |b| {
            b.iter(|| {
                let mut output: Vec<u8> = Vec::new();
                let mut interpreter = Interpreter::new(&mut output);
                interpreter
                    .interpret(black_box(&program))
                    .expect("interpret");
                black_box(output);
            })
        });
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
