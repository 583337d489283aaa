use authgraph::indexer::express::lexer;
use authgraph::indexer::{ExtractOptions, extract_permissions};
use authgraph::model::SourceUnit;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// A router module with `routes` registrations mixing both call shapes,
/// nested callbacks and literals containing parentheses.
fn synthetic_source(routes: usize) -> String {
    let mut src = String::from(
        "const express = require('express');\n\
         const app = express();\n\
         const api = express.Router();\n\
         app.use('/api', api);\n\
         app.use('/v2', api);\n",
    );
    for i in 0..routes {
        if i % 3 == 0 {
            src.push_str(&format!(
                "api.route('/items/{i}')\n  .get(checkRole('viewer'), list)\n  .put(checkRole('admin'), (req, res) => {{\n    res.send(`updated ${{req.params.id}} (ok)`);\n  }});\n"
            ));
        } else {
            src.push_str(&format!(
                "app.post(\"/things/{i}\", checkRole('editor'), checkRole('admin'), async (req, res) => {{\n  // note: ')' in comment\n  await save(req.body, '(draft)');\n}});\n"
            ));
        }
    }
    src
}

fn bench_extract_permissions(c: &mut Criterion) {
    let options = ExtractOptions::default();
    let mut group = c.benchmark_group("extract_permissions");
    for routes in [10, 100, 1000] {
        let src = synthetic_source(routes);
        group.bench_with_input(BenchmarkId::from_parameter(routes), &src, |b, src| {
            b.iter(|| {
                let records =
                    extract_permissions(&SourceUnit::new("bench.js", black_box(src)), &options);
                black_box(records)
            })
        });
    }
    group.finish();
}

fn bench_call_args(c: &mut Criterion) {
    let src = synthetic_source(100);
    let opens: Vec<usize> = src.match_indices('(').map(|(at, _)| at).collect();
    c.bench_function("call_args_every_paren", |b| {
        b.iter(|| {
            let found = opens
                .iter()
                .filter(|&&open| lexer::call_args(black_box(&src), open).is_some())
                .count();
            black_box(found)
        })
    });
}

criterion_group!(benches, bench_extract_permissions, bench_call_args);
criterion_main!(benches);
