use assert_runner::core::config::ReportConfig;
use assert_runner::core::models::{StepOutcome, TestResult};
use assert_runner::core::profile::ModelKind;
use assert_runner::reporting::report::Report;
use chrono::Local;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn sample_report(rows: usize) -> Report {
    let mut report = Report::new(ModelKind::ModelE, &ReportConfig::default(), Local::now());
    let compilers = ["intel", "gfortran", "nag"];
    let modes = ["serial", "mpi", "openmp"];
    for i in 0..rows {
        let failed = i % 7 == 0;
        report.add_test(TestResult {
            test: format!("E{}M20", i),
            compiler: compilers[i % compilers.len()].to_string(),
            mode: modes[i % modes.len()].to_string(),
            checkout: StepOutcome::Success,
            build: if failed { StepOutcome::Failure } else { StepOutcome::Success },
            run: if failed { StepOutcome::NotAttempted } else { StepOutcome::Success },
            compare: if failed { StepOutcome::NotAttempted } else { StepOutcome::Success },
        });
    }
    report
}

fn bench_report(c: &mut Criterion) {
    let report = sample_report(500);
    let end = Local::now();
    let rendered = report.render(end);

    c.bench_function("render_report", |b| {
        b.iter(|| black_box(report.render(end)));
    });

    c.bench_function("parse_report_rows", |b| {
        b.iter(|| black_box(Report::parse_rows(&rendered)));
    });
}

criterion_group!(benches, bench_report);
criterion_main!(benches);
