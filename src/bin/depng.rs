//! depng CLI — kernel verification and benchmarks.
//!
//! Runs the exhaustive equivalence checks (specialized and SIMD kernels
//! against the reference), then wall-clock benchmarks of all three kernels.
//! Exits nonzero if any check fails.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use depng::harness::{self, BenchSample, FILTER_NAMES};
use depng::{defilter_opt, defilter_ref, defilter_simd, DefilterFn};

/// Verify and benchmark the PNG defilter kernels.
#[derive(Parser, Debug)]
#[command(name = "depng")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run only the equivalence checks
    #[arg(long)]
    check: bool,

    /// Run only the benchmarks
    #[arg(long)]
    bench: bool,
}

const KERNELS: [(&str, DefilterFn); 3] = [
    ("ref", defilter_ref),
    ("opt", defilter_opt),
    ("simd", defilter_simd),
];

fn main() -> ExitCode {
    let args = Args::parse();
    let run_check = args.check || !args.bench;
    let run_bench = args.bench || !args.check;

    if run_check {
        for (name, kernel) in [
            ("opt", defilter_opt as DefilterFn),
            ("simd", defilter_simd as DefilterFn),
        ] {
            println!("[CHECK] IMPL={name}");
            if let Err(err) = harness::check(name, defilter_ref, kernel) {
                eprintln!("[ERROR] {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    if run_bench {
        for (name, kernel) in KERNELS {
            print_bench(name, harness::bench(kernel));
        }
    }

    ExitCode::SUCCESS
}

fn print_bench(name: &str, samples: Vec<BenchSample>) {
    let mut total = Duration::ZERO;
    let mut filter_time = Duration::ZERO;
    let mut current_filter = samples.first().map_or(0, |s| s.filter);

    for sample in &samples {
        if sample.filter != current_filter {
            println!(
                "[BENCH] IMPL={name:<4}  [{:>8.3} s] [{}:ALL]",
                filter_time.as_secs_f64(),
                FILTER_NAMES[current_filter as usize]
            );
            filter_time = Duration::ZERO;
            current_filter = sample.filter;
        }

        println!(
            "[BENCH] IMPL={name:<4}  [{:>8.3} s] [{}:{}]",
            sample.elapsed.as_secs_f64(),
            FILTER_NAMES[sample.filter as usize],
            sample.bpp
        );
        filter_time += sample.elapsed;
        total += sample.elapsed;
    }

    if !samples.is_empty() {
        println!(
            "[BENCH] IMPL={name:<4}  [{:>8.3} s] [{}:ALL]",
            filter_time.as_secs_f64(),
            FILTER_NAMES[current_filter as usize]
        );
    }
    println!("[BENCH] IMPL={name:<4}  [{:>8.3} s] [Total]\n", total.as_secs_f64());
}
