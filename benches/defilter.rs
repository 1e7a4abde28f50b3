//! Criterion micro-benchmarks for the defilter kernels.
//!
//! Compares the reference, specialized and SIMD kernels per filter and bpp
//! on a 256x256 image, the same shape the wall-clock harness uses.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use depng::harness::{random_image, BPP_VALUES, FILTER_NAMES};
use depng::{defilter_opt, defilter_ref, defilter_simd, DefilterFn};

const KERNELS: [(&str, DefilterFn); 3] = [
    ("ref", defilter_ref),
    ("opt", defilter_opt),
    ("simd", defilter_simd),
];

const W: u32 = 256;
const H: u32 = 256;

fn bench_filter(c: &mut Criterion, filter: u32) {
    let mut group = c.benchmark_group(format!("defilter_{}", FILTER_NAMES[filter as usize].to_lowercase()));

    for &bpp in &BPP_VALUES {
        let bpl = W * bpp + 1;
        let image = random_image(W, H, bpp, filter, 0);
        group.throughput(Throughput::Bytes(image.len() as u64));

        for (name, kernel) in KERNELS {
            group.bench_with_input(BenchmarkId::new(name, bpp), &image, |b, image| {
                // Defiltering already-reconstructed bytes does the same work
                // per call, so one buffer serves every iteration.
                let mut buf = image.clone();
                b.iter(|| {
                    kernel(black_box(&mut buf), H, bpp, bpl);
                });
            });
        }
    }

    group.finish();
}

fn bench_sub(c: &mut Criterion) {
    bench_filter(c, 1);
}

fn bench_up(c: &mut Criterion) {
    bench_filter(c, 2);
}

fn bench_avg(c: &mut Criterion) {
    bench_filter(c, 3);
}

fn bench_paeth(c: &mut Criterion) {
    bench_filter(c, 4);
}

fn bench_mixed(c: &mut Criterion) {
    bench_filter(c, 5);
}

criterion_group!(benches, bench_sub, bench_up, bench_avg, bench_paeth, bench_mixed);
criterion_main!(benches);
