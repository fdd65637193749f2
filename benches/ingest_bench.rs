//! Hot-path throughput: window classification, digit parsing, and the dedup
//! filter. Plain loops, no harness; run with `cargo bench`.

use std::hint::black_box;
use std::time::Instant;

use digitsd::filter::DigitsFilter;
use digitsd::protocol::{classify, parse_digits, Frame, FrameDecoder};

const ITERATIONS: usize = 10_000_000;

fn bench_classify() {
    let window = *b"123456789\n";
    let start = Instant::now();
    for _ in 0..ITERATIONS {
        let frame = classify(black_box(&window)).expect("valid window");
        if let Frame::Digits(digits) = frame {
            black_box(parse_digits(&digits));
        }
    }
    report("classify+parse", ITERATIONS, start);
}

fn bench_decoder_stream() {
    // one full frame split 7/3 across two reads, the decoder's worst case
    let head = b"1234567";
    let tail = b"89\n";
    let mut decoder = FrameDecoder::new();
    let start = Instant::now();
    for _ in 0..ITERATIONS {
        let mut input = black_box(&head[..]);
        while decoder.next_frame(&mut input).expect("valid").is_some() {}
        let mut input = black_box(&tail[..]);
        while let Some(frame) = decoder.next_frame(&mut input).expect("valid") {
            black_box(frame);
        }
    }
    report("decoder split-frame", ITERATIONS, start);
}

fn bench_filter() {
    let mut filter = DigitsFilter::new();
    // multiplicative stride visits distinct values without an rng in the loop
    let mut value: u64 = 1;
    let start = Instant::now();
    for _ in 0..ITERATIONS {
        value = (value * 48271) % 999_999_937;
        black_box(filter.test_and_set(black_box(value as u32)));
    }
    report("filter test_and_set", ITERATIONS, start);
}

fn report(name: &str, iterations: usize, start: Instant) {
    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();
    eprintln!(
        "{name}: {iterations} iterations in {:.3}s ({:.1}M/s)",
        elapsed.as_secs_f64(),
        rate / 1_000_000.0
    );
}

fn main() {
    bench_classify();
    bench_decoder_stream();
    bench_filter();
}
