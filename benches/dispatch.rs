//! Event dispatch benchmark suite.
//!
//! Measures how fast a transport's delivery task drains events to listeners,
//! using the replay transport so no I/O is involved:
//! - Frame counts: 100, 1 000, 10 000
//! - Listener fan-out: 1, 4, 16
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use notebook_link::transport::{EventKind, ReplayTransport, Transport, listener};
use tokio::runtime::Runtime;
use tokio::sync::Notify;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const FRAME_COUNTS: &[usize] = &[100, 1_000, 10_000];
const LISTENER_COUNTS: &[usize] = &[1, 4, 16];
const FANOUT_FRAMES: usize = 1_000;

// ============================================================================
// Fixture
// ============================================================================

/// Replay transport whose listeners signal once every frame has arrived.
struct Fixture {
    transport: ReplayTransport,
    received: Arc<AtomicUsize>,
    done: Arc<Notify>,
}

impl Fixture {
    fn new(rt: &Runtime, frames: usize, listeners: usize) -> Self {
        let _guard = rt.enter();
        let recording: Vec<String> = (0..frames)
            .map(|seq| format!(r#"{{"op":"output","seq":{seq}}}"#))
            .collect();
        let transport = ReplayTransport::with_recording(recording).expect("replay transport");

        let received = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let expected = frames * listeners;

        for _ in 0..listeners {
            let received = Arc::clone(&received);
            let done = Arc::clone(&done);
            transport.add_event_listener(
                EventKind::Message,
                listener(move |_| {
                    if received.fetch_add(1, Ordering::Relaxed) + 1 == expected {
                        done.notify_one();
                    }
                }),
            );
        }

        Self {
            transport,
            received,
            done,
        }
    }

    /// One full open → drain → close cycle.
    async fn cycle(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.transport.open();
        self.done.notified().await;
        self.transport.close();
    }
}

// ============================================================================
// Benchmark: Frame Throughput
// ============================================================================

fn bench_replay_throughput(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    let mut group = c.benchmark_group("replay_throughput");
    for &frames in FRAME_COUNTS {
        let fixture = Fixture::new(&rt, frames, 1);
        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::new("frames", frames), &fixture, |b, fixture| {
            b.to_async(&rt).iter(|| fixture.cycle());
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark: Listener Fan-out
// ============================================================================

fn bench_listener_fanout(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    let mut group = c.benchmark_group("listener_fanout");
    for &listeners in LISTENER_COUNTS {
        let fixture = Fixture::new(&rt, FANOUT_FRAMES, listeners);
        group.throughput(Throughput::Elements((FANOUT_FRAMES * listeners) as u64));
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &fixture,
            |b, fixture| {
                b.to_async(&rt).iter(|| fixture.cycle());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_replay_throughput, bench_listener_fanout);
criterion_main!(benches);
