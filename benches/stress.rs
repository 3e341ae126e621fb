use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, NaiveTime};

use hourglass::clock::ManualClock;
use hourglass::directory::{Role, SpaceInfo, StaticDirectory};
use hourglass::engine::Engine;
use hourglass::model::*;
use hourglass::notify::NotifyHub;

const PRICE_PER_HOUR: i64 = 10_000;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()
}

struct Bench {
    engine: Arc<Engine>,
    dir: Arc<StaticDirectory>,
    host: UserId,
}

impl Bench {
    fn new(name: &str) -> Self {
        let dir_path = std::env::temp_dir().join("hourglass_bench");
        std::fs::create_dir_all(&dir_path).unwrap();
        let wal = dir_path.join(name);
        let _ = std::fs::remove_file(&wal);

        let dir = Arc::new(StaticDirectory::new());
        let host = UserId::new();
        dir.add_user(host, Role::Host);
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2030, 12, 1).unwrap().and_time(hour(0)),
        ));
        let engine = Arc::new(
            Engine::new(wal, dir.clone(), dir.clone(), clock, Arc::new(NotifyHub::new())).unwrap(),
        );
        Self { engine, dir, host }
    }

    fn guest(&self) -> UserId {
        let id = UserId::new();
        self.dir.add_user(id, Role::Guest);
        id
    }

    /// A space open 00:00-23:00 on `days` consecutive days.
    async fn space(&self, days: u64) -> SpaceId {
        let id = SpaceId::new();
        self.dir.add_space(SpaceInfo {
            id,
            host_id: self.host,
            price_per_hour: PRICE_PER_HOUR,
            max_capacity: 10,
        });
        let specs = (0..days)
            .map(|d| WindowSpec::new(first_day() + Days::new(d), hour(0), hour(23)))
            .collect();
        self.engine
            .replace_availability(self.host, id, specs)
            .await
            .unwrap();
        id
    }
}

fn request(space_id: SpaceId, date: NaiveDate, start: u32) -> BookingRequest {
    BookingRequest {
        space_id,
        date,
        start: hour(start),
        end: hour(start + 1),
        price: PRICE_PER_HOUR,
        guest_count: 1,
        usage_purpose: None,
        request_message: None,
    }
}

async fn phase1_sequential() {
    let bench = Bench::new("sequential.wal");
    let days = 90;
    let space = bench.space(days).await;
    let guest = bench.guest();

    let mut latencies = Vec::new();
    let start = Instant::now();
    for d in 0..days {
        let date = first_day() + Days::new(d);
        for h in 0..23 {
            let t = Instant::now();
            bench
                .engine
                .create_booking(guest, request(space, date, h))
                .await
                .unwrap();
            latencies.push(t.elapsed());
        }
    }
    let elapsed = start.elapsed();
    let n = latencies.len();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_contended() {
    let bench = Bench::new("contended.wal");
    let space = bench.space(1).await;
    let n_tasks = 200;

    let won = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..n_tasks {
        let engine = bench.engine.clone();
        let guest = bench.guest();
        let won = won.clone();
        // everyone fights over a handful of hours
        let h = (i % 4) as u32 + 9;
        handles.push(tokio::spawn(async move {
            if engine
                .create_booking(guest, request(space, first_day(), h))
                .await
                .is_ok()
            {
                won.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    let elapsed = start.elapsed();
    let won = won.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} requests for 4 slots: {won} won in {:.2}ms",
        elapsed.as_secs_f64() * 1000.0
    );
    assert_eq!(won, 4, "overlapping bookings slipped through");
}

async fn phase3_spread() {
    let bench = Bench::new("spread.wal");
    let n_spaces = 20;
    let mut spaces = Vec::new();
    for _ in 0..n_spaces {
        spaces.push(bench.space(30).await);
    }

    let start = Instant::now();
    let mut handles = Vec::new();
    for (i, &space) in spaces.iter().enumerate() {
        let engine = bench.engine.clone();
        let guest = bench.guest();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for d in 0..30u64 {
                let date = first_day() + Days::new(d);
                for h in (i as u32 % 2..23).step_by(2) {
                    let t = Instant::now();
                    engine
                        .create_booking(guest, request(space, date, h))
                        .await
                        .unwrap();
                    latencies.push(t.elapsed());
                }
            }
            latencies
        }));
    }
    let mut latencies = Vec::new();
    for h in handles {
        latencies.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    let total = latencies.len();
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_spaces} spaces, {total} bookings in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
    print_latency("write latency (group commit)", &mut latencies);
}

async fn phase4_read_under_load() {
    let bench = Bench::new("read_under_load.wal");
    let space = bench.space(60).await;

    let stop = Arc::new(AtomicBool::new(false));
    let mut writers = Vec::new();
    for w in 0..4u64 {
        let engine = bench.engine.clone();
        let guest = bench.guest();
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut d = w;
            while !stop.load(Ordering::Relaxed) && d < 60 {
                let date = first_day() + Days::new(d);
                for h in 0..23 {
                    let _ = engine.create_booking(guest, request(space, date, h)).await;
                }
                d += 4;
            }
        }));
    }

    let mut latencies = Vec::new();
    for i in 0..5000u64 {
        let date = first_day() + Days::new(i % 60);
        let t = Instant::now();
        let _ = bench.engine.get_available_slots(space, date).await;
        latencies.push(t.elapsed());
    }
    stop.store(true, Ordering::Relaxed);
    for w in writers {
        w.await.unwrap();
    }
    print_latency("slot query latency", &mut latencies);
}

async fn phase5_compaction() {
    let bench = Bench::new("compaction.wal");
    let space = bench.space(10).await;
    let guest = bench.guest();
    for d in 0..10u64 {
        let date = first_day() + Days::new(d);
        for h in 0..23 {
            let id = bench
                .engine
                .create_booking(guest, request(space, date, h))
                .await
                .unwrap();
            if h % 2 == 0 {
                bench.engine.cancel_reservation(guest, id).await.unwrap();
            }
        }
    }
    let appends = bench.engine.wal_appends_since_compact().await;
    let t = Instant::now();
    bench.engine.compact_wal().await.unwrap();
    println!(
        "  compacted {appends} appends in {:.2}ms",
        t.elapsed().as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    println!("phase 1: sequential bookings, one space");
    phase1_sequential().await;
    println!("phase 2: contended slots");
    phase2_contended().await;
    println!("phase 3: concurrent bookings across spaces");
    phase3_spread().await;
    println!("phase 4: slot reads under write load");
    phase4_read_under_load().await;
    println!("phase 5: compaction");
    phase5_compaction().await;
}
