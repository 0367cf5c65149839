//! Dependency-free, repeatable benchmark driver for both cache engines, so
//! baseline throughput can be compared across `PriorityCache` and
//! `LruCache` over time without pulling a benchmarking framework into the
//! workspace.
//!
//! There is no socket or serialization framing in the loop: both engines
//! are called directly through [`KvCache`], so the numbers reported here
//! are purely the in-process cost of the cache itself.

use std::env;
use std::hint::black_box;
use std::time::{Duration, Instant};

use cachekit_core::{CacheConfig, KvCache, LruConfig, LruCache, PriorityCache};

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;
const DEFAULT_KEY_SIZE: usize = 16;
const DEFAULT_VALUE_SIZE: usize = 128;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let _key_size = parse_usize(args.next(), DEFAULT_KEY_SIZE);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);

        let key_count = normalize_power_of_two(requested_keys);
        let key_mask = key_count - 1;

        BenchConfig {
            requested_keys,
            key_count,
            key_mask,
            op_count,
            value_size,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG to keep the workload reproducible without an
/// external dependency.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn write_u64_le(value: u64, buffer: &mut [u8]) {
    let bytes = value.to_le_bytes();
    let copy_len = buffer.len().min(bytes.len());
    buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
}

fn build_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("k{i:016x}")).collect()
}

fn build_values(count: usize, size: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let mut buffer = vec![0u8; size];
        write_u64_le(seed ^ (i as u64), &mut buffer);
        values.push(buffer);
    }
    values
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn run_against(label: &str, cache: &dyn KvCache<Vec<u8>>, keys: &[String], values: &[Vec<u8>], config: &BenchConfig) -> anyhow::Result<()> {
    for idx in 0..config.key_count {
        cache.set(&keys[idx], values[idx].clone(), Duration::ZERO)?;
    }

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let value = cache.get(&keys[idx])?;
        black_box(value);
    }
    report(&format!("{label} GET"), config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let mut value = values[idx].clone();
        if let Some(first) = value.get_mut(0) {
            *first ^= 0xFF;
        }
        cache.set(&keys[idx], value, Duration::ZERO)?;
    }
    report(&format!("{label} SET"), config.op_count, start.elapsed());

    cache.close();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = BenchConfig::from_args();

    let keys = build_keys(config.key_count);
    let values = build_values(config.key_count, config.value_size, 0x5A5A_5A5A_5A5A_5A5A);

    println!(
        "keys: requested={}, actual={}, ops={}, value_size={}",
        config.requested_keys, config.key_count, config.op_count, config.value_size
    );

    let priority_cache = PriorityCache::<Vec<u8>>::new(CacheConfig::default());
    run_against("priority", priority_cache.as_ref(), &keys, &values, &config)?;

    let lru_cache = LruCache::<Vec<u8>>::new(LruConfig::default());
    run_against("lru", lru_cache.as_ref(), &keys, &values, &config)?;

    Ok(())
}
