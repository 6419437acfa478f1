use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Instant;

use sm_core::engine::MatchEngine;
use sm_core::url::{extract_host, extract_prefix_host};

pub struct BenchOptions {
    pub url_count: usize,
    pub iterations: usize,
    pub seed: u32,
}

struct BenchResult {
    op_count: usize,
    total_ms: f64,
    avg_us: f64,
    p50_us: f64,
    p95_us: f64,
    p99_us: f64,
    ops_per_sec: u64,
}

const FILLER_HOSTS: &[&str] = &[
    "example.com",
    "www.example.com",
    "news.ycombinator.com",
    "github.com",
    "docs.rs",
    "en.wikipedia.org",
    "mail.google.com",
    "www.youtube.com",
    "stackoverflow.com",
    "old.reddit.com",
];

const PATHS: &[&str] = &[
    "/",
    "/index.html",
    "/search?q=rust",
    "/user/settings",
    "/a/b/c/d",
    "/article/2024/01/15",
    "/static/app.js?v=3",
];

pub fn run(mut engine: MatchEngine, opts: BenchOptions) -> Result<(), String> {
    if opts.url_count == 0 || opts.iterations == 0 {
        return Err("--urls and --iterations must be positive".to_string());
    }

    let stats = engine.stats();
    println!("============================================================");
    println!("StyleMatch Benchmark");
    println!("============================================================");
    println!("Styles: {} ({} always matched, {} host keys)", stats.styles, stats.always_candidates, stats.host_keys);
    println!("Cache capacity: {}", stats.cache_capacity);

    let hosts = collect_hosts(&engine);
    let urls = generate_urls(&hosts, opts.url_count, opts.seed);
    println!("Generated {} URLs over {} hosts (seed {})", urls.len(), hosts.len(), opts.seed);
    println!();

    println!("------------------------------------------------------------");
    println!("Cold: cache cleared before every lookup");
    println!("------------------------------------------------------------");
    let cold = measure(opts.iterations, &urls, |url| {
        engine.invalidate_all();
        let start = Instant::now();
        let _ = engine.get_matches(url);
        start.elapsed()
    });
    println!("{}", format_result("Cold", &cold));

    println!("------------------------------------------------------------");
    println!("Warm: repeated lookups through the URL cache");
    println!("------------------------------------------------------------");
    for url in &urls {
        let _ = engine.get_matches(url);
    }
    let warm = measure(opts.iterations, &urls, |url| {
        let start = Instant::now();
        let _ = engine.get_matches(url);
        start.elapsed()
    });
    println!("{}", format_result("Warm", &warm));

    let stats = engine.stats();
    println!();
    println!("Cache: {} hits, {} misses, {} evictions", stats.hits, stats.misses, stats.evictions);
    Ok(())
}

fn measure(
    iterations: usize,
    urls: &[String],
    mut lookup: impl FnMut(&str) -> std::time::Duration,
) -> BenchResult {
    let mut latencies = Vec::with_capacity(iterations * urls.len());
    for _ in 0..iterations {
        for url in urls {
            latencies.push(lookup(url).as_secs_f64() * 1_000_000.0);
        }
    }

    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let total_us = latencies.iter().sum::<f64>();
    let avg_us = if latencies.is_empty() { 0.0 } else { total_us / latencies.len() as f64 };
    let ops_per_sec = if total_us > 0.0 {
        (latencies.len() as f64 / (total_us / 1_000_000.0)) as u64
    } else {
        0
    };

    BenchResult {
        op_count: latencies.len(),
        total_ms: total_us / 1000.0,
        avg_us,
        p50_us: percentile(&latencies, 0.50),
        p95_us: percentile(&latencies, 0.95),
        p99_us: percentile(&latencies, 0.99),
        ops_per_sec,
    }
}

fn format_result(name: &str, result: &BenchResult) -> String {
    format!(
        "{}:\n  Lookups:     {}\n  Total time:  {:.2}ms\n  Avg latency: {:.2}μs\n  P50 latency: {:.2}μs\n  P95 latency: {:.2}μs\n  P99 latency: {:.2}μs\n  Throughput:  {} ops/sec",
        name,
        result.op_count,
        result.total_ms,
        result.avg_us,
        result.p50_us,
        result.p95_us,
        result.p99_us,
        result.ops_per_sec,
    )
}

/// Hosts the loaded styles target, plus a few that none of them name.
fn collect_hosts(engine: &MatchEngine) -> Vec<String> {
    let mut hosts: BTreeSet<String> = FILLER_HOSTS.iter().map(|h| h.to_string()).collect();
    for style in engine.styles() {
        for section in &style.sections {
            hosts.extend(section.domains.iter().filter(|d| !d.is_empty()).cloned());
            hosts.extend(section.urls.iter().filter_map(|u| extract_host(u)).map(str::to_string));
            hosts.extend(section.url_prefixes.iter().filter_map(|p| extract_prefix_host(p)).map(str::to_string));
        }
    }
    hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect()
}

fn generate_urls(hosts: &[String], count: usize, seed: u32) -> Vec<String> {
    let mut rand = create_rng(seed);
    let mut urls = Vec::with_capacity(count);
    for i in 0..count {
        let host = &hosts[pick(hosts.len(), &mut rand)];
        let path = PATHS[pick(PATHS.len(), &mut rand)];
        let subdomain = if rand() < 0.2 { "m." } else { "" };
        let scheme = if rand() < 0.1 { "http" } else { "https" };
        let separator = if path.contains('?') { '&' } else { '?' };
        let fragment = if rand() < 0.1 { "#top" } else { "" };
        urls.push(format!("{}://{}{}{}{}n={}{}", scheme, subdomain, host, path, separator, i, fragment));
    }
    urls
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state as f64) / (u32::MAX as f64)
    }
}

fn pick(len: usize, rand: &mut impl FnMut() -> f64) -> usize {
    let idx = (rand() * len as f64).floor() as usize;
    idx.min(len.saturating_sub(1))
}
