use anyhow::Context;
use tachyon_config::BenchConfig;
use tachyon_perf::{
    BenchResult, RunResult, measure_pair_latency, mode_name, print_result_row, print_run,
    print_table_header, run_variant, section_header, summarize_runs, variant_name,
};
use tachyon_ring::{BlockingQueue, BoundedQueue, FixedRing, SpscQueue};
use tracing::{info, warn};

fn init_tracing(default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => BenchConfig::load(path.as_str())
            .with_context(|| format!("loading bench config from {path}"))?,
        None => BenchConfig::default(),
    };
    init_tracing(&cfg.log_level);

    info!(
        capacity = cfg.capacity,
        iterations = cfg.iterations,
        runs = cfg.runs,
        "TACHYON: queue benchmark starting"
    );

    let mut summaries = Vec::new();
    let mut raw = Vec::new();

    section_header("THROUGHPUT");
    for &mode in &cfg.modes {
        for &variant in &cfg.variants {
            let name = format!("{} [{}]", variant_name(variant), mode_name(mode));

            for _ in 0..cfg.warmup_runs {
                run_variant(variant, mode, cfg.capacity, cfg.iterations)
                    .with_context(|| format!("warmup of {name}"))?;
            }

            let mut runs: Vec<RunResult> = Vec::with_capacity(cfg.runs);
            for _ in 0..cfg.runs {
                match run_variant(variant, mode, cfg.capacity, cfg.iterations)
                    .with_context(|| format!("timed run of {name}"))?
                {
                    Some(r) => runs.push(r),
                    None => break,
                }
            }

            let Some(best) = runs.iter().max_by(|a, b| a.ops_per_sec.total_cmp(&b.ops_per_sec))
            else {
                continue;
            };
            print_run(&name, best);
            if let Some(summary) = summarize_runs(&name, &runs) {
                summaries.push(summary);
            }
            raw.push(serde_json::json!({ "name": name, "runs": runs }));
        }
    }

    section_header("PER-OP LATENCY (single thread, push + pop)");
    let latency = latency_profile(cfg.capacity)?;
    print_table_header();
    for r in summaries.iter().chain(latency.iter()) {
        print_result_row(r);
    }

    if let Some(path) = &cfg.report_path {
        let report = serde_json::json!({
            "capacity": cfg.capacity,
            "iterations": cfg.iterations,
            "throughput": raw,
            "summaries": summaries,
            "latency": latency,
        });
        let body = serde_json::to_string_pretty(&report).context("serializing report")?;
        std::fs::write(path, body).with_context(|| format!("writing report to {path}"))?;
        info!(path = %path, "report written");
    } else {
        warn!("no report_path configured; results printed only");
    }

    Ok(())
}

fn latency_profile(capacity: usize) -> anyhow::Result<Vec<BenchResult>> {
    Ok(vec![
        pair_latency::<FixedRing<u64>>("FixedRing<u64> push+pop", capacity)?,
        pair_latency::<SpscQueue<u64>>("SpscQueue<u64> push+pop", capacity)?,
        pair_latency::<BlockingQueue<u64>>("BlockingQueue<u64> push+pop", capacity)?,
    ])
}

fn pair_latency<Q: BoundedQueue<u64>>(name: &str, capacity: usize) -> anyhow::Result<BenchResult> {
    let mut q = Q::with_capacity(capacity).with_context(|| format!("building {name}"))?;
    measure_pair_latency(name, &mut q, 1_000, 1_000)
        .with_context(|| format!("no latency samples for {name}"))
}
