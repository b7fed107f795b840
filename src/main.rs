// src/main.rs
//
// Thin training harness around the mansard library.
// All of the real logic lives in the lib crate (engine, rl, runs).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use mansard::{
    demo_portfolio, load_portfolio, resolve_effective_profile, Config, EventSink, InMemoryRunStore,
    JsonlSink, NoopSink, RiskProfile, RunId, RunStatus, RunStore, Trainer,
};
use mansard::rl::{EvalRollout, TrainingSummary};

/// Command-line arguments for the mansard binary.
#[derive(Parser, Debug)]
#[command(name = "mansard")]
struct Cli {
    /// Number of training episodes.
    #[arg(long, default_value_t = 300)]
    episodes: u64,

    /// Hard per-episode step cap (episodes normally end at the horizon).
    #[arg(long, default_value_t = 500)]
    max_steps: u64,

    /// Base seed. Episode e resets the environment with seed + e.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Risk profile: balanced | conservative | aggressive.
    /// Overrides MANSARD_RISK_PROFILE.
    #[arg(long)]
    profile: Option<String>,

    /// JSON asset file. Uses the built-in demo portfolio when omitted.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Fixed asset capacity of the encoder and action space.
    #[arg(long)]
    max_assets: Option<usize>,

    /// Policy gradient-ascent step size.
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Discount factor for episode returns.
    #[arg(long)]
    gamma: Option<f64>,

    /// Optional JSONL path for step/episode telemetry.
    #[arg(long)]
    log_jsonl: Option<String>,

    /// Increase diagnostic verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "info,mansard=debug",
        _ => "debug,mansard=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Telemetry sink for the run, chosen at runtime: a JSONL stream when a
/// path was given, otherwise a no-op.
fn build_sink(log_jsonl: Option<&str>) -> Box<dyn EventSink> {
    match log_jsonl {
        Some(path) => match JsonlSink::create(path) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                warn!(target: "main", path, %err, "could not open JSONL log, telemetry disabled");
                Box::new(NoopSink)
            }
        },
        None => Box::new(NoopSink),
    }
}

/// Build Config from the profile preset, then apply CLI overrides.
fn build_config(cli: &Cli, profile: RiskProfile) -> Config {
    let mut config = Config::for_profile(profile);

    config.trainer.num_episodes = cli.episodes;
    config.trainer.max_steps = cli.max_steps;
    config.trainer.base_seed = cli.seed;
    config.policy.seed = cli.seed;

    if let Some(n) = cli.max_assets {
        config.max_assets = n;
    }
    if let Some(lr) = cli.learning_rate {
        config.policy.learning_rate = lr;
    }
    if let Some(g) = cli.gamma {
        config.policy.gamma = g;
    }

    config
}

fn format_return(r: Option<f64>) -> String {
    match r {
        Some(v) => format!("{:+.2}%", v * 100.0),
        None => "-".to_string(),
    }
}

fn print_summary(
    run_id: RunId,
    eval_seed: u64,
    summary: &TrainingSummary,
    baseline: &EvalRollout,
    optimized: &EvalRollout,
) {
    println!();
    println!("SUMMARY");
    println!("  run_id:           {run_id}");
    println!("  policy:           {}", summary.policy_version);
    println!("  episodes:         {}", summary.episodes);
    println!("  total_steps:      {}", summary.total_steps);
    println!(
        "  reward:           mean={:.6}  std(pop)={:.6}",
        summary.mean_reward, summary.reward_stddev
    );
    println!(
        "  terminal_return:  mean={:.4}  best={:.4}  worst={:.4}",
        summary.mean_terminal_return, summary.best_terminal_return, summary.worst_terminal_return
    );
    println!("  bankruptcies:     {}", summary.bankruptcies);
    println!("  final_loss:       {:.6}", summary.final_loss);

    println!();
    println!("EVALUATION (seed {eval_seed})");
    println!(
        "  baseline (hold):    return={}  bankrupt={}",
        format_return(baseline.terminal_return),
        baseline.bankrupt
    );
    println!(
        "  optimized (greedy): return={}  bankrupt={}",
        format_return(optimized.terminal_return),
        optimized.bankrupt
    );

    println!();
    println!("RECOMMENDED ACTIONS ({})", optimized.actions.len());
    for action in &optimized.actions {
        println!(
            "  period {:>3}  {:<20} {:<10} confidence={:.3}",
            action.period,
            action.asset_id,
            action.action.as_str(),
            action.confidence
        );
    }
}

fn main() -> anyhow::Result<()> {
    // 0) Parse CLI args + install diagnostics.
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // 1) Resolve risk profile (CLI > env > default) and build config.
    let cli_profile = match cli.profile.as_deref() {
        Some(raw) => Some(
            RiskProfile::parse(raw)
                .context("invalid --profile (expected balanced | conservative | aggressive)")?,
        ),
        None => None,
    };
    let effective = resolve_effective_profile(cli_profile);
    effective.log_startup();
    let config = build_config(&cli, effective.profile);

    // 2) Load the portfolio.
    let records = match cli.assets.as_ref() {
        Some(path) => load_portfolio(path)
            .with_context(|| format!("loading assets from {}", path.display()))?,
        None => demo_portfolio(),
    };

    let cfg_hash = fnv1a64(&format!("{config:?}"));
    println!(
        "mansard v{} | cfg={} cfg_hash=0x{:016x} | profile={} ({}) | episodes={} max_steps={} seed={} assets={} log={}",
        env!("CARGO_PKG_VERSION"),
        config.version,
        cfg_hash,
        effective.profile.as_str(),
        effective.source.as_str(),
        config.trainer.num_episodes,
        config.trainer.max_steps,
        config.trainer.base_seed,
        records.len(),
        cli.log_jsonl.as_deref().unwrap_or("-"),
    );

    // 3) Register the run, then train.
    let mut store = InMemoryRunStore::new();
    let run_id = store.create(config.trainer.base_seed, config.trainer.num_episodes);
    store.update_status(run_id, RunStatus::Running)?;

    let sink = build_sink(cli.log_jsonl.as_deref());
    let mut trainer = match Trainer::new(&config, &records, sink) {
        Ok(t) => t,
        Err(err) => {
            store.fail(run_id, err.to_string())?;
            return Err(err).context("building trainer");
        }
    };
    let summary = trainer.train();

    // 4) Evaluate on a held-out seed: all-hold baseline vs greedy policy.
    let eval_seed = config
        .trainer
        .base_seed
        .wrapping_add(config.trainer.num_episodes);
    let baseline = trainer.rollout_baseline(eval_seed);
    let optimized = trainer.rollout_greedy(eval_seed);

    store.complete(
        run_id,
        baseline.terminal_return.unwrap_or(0.0),
        optimized.terminal_return.unwrap_or(0.0),
        optimized.actions.clone(),
    )?;

    // 5) Print the run summary.
    print_summary(run_id, eval_seed, &summary, &baseline, &optimized);

    Ok(())
}
