mod config;
mod link;
mod scenario;

use anyhow::{Result, bail};
use clap::Parser;

use config::{LinkConfig, ReplayConfig};
use glide::SimConfig;
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "glide-replay")]
#[command(about = "Replays scripted input over a lossy link and checks it against an in-order run")]
struct Args {
    #[arg(short, long, default_value_t = 8)]
    objects: usize,

    #[arg(short, long, default_value_t = 5_000, help = "Scripted input length in ms")]
    duration: u32,

    #[arg(short, long, default_value_t = 20)]
    tick_ms: u32,

    #[arg(long, default_value_t = 100, help = "Input change interval in ms")]
    input_interval: u32,

    #[arg(long, default_value_t = 60, help = "Batch send interval in ms")]
    send_interval: u32,

    #[arg(long, default_value_t = 30, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 120, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 40, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, default_value_t = 0.0, help = "Batch loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 128, help = "Ticks of state history kept for rewinds")]
    history: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ReplayConfig {
        sim: SimConfig {
            tick_ms: args.tick_ms,
            history_capacity: args.history,
            ..Default::default()
        },
        link: LinkConfig {
            min_latency_ms: args.min_latency,
            max_latency_ms: args.max_latency,
            jitter_ms: args.jitter,
            loss_percent: args.loss_percent.clamp(0.0, 100.0),
        },
        objects: args.objects,
        duration_ms: args.duration,
        input_interval_ms: args.input_interval,
        send_interval_ms: args.send_interval,
        seed: args.seed,
    };
    let lossy = config.link.is_lossy();

    log::info!(
        "replaying {} objects for {} ms at {} ms ticks",
        config.objects,
        config.duration_ms,
        config.sim.tick_ms
    );
    let outcome = Scenario::new(config)?.run()?;

    log::info!(
        "finished at {} ms: {} object ticks, {} rewinds",
        outcome.final_ms,
        outcome.ticks_run,
        outcome.rewinds
    );
    log::info!(
        "link: {} sent, {} dropped, {} reordered; {} inputs dropped at the pipe",
        outcome.link.sent,
        outcome.link.dropped,
        outcome.link.reordered,
        outcome.inputs_dropped
    );
    log::info!(
        "snapshot of all objects: {} bytes; max divergence {:.6}",
        outcome.snapshot_bytes,
        outcome.max_divergence
    );

    if outcome.mismatched > 0 {
        if lossy {
            log::warn!("{} objects diverged after lost batches", outcome.mismatched);
        } else {
            bail!(
                "{} objects diverged from the in-order run without any loss",
                outcome.mismatched
            );
        }
    }

    Ok(())
}
