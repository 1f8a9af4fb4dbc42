//! QRO demo on the simulated instruments
//!
//! Runs a live transmission average, a g/e/f single-shot classification and
//! a small readout-parameter sweep, then prints the resulting calibration.
//!
//! Usage:
//!   cargo run --bin qro_demo
//!   cargo run --bin qro_demo -- --quick
//!   RUST_LOG=debug cargo run --bin qro_demo

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use qro_backend::{SimulatedReadout, SimulatedSweep};
use qro_calibration::CalibrationCache;
use qro_core::ReadoutParams;
use qro_engine::prelude::*;
use std::sync::Arc;

const QUBIT: &str = "Q0";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       QRO - Qubit Readout Optimizer (simulated hardware)     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let args: Vec<String> = std::env::args().collect();
    let quick = args.iter().any(|a| a == "--quick");
    let cache = CalibrationCache::default_ttl();

    // ========================================================================
    // 1. Live averaging
    // ========================================================================

    println!("▶ Averaging resonator transmission...");
    let sweep = Arc::new(SimulatedSweep::new(7000.0, 10.0).with_seed(1));
    let averager = Averager::new(
        Arc::clone(&sweep),
        AveragingConfig::new(if quick { 5 } else { 20 }),
    );
    let mut observer = CallbackObserver::new().on_progress(|done, total, eta| {
        let eta = eta.map_or_else(|| "-".to_string(), |d| format!("{:.2}s", d.as_secs_f64()));
        println!("  round {}/{} (eta {})", done, total, eta);
    });
    let outcome = averager.run(&mut observer).await?;

    let magnitude = outcome.magnitude().context("no rounds completed")?;
    let (dip, depth) = magnitude
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (k, &m)| if m < best.1 { (k, m) } else { best });
    println!(
        "  {} -> dip at {:.3} MHz (|S21| = {:.3})\n",
        outcome,
        sweep.frequencies()[dip],
        depth
    );

    // ========================================================================
    // 2. Single shot
    // ========================================================================

    println!("▶ Single-shot g/e/f classification...");
    let instrument = Arc::new(SimulatedReadout::new(ReadoutParams::new(7001.0, 0.25, 0.2)).with_seed(7));
    let runner = SingleShotRunner::new(
        Arc::clone(&instrument),
        SingleShotConfig::gef().with_shots(if quick { 1000 } else { 5000 }),
    );
    let result = runner.run()?;
    println!("{}\n", result);

    // ========================================================================
    // 3. Readout optimization
    // ========================================================================

    println!("▶ Optimizing readout parameters...");
    let config = if quick {
        SweepConfig::frequency_only(7000.0)
            .with_freq(4.0, 5)
            .with_shots(500)
    } else {
        SweepConfig::full(7000.0)
            .with_gain(0.1, 0.4, 4)
            .with_length(0.1, 0.3, 3)
            .with_shots(1000)
    };
    let bar = ProgressBar::new(config.axes().total_points() as u64);
    bar.set_style(
        ProgressStyle::with_template("  [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_message("points");
    let mut optimizer = ReadoutOptimizer::new(instrument, config)
        .with_calibration_cache(cache.clone(), QUBIT);
    let sweep_result = optimizer.run(&CancelToken::new(), |done, _| bar.set_position(done as u64))?;
    bar.finish();
    let best = optimizer
        .update_result(&sweep_result)
        .context("sweep measured no points")?;
    println!(
        "  best: {} in {} ms\n",
        best, sweep_result.metrics.total_time_ms
    );

    // ========================================================================
    // 4. Calibration
    // ========================================================================

    let calibration = cache
        .get(QUBIT)
        .context("optimizer did not publish a calibration")?;
    println!("▶ Calibration for {}:", QUBIT);
    println!("{}", calibration.to_json()?);

    Ok(())
}
