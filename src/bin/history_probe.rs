use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use photograph_edit::{
    AdjustmentField, EditSession, ExportFormat, FilterType, ProcessingState, SessionConfig,
};

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

fn ensure_completed(session: &EditSession, step: &str) -> Result<()> {
    match session.processing_state() {
        ProcessingState::Failed { error } => anyhow::bail!("{step} render failed: {error}"),
        _ => Ok(()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let _bin = args.next();
    let path = args
        .next()
        .map(PathBuf::from)
        .context("usage: history_probe <image> [slider-steps]")?;
    let steps = args
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(30)
        .max(1);

    let config = SessionConfig::load();
    let image =
        image::open(&path).with_context(|| format!("open failed for {}", path.display()))?;
    eprintln!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );

    let mut session = EditSession::with_cpu_processor(config);
    let load_start = Instant::now();
    session.load_image(image);
    session.wait_for_preview();
    ensure_completed(&session, "load")?;
    let load_ms = load_start.elapsed().as_secs_f64() * 1000.0;

    // Simulated slider drag: many staged updates, one commit.
    let mut slider_samples = Vec::with_capacity(steps);
    session.start_previewing_adjustments();
    let start = *session.state().user_adjustments();
    for i in 1..=steps {
        let value = 0.6 * i as f32 / steps as f32;
        let t0 = Instant::now();
        session.update_preview_adjustments(start.with(AdjustmentField::Exposure, value));
        session.wait_for_preview();
        slider_samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }
    session.commit_preview_adjustments();
    ensure_completed(&session, "slider")?;

    session.apply_filter(FilterType::Vintage, 0.8);
    session.apply_filter(FilterType::Sepia, 0.6);
    for _ in 0..5 {
        session.nudge_rotation(1.0_f32.to_radians());
    }
    session.wait_for_preview();

    let undo_start = Instant::now();
    let mut undone = 0;
    while session.undo() {
        undone += 1;
    }
    let mut redone = 0;
    while session.redo() {
        redone += 1;
    }
    session.wait_for_preview();
    let undo_redo_ms = undo_start.elapsed().as_secs_f64() * 1000.0;
    ensure_completed(&session, "undo/redo")?;

    let mut exports = Vec::with_capacity(ExportFormat::ALL.len());
    for format in ExportFormat::ALL {
        let export_start = Instant::now();
        let bytes = session
            .export_image(format, 0.9)
            .with_context(|| format!("{} export failed", format.label()))?;
        let export_ms = export_start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            format = format.label(),
            lossless = format.is_lossless(),
            bytes = bytes.len(),
            "Exported"
        );
        exports.push((format, export_ms, bytes.len()));
    }

    println!("METRIC load_ms={:.2}", load_ms);
    println!("METRIC slider_steps={}", steps);
    println!("METRIC slider_ms_median={:.2}", median_ms(&slider_samples));
    println!("METRIC history_commands={}", session.history().command_count());
    println!("METRIC undo_steps={}", undone);
    println!("METRIC redo_steps={}", redone);
    println!("METRIC undo_redo_ms={:.2}", undo_redo_ms);
    println!(
        "METRIC rotation_degrees={:.1}",
        session.state().crop_rotate().rotation_degrees()
    );
    for (format, export_ms, bytes) in &exports {
        let ext = format.extension();
        println!("METRIC export_{ext}_ms={export_ms:.2}");
        println!("METRIC export_{ext}_bytes={bytes}");
    }

    let recent: Vec<_> = session.recent_operations().collect();
    let stats = serde_json::json!({
        "session": session.session_statistics(),
        "history": session.history_statistics(),
        "recent_operations": recent,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("statistics serialization failed")?
    );

    Ok(())
}
