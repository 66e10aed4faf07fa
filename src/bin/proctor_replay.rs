//! proctor_replay - run recorded frames through the proctoring pipeline
//!
//! Frames are submitted in argument order to a single session; the per-frame
//! verdicts and the final session summary are printed to stdout.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use proctor_kernel::{
    detect::backends::{cpu::DEFAULT_HEAD_TURN_DEVIATION, OffCenterHeadPose},
    DetectorSet, Frame, ProctorEngine, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Session id the frames are submitted under.
    #[arg(long, default_value = "replay")]
    session: String,
    /// Normalised face offset beyond which the head counts as turned.
    #[arg(long, default_value_t = DEFAULT_HEAD_TURN_DEVIATION)]
    head_turn_deviation: f32,
    /// Emit one JSON record per frame and the summary as JSON.
    #[arg(long)]
    json: bool,
    /// Image files (PNG or JPEG), in capture order.
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if !(args.head_turn_deviation > 0.0 && args.head_turn_deviation < 1.0) {
        return Err(anyhow!("--head-turn-deviation must be within (0, 1)"));
    }

    let detectors = DetectorSet::uniform(StubBackend::new())
        .with_head_pose(OffCenterHeadPose::new(args.head_turn_deviation));
    let engine = ProctorEngine::new(detectors);

    for path in &args.frames {
        let frame = Frame::open(path)?;
        let record = engine.submit_frame(&args.session, &frame)?;
        if args.json {
            println!("{}", serde_json::to_string(&record)?);
        } else {
            let tags: Vec<&str> = record
                .suspicious_activity
                .iter()
                .map(|tag| tag.as_str())
                .collect();
            println!(
                "{}  {}x{}  face={:?} gaze={:?} head={:?} blinks={}  [{}]",
                path.display(),
                frame.width(),
                frame.height(),
                record.face_status,
                record.gaze_direction,
                record.head_pose,
                record.blink_count,
                tags.join(", ")
            );
        }
    }

    let summary = engine.summary(&args.session)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("session {}", args.session);
        println!("  frames analysed:     {}", summary.total_frames_analyzed);
        println!("  blinks:              {}", summary.total_blinks);
        println!("  face anomalies:      {}", summary.face_anomalies);
        println!("  gaze violations:     {}", summary.gaze_violations);
        println!("  head movements:      {}", summary.head_movement_violations);
        println!("  object detections:   {}", summary.object_detections);
        println!("  audio violations:    {}", summary.audio_violations);
        println!("  analysis errors:     {}", summary.analysis_errors);
        println!("  total violations:    {}", summary.total_violations);
    }
    Ok(())
}
