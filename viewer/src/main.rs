//! roadwatch – interactive detection viewer
//!
//! Plays a video file through a YOLOv8 detector and shows the annotated
//! frames in a window.  `p` pauses/resumes, `q` quits.  Strictly
//! single-threaded: fetch → detect → annotate → show → key poll, round and
//! round until the stream ends or the user bails.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use opencv::highgui;
use roadwatch_detect::{Detector, TractYolo};
use roadwatch_overlay::{Annotator, ClassColorMap, FrameStats, Theme};
use roadwatch_source::{FrameSource, VideoFile};
use std::time::{Duration, Instant};

mod playback;
use playback::Playback;

const WINDOW_TITLE: &str = "Traffic Detection";

#[derive(Parser)]
#[command(name = "roadwatch", about = "Object-detection overlay viewer for video files")]
struct CliArgs {
    /// Video file to play
    video: String,

    /// ONNX detection weights
    #[arg(long, default_value = "yolov8n.onnx")]
    weights: String,

    /// Pacing delay applied after each displayed frame, in seconds
    #[arg(long, default_value_t = 0.001)]
    delay: f64,

    /// Panel theme ("dark"; anything else selects the light preset)
    #[arg(long, default_value = "dark")]
    theme: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let mut detector =
        TractYolo::new(&args.weights).with_context(|| format!("loading weights {}", args.weights))?;
    let mut source =
        VideoFile::open(&args.video).with_context(|| format!("opening video {}", args.video))?;
    let annotator = Annotator::new(ClassColorMap::default(), Theme::from_name(&args.theme));

    let (win_w, win_h) = source.output_size();
    highgui::named_window(WINDOW_TITLE, highgui::WINDOW_NORMAL)?;
    highgui::resize_window(WINDOW_TITLE, win_w, win_h)?;
    info!("playing {} at {}x{}", args.video, win_w, win_h);

    let outcome = run_loop(&mut source, &mut detector, &annotator, args.delay);

    // released on every exit path, even when the loop errored out
    drop(source);
    highgui::destroy_all_windows()?;
    info!("video capture and windows released");
    outcome
}

fn run_loop<S, D>(source: &mut S, detector: &mut D, annotator: &Annotator, delay: f64) -> Result<()>
where
    S: FrameSource,
    D: Detector,
{
    let mut state = Playback::Running;
    let mut prev = Instant::now();

    loop {
        if !state.is_paused() {
            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("end of stream");
                    break;
                }
                Err(e) => {
                    // unreadable frame ends playback, it is not an error
                    debug!("frame read failed, stopping: {e}");
                    break;
                }
            };

            let dets = detector.detect(&frame)?;

            // instantaneous FPS: reciprocal of wall-clock time per frame
            let now = Instant::now();
            let fps = 1.0 / now.duration_since(prev).as_secs_f64().max(f64::EPSILON);
            prev = now;

            let stats = FrameStats::from_detections(&dets, fps);
            annotator.annotate(&mut frame, &dets, &stats)?;
            highgui::imshow(WINDOW_TITLE, &frame)?;
            std::thread::sleep(Duration::from_secs_f64(delay));
        }

        let key = highgui::wait_key(1)?;
        let next = state.handle_key(key);
        if next != state {
            match next {
                Playback::Paused => info!("paused"),
                Playback::Running => info!("resumed"),
                Playback::Stopped => info!("video stopped by user"),
            }
        }
        state = next;
        if state.is_stopped() {
            break;
        }
    }

    Ok(())
}
