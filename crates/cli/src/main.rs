use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

use face_tracker_core::detection::infrastructure::onnx_face_detector::{
    OnnxFaceDetector, DEFAULT_CONFIDENCE,
};
use face_tracker_core::matching::infrastructure::template_matcher::{MatchMethod, TemplateMatcher};
use face_tracker_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use face_tracker_core::pipeline::track_faces_use_case::{FaceObservation, TrackFacesUseCase};
use face_tracker_core::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL};
use face_tracker_core::shared::model_resolver;
use face_tracker_core::tracking::domain::face_tracker::FaceTracker;
use face_tracker_core::tracking::domain::tracker_config::TrackerConfig;
use face_tracker_core::tracking::domain::video_face_tracker::VideoFaceTracker;
use face_tracker_core::video::domain::frame_source::FrameSource;
use face_tracker_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use face_tracker_core::video::infrastructure::image_sequence_source::{
    is_image_file, ImageSequenceSource,
};

/// Track a single face through a video, an image, or a directory of images.
#[derive(Parser)]
#[command(name = "face-tracker")]
struct Cli {
    /// Video file or stream URL, image file, or directory of images.
    input: PathBuf,

    /// ONNX face model (downloaded to the user cache when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON tracker configuration; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Width of the downscaled working frame.
    #[arg(long)]
    resized_width: Option<u32>,

    /// Seconds of template matching before the face is declared lost.
    #[arg(long)]
    max_fallback_duration: Option<f64>,

    /// Smallest face searched for, as a fraction of the frame height.
    #[arg(long)]
    min_face_ratio: Option<f64>,

    /// Largest face searched for, as a fraction of the frame height.
    #[arg(long)]
    max_face_ratio: Option<f64>,

    /// Allowed relative size change between frames while tracking.
    #[arg(long)]
    size_tolerance: Option<f64>,

    /// Template matching score: sqdiff_normed or ccoeff_normed.
    #[arg(long)]
    match_method: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Print one JSON object per frame instead of the timing line.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    config.validate()?;
    log::debug!("Tracker config: {config:?}");

    let detector = build_detector(&cli)?;
    let matcher = TemplateMatcher::new(config.match_method);
    let tracker = FaceTracker::with_config(Box::new(detector), Box::new(matcher), config);
    if !tracker.has_valid_detector() {
        return Err("face detector is not usable".into());
    }

    let (source, total) = open_source(&cli.input)?;
    let mut use_case = TrackFacesUseCase::new(
        VideoFaceTracker::with_tracker(tracker, source),
        Box::new(StdoutPipelineLogger::default()),
        None,
    )
    .with_max_frames(cli.max_frames)
    .with_total_frames(total);

    let json = cli.json;
    let mut stdout = std::io::stdout().lock();
    let mut write_error = None;
    let summary = use_case.execute(|observation| {
        if write_error.is_none() {
            write_error = print_observation(&mut stdout, observation, json).err();
        }
    })?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    log::info!(
        "Face found in {}/{} frames",
        summary.frames_with_face,
        summary.frames
    );
    Ok(())
}

fn print_observation(
    out: &mut impl Write,
    observation: &FaceObservation,
    json: bool,
) -> std::io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, observation)?;
        return writeln!(out);
    }

    let face = observation.face;
    writeln!(
        out,
        "Time per frame: {:3.3}\tFPS: {:3.3}\tFace: {}x{}+{}+{}\tCenter: ({}, {})",
        observation.time_ms / 1000.0,
        observation.fps,
        face.width,
        face.height,
        face.x,
        face.y,
        observation.center.x,
        observation.center.y,
    )
}

fn load_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?
        }
        None => TrackerConfig::default(),
    };

    if let Some(width) = cli.resized_width {
        config.resized_width = width;
    }
    if let Some(secs) = cli.max_fallback_duration {
        config.template_matching_max_duration = secs;
    }
    if let Some(ratio) = cli.min_face_ratio {
        config.min_face_ratio = ratio;
    }
    if let Some(ratio) = cli.max_face_ratio {
        config.max_face_ratio = ratio;
    }
    if let Some(tolerance) = cli.size_tolerance {
        config.size_tolerance = tolerance;
    }
    if let Some(method) = &cli.match_method {
        config.match_method = parse_match_method(method)?;
    }
    Ok(config)
}

fn build_detector(cli: &Cli) -> Result<OnnxFaceDetector, Box<dyn std::error::Error>> {
    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {FACE_MODEL_NAME}");
            let path = model_resolver::resolve(
                FACE_MODEL_NAME,
                FACE_MODEL_URL,
                None,
                Some(Box::new(download_progress)),
            )?;
            eprintln!();
            path
        }
    };

    let detector = OnnxFaceDetector::load(&model_path, cli.confidence);
    if let Some(e) = detector.load_error() {
        return Err(format!("{e}").into());
    }
    Ok(detector)
}

/// Picks a decoder for `input` and returns it with its frame count (0 when
/// unknown).
fn open_source(input: &Path) -> Result<(Box<dyn FrameSource>, usize), Box<dyn std::error::Error>> {
    if input.is_dir() || is_image_file(input) {
        let source = ImageSequenceSource::open(input)?;
        let total = source.len();
        return Ok((Box::new(source), total));
    }

    let source = FfmpegFrameSource::open(input)?;
    log::info!(
        "Reading {} ({}x{})",
        input.display(),
        source.width(),
        source.height()
    );
    Ok((Box::new(source), 0))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let is_url = cli.input.to_string_lossy().contains("://");
    if !is_url && !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if let Some(secs) = cli.max_fallback_duration {
        Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("Max fallback duration must be >= 0 seconds, got {secs}"))?;
    }
    Ok(())
}

fn parse_match_method(name: &str) -> Result<MatchMethod, String> {
    match name {
        "sqdiff_normed" | "sqdiff" => Ok(MatchMethod::SqdiffNormed),
        "ccoeff_normed" | "ccoeff" => Ok(MatchMethod::CcoeffNormed),
        other => Err(format!(
            "Match method must be 'sqdiff_normed' or 'ccoeff_normed', got '{other}'"
        )),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_defaults_to_detector_default() {
        let cli = Cli::try_parse_from(["face-tracker", "clip.mp4"]).unwrap();
        assert_eq!(cli.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_config_file_with_unrepresentable_duration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, r#"{"template_matching_max_duration": 1e30}"#).unwrap();
        let cli = Cli::try_parse_from([
            "face-tracker",
            "clip.mp4",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, r#"{"resized_width": 480, "size_tolerance": 0.3}"#).unwrap();
        let cli = Cli::try_parse_from([
            "face-tracker",
            "clip.mp4",
            "--config",
            path.to_str().unwrap(),
            "--resized-width",
            "240",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();

        assert_eq!(config.resized_width, 240);
        assert_eq!(config.size_tolerance, 0.3);
    }
}
