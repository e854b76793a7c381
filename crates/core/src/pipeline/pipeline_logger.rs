use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Observer for tracking-run events.
///
/// Keeps the track-faces use case independent of where progress and timings
/// end up (stdout summary, tests, nothing at all).
pub trait PipelineLogger: Send {
    /// Reports that `current` frames have been processed. `total` is 0 when
    /// the source length is unknown (live streams, open-ended sources).
    fn progress(&mut self, current: usize, total: usize);

    /// Records how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Records a point-in-time metric (e.g. smoothed fps).
    fn metric(&mut self, name: &str, value: f64);

    /// Counts one occurrence of a named event, such as the strategy a frame
    /// ran. Default: ignored.
    fn count(&mut self, _name: &str) {}

    /// Logs a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emits an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Aggregates stage timings, metrics and event counts and reports them
/// through the `log` facade.
///
/// Progress lines are throttled to one every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    counts: BTreeMap<String, usize>,
    start_time: Instant,
    frames: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            counts: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.counts.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Tracking summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", mean(&self.metrics[name])));
        }

        for (name, n) in &self.counts {
            let share = if frames > 0 {
                *n as f64 / frames as f64 * 100.0
            } else {
                0.0
            };
            lines.push(format!("  {name:20}: {n:6} frames ({share:4.1}%)"));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn count_for(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn count(&mut self, name: &str) {
        *self.counts.entry(name.to_string()).or_default() += 1;
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("fps", 30.0);
        logger.count("roi_detection");
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("track", 20.0);
        logger.timing("track", 30.0);
        logger.timing("read", 5.0);

        assert_eq!(logger.timings_for("track").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("read").unwrap(), &[5.0]);
        assert!(logger.timings_for("missing").is_none());
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(5, 5);
        logger.metric("fps", 3.0);
        logger.metric("fps", 4.0);

        assert_relative_eq!(mean(logger.metrics_for("fps").unwrap()), 3.5);
        assert!(logger.summary_string().unwrap().contains("fps: avg 3.5"));
    }

    #[test]
    fn test_counts_accumulate_and_show_share() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(4, 0);
        logger.count("roi_detection");
        logger.count("roi_detection");
        logger.count("roi_detection");
        logger.count("template_matching");

        assert_eq!(logger.count_for("roi_detection"), 3);
        assert_eq!(logger.count_for("lost"), 0);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("roi_detection"));
        assert!(summary.contains("75.0%"));
    }

    #[test]
    fn test_summary_mentions_stages_and_throughput() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(100, 100);
        logger.timing("track", 10.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Tracking summary (100 frames"));
        assert!(summary.contains("track"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_without_total() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames, 25);
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.info("face acquired");
        assert_eq!(logger.messages, vec!["face acquired".to_string()]);
    }

    #[test]
    fn test_throttle_is_at_least_one() {
        assert_eq!(StdoutPipelineLogger::new(0).throttle_frames, 1);
        assert_eq!(StdoutPipelineLogger::default().throttle_frames, 30);
    }
}
