use indicatif::ProgressStyle;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::recalc::summary::PhaseSummary;

/// Attaches a bar to `span`. It is drawn by the `IndicatifLayer` while the
/// span is entered, so log lines written through the layer never tear it.
pub fn progress_span(span: &Span, len: u64, msg: &str) {
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
    {
        span.pb_set_style(&style.progress_chars("##-"));
    }

    span.pb_set_length(len);
    span.pb_set_message(msg);
}

/// Remaining time extrapolated from the average time per item so far
pub fn estimate_remaining(elapsed: Duration, processed: u64, total: u64) -> Option<Duration> {
    if processed == 0 {
        return None;
    }

    let remaining = total.saturating_sub(processed);
    Some(elapsed.mul_f64(remaining as f64 / processed as f64))
}

/// `Xm Y.Ys`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    format!("{}m {:.1}s", (secs / 60.0).floor() as u64, secs % 60.0)
}

/// Progress of one phase, advanced once per finished chunk. Purely
/// observational; work instrumented with [`ProgressReporter::span`] keeps
/// the bar on screen.
pub struct ProgressReporter {
    span: Span,
    label: &'static str,
    total: u64,
    processed: u64,
    started: Instant
}

impl ProgressReporter {
    pub fn new(total: usize, label: &'static str) -> Self {
        info!("Processing {} {}...", total, label);

        let span = info_span!("recalculate", phase = label);
        progress_span(&span, total as u64, &format!("Recalculating {}", label));

        ProgressReporter {
            span,
            label,
            total: total as u64,
            processed: 0,
            started: Instant::now()
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn advance(&mut self, items: usize) {
        let processed = (self.processed + items as u64).min(self.total);
        self.span.pb_inc(processed - self.processed);
        self.processed = processed;

        if let Some(eta) = self.eta() {
            debug!(
                "Processed {}/{} {} ({} left)",
                self.processed,
                self.total,
                self.label,
                format_duration(eta)
            );
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn eta(&self) -> Option<Duration> {
        estimate_remaining(self.started.elapsed(), self.processed, self.total)
    }

    /// Dropping the span removes its bar
    pub fn finish(self, summary: &PhaseSummary) {
        let elapsed = self.started.elapsed();
        info!(
            "Completed processing {} {} in {} ({})",
            self.processed,
            self.label,
            format_duration(elapsed),
            summary
        );

        if elapsed.as_secs_f64() > 0.0 && self.processed > 0 {
            info!(
                "Average speed: {:.2} {}/second",
                self.processed as f64 / elapsed.as_secs_f64(),
                self.label
            );
        }
    }
}
