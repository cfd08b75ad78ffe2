//! Structured observability hooks for the run lifecycle.
//!
//! - `run_span` builds the span a whole run is instrumented with
//! - `emit_*` functions log one event per lifecycle step
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::info;

/// Span that tags everything logged during a run with its id and repository.
///
/// # Example
///
/// ```ignore
/// use tracing::Instrument;
/// run_pipeline().instrument(run_span("42", "acme/widget")).await;
/// ```
pub fn run_span(run_id: &str, repository: &str) -> tracing::Span {
    tracing::info_span!("repostats.run", run_id = %run_id, repository = %repository)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, archive_name: &str) {
    info!(event = "run.started", run_id = %run_id, archive = %archive_name);
}

/// Emit event: the run moved into a new stage.
pub fn emit_stage_entered(stage: &str) {
    info!(event = "stage.entered", stage = %stage);
}

/// Emit event: one report body written to disk.
pub fn emit_report_fetched(report: &str, bytes: u64) {
    info!(event = "report.fetched", report = %report, bytes = bytes);
}

/// Emit event: archive built.
pub fn emit_archive_built(name: &str, size_bytes: u64, digest: &str) {
    info!(
        event = "archive.built",
        archive = %name,
        size_bytes = size_bytes,
        digest = %digest,
    );
}

/// Emit event: archive committed and pushed.
pub fn emit_publish_committed(branch: &str, path: &str, commit: &str) {
    info!(event = "publish.committed", branch = %branch, path = %path, commit = %commit);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: a stage failed (warning level).
pub fn emit_stage_failed(stage: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "stage.failed", stage = %stage, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("42", "acme/widget").entered();
        emit_stage_entered("fetching");
        emit_stage_failed("fetching", &"boom");
    }
}
