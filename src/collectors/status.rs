//! Status Collector
//!
//! Fetches the merged status / maintenance / outage / monitor document,
//! differences it against the previous tick and forwards every change to the
//! log and, when enabled, to the MIB.

use super::{CollectionContext, CollectionResult, CollectionStatus};
use crate::sinks::{BufferSink, ChangeSink, FanOut, LogSink};
use crate::status::StatusTreeDiffer;
use tracing::{debug, warn};

pub async fn collect_status(
    ctx: &CollectionContext<'_>,
    differ: &mut StatusTreeDiffer,
) -> CollectionResult {
    ctx.metrics.polls_total.inc();

    let document = match ctx.client.fetch_status_document(ctx.config.use_numeric).await {
        Ok(document) => document,
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            warn!("Failed to query status: {}", e);
            return Ok(CollectionStatus::Failed);
        }
    };

    let mut log = LogSink;
    let mut buffer = BufferSink::default();
    let summary = {
        let mut sinks = FanOut::new(vec![&mut log as &mut dyn ChangeSink, &mut buffer]);
        differ.observe(&document, &ctx.config.path_root, &mut sinks)
    };

    ctx.metrics
        .changes_emitted_total
        .inc_by(summary.emitted as u64);
    ctx.metrics
        .type_errors_total
        .inc_by(summary.type_errors as u64);

    if let Some(mib) = ctx.mib {
        let updated = mib.apply(buffer.drain()).await;
        ctx.metrics.mib_updates_total.inc_by(updated as u64);
        debug!("{} MIB values updated", updated);
    }

    debug!(
        "Status poll: {} changed, {} blacklisted, {} skipped",
        summary.emitted, summary.suppressed, summary.type_errors
    );
    Ok(CollectionStatus::Success)
}
