//! Parallel extraction across resources.
//!
//! One worker task per resource, each with its own authenticated
//! session. Workers never share state; the only shared output is the
//! joined record set. A failing or timed-out worker contributes zero
//! records and never cancels its siblings - the single exception is a
//! rejected authentication, which is surfaced after everything joined.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, ExtractionConfig};
use crate::error::{ExtractionError, QuadraError, Result};
use crate::matrix::{self, MatrixDocument};
use crate::records::{AvailableSlot, Credentials, ExtractionWindow, Resource, SlotRecord};
use crate::session::{Portal, PortalSession};

/// Progress event during extraction.
#[derive(Debug, Clone)]
pub enum ExtractProgress {
    /// A worker's session is authenticated and parked on its resource.
    SessionOpened { resource: String },
    /// One date was read.
    DayExtracted {
        resource: String,
        date: NaiveDate,
        records: usize,
    },
    /// A worker finished its whole window.
    ResourceComplete { resource: String, records: usize },
    /// A worker failed; the resource contributes zero records.
    ResourceFailed { resource: String, error: String },
    /// A worker exceeded its hard budget and was abandoned.
    ResourceTimeout { resource: String, seconds: u64 },
}

fn report(tx: &Option<mpsc::UnboundedSender<ExtractProgress>>, progress: ExtractProgress) {
    if let Some(tx) = tx {
        if let Err(e) = tx.send(progress.clone()) {
            debug!("Failed to send progress event: {}", e);
        }
    }
    match &progress {
        ExtractProgress::SessionOpened { resource } => {
            debug!("Session opened: {}", resource);
        }
        ExtractProgress::DayExtracted {
            resource,
            date,
            records,
        } => {
            debug!("Read {}: {} ({} records)", resource, date, records);
        }
        ExtractProgress::ResourceComplete { resource, records } => {
            info!("Resource complete: {} ({} records)", resource, records);
        }
        ExtractProgress::ResourceFailed { resource, error } => {
            warn!("Resource failed: {}: {}", resource, error);
        }
        ExtractProgress::ResourceTimeout { resource, seconds } => {
            warn!("Resource timed out: {} after {}s", resource, seconds);
        }
    }
}

/// The extraction orchestrator.
pub struct ExtractionCoordinator {
    portal: Arc<dyn Portal>,
    config: ExtractionConfig,
    progress_tx: Option<mpsc::UnboundedSender<ExtractProgress>>,
}

impl ExtractionCoordinator {
    pub fn new(portal: Arc<dyn Portal>, config: ExtractionConfig) -> Self {
        Self {
            portal,
            config,
            progress_tx: None,
        }
    }

    /// Get a progress receiver.
    pub fn progress_channel(&mut self) -> mpsc::UnboundedReceiver<ExtractProgress> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress_tx = Some(tx);
        rx
    }

    /// Discover the resource directory with one short-lived session,
    /// retrying while the list renders. Exhausting every attempt yields
    /// `ExtractionError::ResourceDiscoveryFailed` - a reported,
    /// recoverable condition the pipeline degrades on, not a fatal one.
    pub async fn discover_resources(&self, credentials: &Credentials) -> Result<Vec<Resource>> {
        let mut session = self.portal.open_session(credentials).await?;
        let mut resources = Vec::new();
        for attempt in 1..=self.config.discovery_attempts {
            match session.discover_resources().await {
                Ok(found) if !found.is_empty() => {
                    resources = found;
                    break;
                }
                Ok(_) => debug!(attempt, "resource list not rendered yet"),
                Err(e) => debug!(attempt, error = %e, "resource discovery pass failed"),
            }
            if attempt < self.config.discovery_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.discovery_backoff_ms)).await;
            }
        }
        if let Err(e) = session.close().await {
            debug!(error = %e, "discovery session close failed");
        }

        if resources.is_empty() {
            return Err(ExtractionError::ResourceDiscoveryFailed(format!(
                "list still empty after {} attempts via '{}' backend",
                self.config.discovery_attempts,
                self.portal.id()
            ))
            .into());
        }
        info!(
            backend = self.portal.id(),
            count = resources.len(),
            "resource directory resolved"
        );
        Ok(resources)
    }

    /// Extract every resource over the window and return the union of
    /// all records. Waits for every worker - there is no partial
    /// short-circuit - and aborts only when a worker's session could
    /// not authenticate at all.
    pub async fn extract_window(
        &self,
        credentials: &Credentials,
        resources: &[Resource],
        window: ExtractionWindow,
    ) -> Result<Vec<SlotRecord>> {
        info!(
            backend = self.portal.id(),
            resources = resources.len(),
            %window,
            "starting parallel extraction"
        );

        let mut handles = Vec::with_capacity(resources.len());
        for resource in resources {
            let portal = Arc::clone(&self.portal);
            let credentials = credentials.clone();
            let resource = resource.clone();
            let config = self.config.clone();
            let tx = self.progress_tx.clone();
            handles.push(tokio::spawn(async move {
                run_worker(portal, credentials, resource, window, config, tx).await
            }));
        }

        let mut records = Vec::new();
        let mut auth_failure: Option<QuadraError> = None;
        for handle in handles {
            match handle.await {
                Ok(WorkerOutcome::Records(mut collected)) => records.append(&mut collected),
                Ok(WorkerOutcome::AuthRejected(e)) => auth_failure = Some(e),
                Err(e) => warn!(error = %e, "extraction worker panicked"),
            }
        }
        if let Some(e) = auth_failure {
            return Err(e);
        }

        info!(records = records.len(), "extraction joined");
        Ok(records)
    }
}

enum WorkerOutcome {
    Records(Vec<SlotRecord>),
    AuthRejected(QuadraError),
}

async fn run_worker(
    portal: Arc<dyn Portal>,
    credentials: Credentials,
    resource: Resource,
    window: ExtractionWindow,
    config: ExtractionConfig,
    tx: Option<mpsc::UnboundedSender<ExtractProgress>>,
) -> WorkerOutcome {
    let label = resource.label.clone();

    let mut session = match portal.open_session(&credentials).await {
        Ok(session) => session,
        Err(e) if e.is_authentication() => {
            report(
                &tx,
                ExtractProgress::ResourceFailed {
                    resource: label,
                    error: e.to_string(),
                },
            );
            return WorkerOutcome::AuthRejected(e);
        }
        Err(e) => {
            report(
                &tx,
                ExtractProgress::ResourceFailed {
                    resource: label,
                    error: e.to_string(),
                },
            );
            return WorkerOutcome::Records(Vec::new());
        }
    };

    let budget = Duration::from_secs(config.worker_timeout_secs);
    let outcome = match tokio::time::timeout(
        budget,
        extract_resource(session.as_mut(), &resource, window, &tx),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ExtractionError::Timeout {
            resource: label.clone(),
            seconds: config.worker_timeout_secs,
        }
        .into()),
    };

    let records = match outcome {
        Ok(records) => {
            report(
                &tx,
                ExtractProgress::ResourceComplete {
                    resource: label.clone(),
                    records: records.len(),
                },
            );
            records
        }
        Err(QuadraError::Extraction(ExtractionError::Timeout { seconds, .. })) => {
            report(
                &tx,
                ExtractProgress::ResourceTimeout {
                    resource: label.clone(),
                    seconds,
                },
            );
            Vec::new()
        }
        Err(e) => {
            report(
                &tx,
                ExtractProgress::ResourceFailed {
                    resource: label.clone(),
                    error: e.to_string(),
                },
            );
            Vec::new()
        }
    };

    // Session resources are released on every path, including after an
    // abandoned (timed out) extraction.
    if let Err(e) = session.close().await {
        debug!(resource = %label, error = %e, "session close failed");
    }
    WorkerOutcome::Records(records)
}

async fn extract_resource(
    session: &mut dyn PortalSession,
    resource: &Resource,
    window: ExtractionWindow,
    tx: &Option<mpsc::UnboundedSender<ExtractProgress>>,
) -> Result<Vec<SlotRecord>> {
    session.select_resource(resource).await?;
    report(
        tx,
        ExtractProgress::SessionOpened {
            resource: resource.label.clone(),
        },
    );

    let mut records = Vec::new();
    for date in window.days() {
        match session.read_day(resource, date).await {
            Ok(day_records) => {
                report(
                    tx,
                    ExtractProgress::DayExtracted {
                        resource: resource.label.clone(),
                        date,
                        records: day_records.len(),
                    },
                );
                records.extend(day_records);
            }
            // Per-date degradation: an unreadable date is skipped, the
            // rest of the window still gets read.
            Err(e) => warn!(resource = %resource.label, %date, error = %e, "skipping date"),
        }
    }
    Ok(records)
}

/// Resolve the directory, letting only authentication abort: a failed
/// discovery degrades to an empty directory and, downstream, to the
/// explicit no-data document.
async fn discover_or_empty(
    coordinator: &ExtractionCoordinator,
    credentials: &Credentials,
) -> Result<Vec<Resource>> {
    match coordinator.discover_resources(credentials).await {
        Ok(resources) => Ok(resources),
        Err(e) if e.is_authentication() => Err(e),
        Err(e) => {
            warn!(error = %e, "proceeding with an empty resource directory");
            Ok(Vec::new())
        }
    }
}

/// Run the full pipeline and render the complete availability grid.
pub async fn extract_full(
    portal: Arc<dyn Portal>,
    credentials: &Credentials,
    window: ExtractionWindow,
    config: &Config,
) -> Result<MatrixDocument> {
    let coordinator = ExtractionCoordinator::new(portal, config.extraction.clone());
    let resources = discover_or_empty(&coordinator, credentials).await?;
    let records = coordinator
        .extract_window(credentials, &resources, window)
        .await?;
    let outcome = matrix::build(&records, &resources);
    Ok(matrix::render_document(&outcome, &resources, window))
}

/// Run the same pipeline and project it down to available slots only,
/// sorted by `(date, time, resource)`.
pub async fn extract_available_only(
    portal: Arc<dyn Portal>,
    credentials: &Credentials,
    window: ExtractionWindow,
    config: &Config,
) -> Result<Vec<AvailableSlot>> {
    let coordinator = ExtractionCoordinator::new(portal, config.extraction.clone());
    let resources = discover_or_empty(&coordinator, credentials).await?;
    let records = coordinator
        .extract_window(credentials, &resources, window)
        .await?;

    // Whole-day rows with a reserve affordance are legitimate hits
    // (day-granularity resources book as a single "Integral" slot), so
    // the projection filters on status alone.
    let mut slots: Vec<AvailableSlot> = records
        .iter()
        .filter(|r| r.status == crate::records::SlotStatus::Available)
        .filter_map(|r| {
            resources
                .iter()
                .find(|res| res.ordinal == r.resource_ordinal)
                .map(|res| AvailableSlot {
                    date: r.date,
                    time_label: r.time_label.clone(),
                    resource_label: res.label.clone(),
                })
        })
        .collect();
    slots.sort();
    slots.dedup();
    Ok(slots)
}
