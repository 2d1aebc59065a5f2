//! End-to-end pipeline tests over a scripted in-memory portal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use quadra::{
    extract_available_only, extract_full, Config, Credentials, ExtractionWindow, Portal,
    PortalSession, QuadraError, Resource, Result, SessionError, SlotRecord, SlotStatus,
};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("maria", "segredo")
}

/// Config tuned so failing paths resolve quickly under test.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.extraction.worker_timeout_secs = 1;
    config.extraction.discovery_attempts = 2;
    config.extraction.discovery_backoff_ms = 5;
    config
}

/// What a scripted session does for one resource.
#[derive(Clone, Default)]
struct ResourceScript {
    /// Records returned per date.
    days: HashMap<NaiveDate, Vec<(String, SlotStatus)>>,
    /// Sleep this long inside every read, to trip the worker budget.
    stall: Option<Duration>,
}

/// Scripted portal: resources and their day-by-day tables.
#[derive(Default)]
struct FakePortal {
    labels: Vec<&'static str>,
    scripts: HashMap<usize, ResourceScript>,
    reject_credentials: bool,
}

impl FakePortal {
    fn resources(&self) -> Vec<Resource> {
        self.labels
            .iter()
            .enumerate()
            .map(|(ordinal, label)| Resource {
                ordinal,
                label: label.to_string(),
                stable_key: Some(ordinal as u32 + 1),
                position: ordinal,
            })
            .collect()
    }
}

#[async_trait]
impl Portal for FakePortal {
    fn id(&self) -> &str {
        "fake"
    }

    async fn open_session(&self, _credentials: &Credentials) -> Result<Box<dyn PortalSession>> {
        if self.reject_credentials {
            return Err(SessionError::Authentication("senha inválida".to_string()).into());
        }
        Ok(Box::new(FakeSession {
            resources: self.resources(),
            scripts: self.scripts.clone(),
        }))
    }
}

struct FakeSession {
    resources: Vec<Resource>,
    scripts: HashMap<usize, ResourceScript>,
}

#[async_trait]
impl PortalSession for FakeSession {
    async fn discover_resources(&mut self) -> Result<Vec<Resource>> {
        Ok(self.resources.clone())
    }

    async fn select_resource(&mut self, _resource: &Resource) -> Result<()> {
        Ok(())
    }

    async fn read_day(&mut self, resource: &Resource, date: NaiveDate) -> Result<Vec<SlotRecord>> {
        let script = self.scripts.get(&resource.ordinal).cloned().unwrap_or_default();
        if let Some(stall) = script.stall {
            tokio::time::sleep(stall).await;
        }
        let slots = script.days.get(&date).cloned().unwrap_or_default();
        Ok(slots
            .into_iter()
            .map(|(time_label, status)| SlotRecord {
                date,
                resource_ordinal: resource.ordinal,
                time_label,
                status,
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn slot(label: &str, status: SlotStatus) -> (String, SlotStatus) {
    (label.to_string(), status)
}

/// Window 2024-05-01..2024-05-02, two courts. Quadra 1 has one
/// available and one unavailable slot on the first day; Quadra 2 never
/// returns a row.
fn two_court_portal() -> FakePortal {
    let mut scripts = HashMap::new();
    scripts.insert(
        0,
        ResourceScript {
            days: HashMap::from([(
                date(1),
                vec![
                    slot("06:00", SlotStatus::Available),
                    slot("07:00", SlotStatus::Unavailable),
                ],
            )]),
            stall: None,
        },
    );
    FakePortal {
        labels: vec!["Quadra 1", "Quadra 2"],
        scripts,
        reject_credentials: false,
    }
}

#[tokio::test]
async fn test_end_to_end_two_courts() {
    let portal = Arc::new(two_court_portal());
    let window = ExtractionWindow::new(date(1), date(2));

    let document = extract_full(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    assert!(!document.no_data);
    assert_eq!(document.resources, vec!["Quadra 1", "Quadra 2"]);
    // Two time labels on one date, no whole-day expansion: two rows.
    assert_eq!(document.row_count, 2);
    assert_eq!(document.record_count, 2);
    // The available slot is visually distinguished from the
    // unavailable one, and Quadra 2's blank cells render unavailable.
    assert!(document.html.contains("class='ok'"));
    assert!(document.html.contains("class='blk'"));
    assert!(document.html.contains("Quadra 2"));
}

#[tokio::test]
async fn test_failure_isolation_on_worker_timeout() {
    let mut portal = two_court_portal();
    // Quadra 2 stalls past the 1s worker budget on every read.
    portal.scripts.insert(
        1,
        ResourceScript {
            days: HashMap::from([(date(1), vec![slot("06:00", SlotStatus::Available)])]),
            stall: Some(Duration::from_secs(5)),
        },
    );
    let portal = Arc::new(portal);
    let window = ExtractionWindow::new(date(1), date(2));

    let slots = extract_available_only(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    // Quadra 1's records survive untouched; Quadra 2 contributed zero.
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].resource_label, "Quadra 1");
    assert_eq!(slots[0].time_label, "06:00");
}

#[tokio::test]
async fn test_available_only_is_sorted() {
    let mut scripts = HashMap::new();
    scripts.insert(
        0,
        ResourceScript {
            days: HashMap::from([
                (date(2), vec![slot("07:00", SlotStatus::Available)]),
                (date(1), vec![slot("09:00", SlotStatus::Available)]),
            ]),
            stall: None,
        },
    );
    scripts.insert(
        1,
        ResourceScript {
            days: HashMap::from([(date(1), vec![slot("06:00", SlotStatus::Available)])]),
            stall: None,
        },
    );
    let portal = Arc::new(FakePortal {
        labels: vec!["Quadra 1", "Quadra 2"],
        scripts,
        reject_credentials: false,
    });
    let window = ExtractionWindow::new(date(1), date(2));

    let slots = extract_available_only(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    let order: Vec<_> = slots
        .iter()
        .map(|s| (s.date, s.time_label.as_str(), s.resource_label.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (date(1), "06:00", "Quadra 2"),
            (date(1), "09:00", "Quadra 1"),
            (date(2), "07:00", "Quadra 1"),
        ]
    );
}

#[tokio::test]
async fn test_whole_day_marker_expands_in_full_pipeline() {
    let mut scripts = HashMap::new();
    scripts.insert(
        0,
        ResourceScript {
            days: HashMap::from([(
                date(1),
                vec![
                    slot("06:00", SlotStatus::Available),
                    slot("07:00", SlotStatus::Available),
                ],
            )]),
            stall: None,
        },
    );
    scripts.insert(
        1,
        ResourceScript {
            days: HashMap::from([(date(1), vec![slot("Integral", SlotStatus::Unavailable)])]),
            stall: None,
        },
    );
    let portal = Arc::new(FakePortal {
        labels: vec!["Quadra 1", "Quadra 2"],
        scripts,
        reject_credentials: false,
    });
    let window = ExtractionWindow::new(date(1), date(1));

    let document = extract_full(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    // Two slot rows plus the day-boundary header for the expanded date.
    assert_eq!(document.row_count, 3);
    assert!(document.html.contains("class='day-header'"));
}

#[tokio::test]
async fn test_empty_run_renders_no_data_document() {
    let portal = Arc::new(FakePortal {
        labels: vec!["Quadra 1"],
        scripts: HashMap::new(),
        reject_credentials: false,
    });
    let window = ExtractionWindow::new(date(1), date(2));

    let document = extract_full(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    assert!(document.no_data);
    assert!(document.html.contains("Nenhum dado coletado"));
}

#[tokio::test]
async fn test_failed_discovery_degrades_to_no_data() {
    // The portal never renders a single matching resource; discovery
    // exhausts its attempts and the run still produces a document.
    let portal = Arc::new(FakePortal {
        labels: vec![],
        scripts: HashMap::new(),
        reject_credentials: false,
    });
    let window = ExtractionWindow::new(date(1), date(2));

    let document = extract_full(portal, &credentials(), window, &fast_config())
        .await
        .unwrap();

    assert!(document.no_data);
    assert!(document.resources.is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_abort_the_run() {
    let portal = Arc::new(FakePortal {
        labels: vec!["Quadra 1"],
        scripts: HashMap::new(),
        reject_credentials: true,
    });
    let window = ExtractionWindow::new(date(1), date(1));

    let result = extract_full(portal, &credentials(), window, &fast_config()).await;
    match result {
        Err(e) => assert!(e.is_authentication()),
        Ok(_) => panic!("authentication rejection must abort the run"),
    }
}

#[tokio::test]
async fn test_read_errors_on_single_dates_degrade_gracefully() {
    /// Session whose second date read always errors.
    struct FlakySession {
        resources: Vec<Resource>,
    }

    #[async_trait]
    impl PortalSession for FlakySession {
        async fn discover_resources(&mut self) -> Result<Vec<Resource>> {
            Ok(self.resources.clone())
        }

        async fn select_resource(&mut self, _resource: &Resource) -> Result<()> {
            Ok(())
        }

        async fn read_day(
            &mut self,
            resource: &Resource,
            date: NaiveDate,
        ) -> Result<Vec<SlotRecord>> {
            if date.day() == 2 {
                return Err(QuadraError::Navigation(
                    quadra::NavigationError::UnparseableHeader("???".to_string()),
                ));
            }
            Ok(vec![SlotRecord {
                date,
                resource_ordinal: resource.ordinal,
                time_label: "06:00".to_string(),
                status: SlotStatus::Available,
            }])
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct FlakyPortal;

    #[async_trait]
    impl Portal for FlakyPortal {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn open_session(&self, _c: &Credentials) -> Result<Box<dyn PortalSession>> {
            Ok(Box::new(FlakySession {
                resources: vec![Resource {
                    ordinal: 0,
                    label: "Quadra 1".to_string(),
                    stable_key: Some(1),
                    position: 0,
                }],
            }))
        }
    }

    let window = ExtractionWindow::new(date(1), date(3));
    let slots = extract_available_only(Arc::new(FlakyPortal), &credentials(), window, &fast_config())
        .await
        .unwrap();

    // Day 2 is skipped; days 1 and 3 still come through.
    let days: Vec<_> = slots.iter().map(|s| s.date.day()).collect();
    assert_eq!(days, vec![1, 3]);
}
