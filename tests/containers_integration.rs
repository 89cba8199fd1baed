//! Integration tests for the container helpers against an in-memory runtime.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_harness::config::{HarnessSettings, RetryConfig};
use fleet_harness::runtime::{
    ContainerDetails, ContainerRuntime, ContainerSummary, Containers, ExecRequest, LabelFilter,
    RemoveOptions, RuntimeError,
};
use fleet_harness::RetryPolicy;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fake runtime
// ============================================================================

#[derive(Debug, Default)]
struct FakeRuntime {
    exec_output: String,
    containers: Vec<ContainerSummary>,
    details: BTreeMap<String, ContainerDetails>,
    tag_failures: u32,
    tag_missing_image: bool,
    tag_calls: AtomicU32,
    exec_requests: Mutex<Vec<ExecRequest>>,
    removed: Mutex<Vec<(String, RemoveOptions)>>,
    loaded: Mutex<Vec<PathBuf>>,
    removed_networks: Mutex<Vec<String>>,
}

impl FakeRuntime {
    fn with_service(mut self, id: &str, owner: &str, service: &str) -> Self {
        let labels = BTreeMap::from([
            ("service.owner".to_string(), owner.to_string()),
            ("service.container.name".to_string(), service.to_string()),
        ]);
        self.containers.push(ContainerSummary {
            id: id.to_string(),
            names: vec![format!("/{service}")],
            labels,
        });
        self.details.insert(
            id.to_string(),
            ContainerDetails {
                id: id.to_string(),
                name: service.to_string(),
                image: "docker.elastic.co/beats/elastic-agent:8.0.0".to_string(),
                running: true,
                status: "running".to_string(),
                networks: BTreeMap::from([(
                    "elastic-dev-network".to_string(),
                    "172.18.0.4".to_string(),
                )]),
            },
        );
        self
    }

    fn tag_calls(&self) -> u32 {
        self.tag_calls.load(Ordering::SeqCst)
    }
}

impl ContainerRuntime for FakeRuntime {
    fn exec<'a>(&'a self, request: &'a ExecRequest) -> BoxFuture<'a, Result<String, RuntimeError>> {
        Box::pin(async move {
            self.exec_requests.lock().unwrap().push(request.clone());
            if request.container == "missing" {
                return Err(RuntimeError::engine("exec create", "no such container"));
            }
            Ok(self.exec_output.clone())
        })
    }

    fn list_containers<'a>(
        &'a self,
        filters: &'a [LabelFilter],
    ) -> BoxFuture<'a, Result<Vec<ContainerSummary>, RuntimeError>> {
        Box::pin(async move {
            Ok(self
                .containers
                .iter()
                .filter(|c| filters.iter().all(|f| f.matches(&c.labels)))
                .cloned()
                .collect())
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>> {
        Box::pin(async move {
            self.details
                .get(id)
                .cloned()
                .ok_or_else(|| RuntimeError::engine("inspect", format!("no such container {id}")))
        })
    }

    fn remove<'a>(
        &'a self,
        name: &'a str,
        options: RemoveOptions,
    ) -> BoxFuture<'a, Result<(), RuntimeError>> {
        Box::pin(async move {
            if name == "ghost" {
                return Err(RuntimeError::engine("remove", "no such container"));
            }
            self.removed.lock().unwrap().push((name.to_string(), options));
            Ok(())
        })
    }

    fn load_image<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), RuntimeError>> {
        Box::pin(async move {
            self.loaded.lock().unwrap().push(archive.to_path_buf());
            Ok(())
        })
    }

    fn tag_image<'a>(
        &'a self,
        src: &'a str,
        _target: &'a str,
    ) -> BoxFuture<'a, Result<(), RuntimeError>> {
        Box::pin(async move {
            let n = self.tag_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.tag_missing_image {
                return Err(RuntimeError::ContainerNotFound {
                    name: src.to_string(),
                });
            }
            if n <= self.tag_failures {
                return Err(RuntimeError::engine("image tag", "image not ready"));
            }
            Ok(())
        })
    }

    fn remove_network<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), RuntimeError>> {
        Box::pin(async move {
            self.removed_networks.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }
}

fn temp_file_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fleet_harness_image_{}.tar.gz", name))
}

// ============================================================================
// exec
// ============================================================================

#[tokio::test]
async fn exec_returns_sanitized_output() {
    let runtime = FakeRuntime {
        exec_output: "\x01\x00\x00\x00\x00\x00\x00)8.0.0-SNAPSHOT\n".to_string(),
        ..FakeRuntime::default()
    };
    let containers = Containers::new(runtime);

    let output = containers
        .exec_in_with_env(
            "fleet-server",
            "root",
            &["elastic-agent", "version", "--binary-only"],
            &["DEBUG=1"],
        )
        .await
        .unwrap();

    assert_eq!(output, "8.0.0-SNAPSHOT");
    let requests = containers.runtime().exec_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].container, "fleet-server");
    assert_eq!(requests[0].user, "root");
    assert_eq!(requests[0].cmd, ["elastic-agent", "version", "--binary-only"]);
    assert_eq!(requests[0].env, ["DEBUG=1"]);
    assert!(!requests[0].tty);
}

#[tokio::test]
async fn exec_propagates_engine_errors() {
    let containers = Containers::new(FakeRuntime::default());

    let error = containers
        .exec_in("missing", "root", &["true"])
        .await
        .unwrap_err();

    assert!(matches!(error, RuntimeError::Engine { .. }));
}

// ============================================================================
// inspect / remove
// ============================================================================

#[tokio::test]
async fn inspect_service_filters_by_owner_and_name() {
    let runtime = FakeRuntime::default()
        .with_service("aaa", "someone-else", "kibana")
        .with_service("bbb", "co.elastic.observability", "kibana")
        .with_service("ccc", "co.elastic.observability", "elasticsearch");
    let containers = Containers::new(runtime);

    let details = containers.inspect_service("kibana").await.unwrap();

    assert_eq!(details.id, "bbb");
    assert!(details.running);
    assert_eq!(
        details.networks.get("elastic-dev-network").map(String::as_str),
        Some("172.18.0.4")
    );
}

#[tokio::test]
async fn inspect_service_reports_missing_container() {
    let containers = Containers::new(FakeRuntime::default());

    let error = containers.inspect_service("fleet-server").await.unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::ContainerNotFound { ref name } if name == "fleet-server"
    ));
}

#[tokio::test]
async fn remove_container_forces_and_drops_volumes() {
    let containers = Containers::new(FakeRuntime::default());

    containers.remove_container("elastic-agent").await.unwrap();
    assert!(containers.remove_container("ghost").await.is_err());

    let removed = containers.runtime().removed.lock().unwrap().clone();
    assert_eq!(
        removed,
        vec![(
            "elastic-agent".to_string(),
            RemoveOptions {
                force: true,
                remove_volumes: true
            }
        )]
    );
}

// ============================================================================
// images
// ============================================================================

#[tokio::test]
async fn load_image_rejects_missing_archive() {
    let containers = Containers::new(FakeRuntime::default());
    let path = temp_file_path("does_not_exist");

    let error = containers.load_image(&path).await.unwrap_err();

    assert!(matches!(error, RuntimeError::ImageArchiveMissing { .. }));
    assert!(containers.runtime().loaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn load_image_passes_absolute_path() {
    let path = temp_file_path("present");
    tokio::fs::write(&path, b"not really gzip").await.unwrap();
    let containers = Containers::new(FakeRuntime::default());

    containers.load_image(&path).await.unwrap();

    let loaded = containers.runtime().loaded.lock().unwrap().clone();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].is_absolute());
    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn tag_image_retries_until_engine_is_ready() {
    let runtime = FakeRuntime {
        tag_failures: 2,
        ..FakeRuntime::default()
    };
    let containers = Containers::new(runtime);

    containers
        .tag_image("elastic-agent:snapshot", "elastic-agent:latest", None)
        .await
        .unwrap();

    assert_eq!(containers.runtime().tag_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn tag_image_gives_up_after_budget() {
    let runtime = FakeRuntime {
        tag_failures: u32::MAX,
        ..FakeRuntime::default()
    };
    let policy = RetryPolicy::exponential(Duration::from_millis(500))
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Duration::from_secs(15));
    let containers = Containers::new(runtime).with_tag_policy(policy);

    let error = containers
        .tag_image("elastic-agent:snapshot", "elastic-agent:latest", None)
        .await
        .unwrap_err();

    match error {
        RuntimeError::TagRetriesExhausted {
            attempts,
            elapsed,
            last,
            ..
        } => {
            assert_eq!(attempts, 7);
            assert_eq!(elapsed, Duration::from_millis(17_500));
            assert!(last.is_retryable());
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(containers.runtime().tag_calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn tag_image_does_not_retry_permanent_errors() {
    let runtime = FakeRuntime {
        tag_missing_image: true,
        ..FakeRuntime::default()
    };
    let containers = Containers::new(runtime);

    let error = containers
        .tag_image("nope:1", "nope:2", None)
        .await
        .unwrap_err();

    assert!(matches!(error, RuntimeError::ContainerNotFound { .. }));
    assert_eq!(containers.runtime().tag_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn tag_image_honours_cancellation() {
    let containers = Containers::new(FakeRuntime {
        tag_failures: u32::MAX,
        ..FakeRuntime::default()
    });
    let token = CancellationToken::new();
    token.cancel();

    let error = containers
        .tag_image("a:1", "a:2", Some(&token))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        RuntimeError::Cancelled {
            operation: "tag_image",
            attempts: 0,
            last: None,
            ..
        }
    ));
    assert!(error.source().is_none());
    assert_eq!(containers.runtime().tag_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn tag_image_cancelled_mid_wait_keeps_last_engine_error() {
    let policy = RetryPolicy::exponential(Duration::from_millis(500))
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(Duration::from_secs(15));
    let containers = Containers::new(FakeRuntime {
        tag_failures: u32::MAX,
        ..FakeRuntime::default()
    })
    .with_tag_policy(policy);
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let error = containers
        .tag_image("a:1", "a:2", Some(&token))
        .await
        .unwrap_err();
    canceller.await.unwrap();

    match &error {
        RuntimeError::Cancelled {
            attempts,
            elapsed,
            last: Some(last),
            ..
        } => {
            assert_eq!(*attempts, 1);
            assert_eq!(*elapsed, Duration::from_millis(100));
            assert!(matches!(
                **last,
                RuntimeError::Engine {
                    operation: "image tag",
                    ..
                }
            ));
        }
        other => panic!("expected cancellation with last error, got {other:?}"),
    }
    let source = error.source().map(ToString::to_string).unwrap_or_default();
    assert_eq!(source, "image tag failed: image not ready");
    assert_eq!(containers.runtime().tag_calls(), 1);
}

// ============================================================================
// networks and settings
// ============================================================================

#[tokio::test]
async fn remove_network_uses_configured_name() {
    let settings = HarnessSettings {
        network_name: "custom-net".to_string(),
        ..HarnessSettings::default()
    };
    let containers = Containers::from_settings(FakeRuntime::default(), settings).unwrap();

    containers.remove_network().await.unwrap();

    assert_eq!(
        containers.runtime().removed_networks.lock().unwrap().clone(),
        vec!["custom-net".to_string()]
    );
}

#[test]
fn from_settings_rejects_invalid_policy() {
    let settings = HarnessSettings {
        tag_retry: RetryConfig {
            randomization_factor: 1.5,
            ..RetryConfig::default()
        },
        ..HarnessSettings::default()
    };

    assert!(Containers::from_settings(FakeRuntime::default(), settings).is_err());
}

#[tokio::test(start_paused = true)]
async fn works_behind_a_trait_object() {
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(FakeRuntime {
        tag_failures: 1,
        ..FakeRuntime::default()
    });
    let containers = Containers::new(Arc::clone(&runtime));

    containers.tag_image("a:1", "a:2", None).await.unwrap();
    assert_eq!(containers.network_name(), "elastic-dev-network");
}
