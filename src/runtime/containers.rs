//! Container helpers used by the suites.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{
    sanitize_exec_output, ContainerDetails, ContainerRuntime, ExecRequest, LabelFilter,
    RemoveOptions, RuntimeError,
};
use crate::config::{HarnessSettings, DEFAULT_NETWORK_NAME, DEFAULT_SERVICE_OWNER};
use crate::retry::{Outcome, PolicyError, RetryExecutor, RetryPolicy, TracingObserver};

/// Label every harness container carries with the owning suite.
pub const SERVICE_OWNER_LABEL: &str = "service.owner";
/// Label carrying the service name of a harness container.
pub const SERVICE_NAME_LABEL: &str = "service.container.name";

/// Thin, logged wrappers over a [`ContainerRuntime`].
///
/// # Example
///
/// ```rust,ignore
/// use fleet_harness::runtime::Containers;
///
/// let containers = Containers::new(my_runtime);
/// let version = containers
///     .exec_in("fleet-server", "root", &["elastic-agent", "version", "--binary-only"])
///     .await?;
/// containers.tag_image("agent:snapshot", "agent:latest", None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Containers<R> {
    runtime: R,
    network_name: String,
    service_owner: String,
    tag_policy: RetryPolicy,
}

impl<R: ContainerRuntime> Containers<R> {
    /// Wrap `runtime` with the default network, owner label and tag policy.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            service_owner: DEFAULT_SERVICE_OWNER.to_string(),
            tag_policy: RetryPolicy::image_tag(),
        }
    }

    /// Wrap `runtime` using `settings`, validating the tag retry policy.
    pub fn from_settings(runtime: R, settings: HarnessSettings) -> Result<Self, PolicyError> {
        Ok(Self {
            runtime,
            network_name: settings.network_name,
            service_owner: settings.service_owner,
            tag_policy: RetryPolicy::try_from(settings.tag_retry)?,
        })
    }

    /// Replace the policy used by [`tag_image`](Self::tag_image).
    pub fn with_tag_policy(mut self, policy: RetryPolicy) -> Self {
        self.tag_policy = policy;
        self
    }

    /// The wrapped runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The private network name.
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// The policy used when tagging images.
    pub fn tag_policy(&self) -> &RetryPolicy {
        &self.tag_policy
    }

    /// Run `cmd` as `user` inside `container` and return its sanitized output.
    pub async fn exec_in(
        &self,
        container: &str,
        user: &str,
        cmd: &[&str],
    ) -> Result<String, RuntimeError> {
        self.exec_in_with_env(container, user, cmd, &[]).await
    }

    /// Like [`exec_in`](Self::exec_in), with extra `KEY=value` environment.
    pub async fn exec_in_with_env(
        &self,
        container: &str,
        user: &str,
        cmd: &[&str],
        env: &[&str],
    ) -> Result<String, RuntimeError> {
        let request = ExecRequest::new(container, user, cmd.iter().copied())
            .with_env(env.iter().copied());

        tracing::trace!(
            container,
            command = ?request.cmd,
            env = ?request.env,
            detach = request.detach,
            tty = request.tty,
            "executing command in container"
        );

        let raw = match self.runtime.exec(&request).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(
                    container,
                    command = ?request.cmd,
                    %error,
                    "could not execute command in container"
                );
                return Err(error);
            }
        };

        tracing::trace!(container, command = ?request.cmd, "command executed in container");
        Ok(sanitize_exec_output(&raw))
    }

    /// Inspect the harness container running service `name`.
    ///
    /// The container is found by its owner and service-name labels; stopped
    /// containers are included.
    pub async fn inspect_service(&self, name: &str) -> Result<ContainerDetails, RuntimeError> {
        let filters = [
            LabelFilter::new(SERVICE_OWNER_LABEL, self.service_owner.as_str()),
            LabelFilter::new(SERVICE_NAME_LABEL, name),
        ];

        let containers = self.runtime.list_containers(&filters).await.map_err(|error| {
            tracing::warn!(service = name, %error, "cannot list containers");
            error
        })?;

        let first = containers
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::ContainerNotFound {
                name: name.to_string(),
            })?;

        self.runtime.inspect(&first.id).await
    }

    /// Force-remove a container together with its volumes.
    pub async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let options = RemoveOptions {
            force: true,
            remove_volumes: true,
        };

        if let Err(error) = self.runtime.remove(name, options).await {
            tracing::warn!(service = name, %error, "service could not be removed");
            return Err(error);
        }

        tracing::info!(service = name, "service has been removed");
        Ok(())
    }

    /// Load an image archive from disk.
    pub async fn load_image(&self, archive: impl AsRef<Path>) -> Result<(), RuntimeError> {
        let archive = archive.as_ref();
        let path = std::path::absolute(archive).map_err(|source| {
            RuntimeError::ImageArchiveMissing {
                path: archive.to_path_buf(),
                source,
            }
        })?;

        if let Err(source) = tokio::fs::metadata(&path).await {
            return Err(RuntimeError::ImageArchiveMissing { path, source });
        }

        if let Err(error) = self.runtime.load_image(&path).await {
            tracing::error!(image = %path.display(), %error, "could not load the image");
            return Err(error);
        }

        tracing::debug!(image = %path.display(), "image loaded");
        Ok(())
    }

    /// Tag `src` as `target`, retrying while the engine catches up.
    ///
    /// Engine errors are retried under the tag policy; any other error fails
    /// immediately.
    pub async fn tag_image(
        &self,
        src: &str,
        target: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), RuntimeError> {
        let runtime = &self.runtime;
        let executor = RetryExecutor::new().with_observer(TracingObserver::new("tag_image"));

        let outcome = executor
            .run_if(
                move || runtime.tag_image(src, target),
                &self.tag_policy,
                cancel,
                RuntimeError::is_retryable,
            )
            .await;

        match outcome {
            Outcome::Success(()) => {
                tracing::debug!(source_image = src, target_image = target, "image tagged");
                Ok(())
            }
            Outcome::Exhausted(exhausted) => Err(RuntimeError::TagRetriesExhausted {
                src: src.to_string(),
                target: target.to_string(),
                attempts: exhausted.attempts,
                elapsed: exhausted.total_duration,
                last: Box::new(exhausted.final_error),
            }),
            Outcome::Failure(failure) if failure.is_cancelled() => Err(RuntimeError::Cancelled {
                operation: "tag_image",
                attempts: failure.attempts,
                elapsed: failure.elapsed,
                last: Some(Box::new(failure.error)),
            }),
            Outcome::Failure(failure) => Err(failure.into_error()),
            Outcome::CancelledNoAttempt => Err(RuntimeError::Cancelled {
                operation: "tag_image",
                attempts: 0,
                elapsed: Duration::ZERO,
                last: None,
            }),
        }
    }

    /// Remove the harness's private network.
    pub async fn remove_network(&self) -> Result<(), RuntimeError> {
        tracing::trace!(network = %self.network_name, "removing network");
        self.runtime.remove_network(&self.network_name).await?;
        tracing::trace!(network = %self.network_name, "network has been removed");
        Ok(())
    }
}
