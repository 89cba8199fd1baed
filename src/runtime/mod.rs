//! Container runtime seam.
//!
//! [`ContainerRuntime`] is the narrow set of engine calls the suites need.
//! Implementations wrap a real engine client; tests supply fakes. Nothing in
//! this crate holds a process-wide client: [`Containers`] receives its runtime
//! at construction.

mod containers;
mod output;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;

pub use containers::Containers;
pub use output::sanitize_exec_output;

/// A command to execute inside a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Container name or id.
    pub container: String,
    /// User the command runs as.
    pub user: String,
    /// Command and arguments.
    pub cmd: Vec<String>,
    /// `KEY=value` environment entries.
    pub env: Vec<String>,
    /// Allocate a TTY.
    pub tty: bool,
    /// Return without waiting for output.
    pub detach: bool,
}

impl ExecRequest {
    /// Attached, non-TTY execution with an empty environment.
    pub fn new<I, S>(container: impl Into<String>, user: impl Into<String>, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container: container.into(),
            user: user.into(),
            cmd: cmd.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            tty: false,
            detach: false,
        }
    }

    /// Set the environment.
    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = env.into_iter().map(Into::into).collect();
        self
    }
}

/// A `key=value` label filter for container listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelFilter {
    /// Label key.
    pub key: String,
    /// Expected value.
    pub value: String,
}

impl LabelFilter {
    /// Create a filter.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether `labels` carries this label with the expected value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key) == Some(&self.value)
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// One entry of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerSummary {
    /// Container id.
    pub id: String,
    /// Names the engine knows the container by.
    pub names: Vec<String>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
}

/// Inspection result for a single container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerDetails {
    /// Container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference the container runs.
    pub image: String,
    /// Whether the container is running.
    pub running: bool,
    /// Engine status string, e.g. `running` or `exited`.
    pub status: String,
    /// IP address per attached network.
    pub networks: BTreeMap<String, String>,
}

/// How to remove a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveOptions {
    /// Kill the container first if it is running.
    pub force: bool,
    /// Remove anonymous volumes too.
    pub remove_volumes: bool,
}

/// Errors from the container seam.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The engine rejected or failed a call.
    #[error("{operation} failed: {message}")]
    Engine {
        /// Engine call that failed.
        operation: &'static str,
        /// Engine-provided message.
        message: String,
    },
    /// No container carries the requested service labels.
    #[error("no container found for service {name}")]
    ContainerNotFound {
        /// Service name that was looked up.
        name: String,
    },
    /// An image archive does not exist or cannot be read.
    #[error("image archive {path} is not readable")]
    ImageArchiveMissing {
        /// Path that was resolved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Tagging kept failing until the retry budget ran out.
    #[error("could not tag {src} as {target} after {attempts} attempts ({elapsed:?})")]
    TagRetriesExhausted {
        /// Source image.
        src: String,
        /// Target reference.
        target: String,
        /// Attempts made.
        attempts: u32,
        /// Time spent.
        elapsed: Duration,
        /// Error of the final attempt.
        #[source]
        last: Box<RuntimeError>,
    },
    /// The caller cancelled the operation.
    #[error("{operation} was cancelled after {attempts} attempts ({elapsed:?})")]
    Cancelled {
        /// Operation that was cancelled.
        operation: &'static str,
        /// Attempts made before cancellation; zero if none started.
        attempts: u32,
        /// Time spent before cancellation.
        elapsed: Duration,
        /// Error of the last attempt, if one ran.
        #[source]
        last: Option<Box<RuntimeError>>,
    },
}

impl RuntimeError {
    /// Shorthand for [`RuntimeError::Engine`].
    pub fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            message: message.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only engine errors are transient; lookups and local files do not fix
    /// themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }
}

/// Container engine operations used by the suites.
///
/// Methods return boxed futures so the trait stays object-safe and can be
/// used as `Box<dyn ContainerRuntime>` or `Arc<dyn ContainerRuntime>`.
pub trait ContainerRuntime: Send + Sync {
    /// Run a command in a container and return its raw combined output.
    fn exec<'a>(&'a self, request: &'a ExecRequest) -> BoxFuture<'a, Result<String, RuntimeError>>;

    /// List containers, including stopped ones, carrying every label in
    /// `filters`.
    fn list_containers<'a>(
        &'a self,
        filters: &'a [LabelFilter],
    ) -> BoxFuture<'a, Result<Vec<ContainerSummary>, RuntimeError>>;

    /// Inspect a container by id.
    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>>;

    /// Remove a container.
    fn remove<'a>(
        &'a self,
        name: &'a str,
        options: RemoveOptions,
    ) -> BoxFuture<'a, Result<(), RuntimeError>>;

    /// Load a gzip-compressed image archive into the engine.
    fn load_image<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), RuntimeError>>;

    /// Tag an existing image.
    fn tag_image<'a>(&'a self, src: &'a str, target: &'a str)
        -> BoxFuture<'a, Result<(), RuntimeError>>;

    /// Remove a network by name.
    fn remove_network<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), RuntimeError>>;
}

impl<R: ContainerRuntime + ?Sized> ContainerRuntime for std::sync::Arc<R> {
    fn exec<'a>(&'a self, request: &'a ExecRequest) -> BoxFuture<'a, Result<String, RuntimeError>> {
        (**self).exec(request)
    }

    fn list_containers<'a>(
        &'a self,
        filters: &'a [LabelFilter],
    ) -> BoxFuture<'a, Result<Vec<ContainerSummary>, RuntimeError>> {
        (**self).list_containers(filters)
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ContainerDetails, RuntimeError>> {
        (**self).inspect(id)
    }

    fn remove<'a>(
        &'a self,
        name: &'a str,
        options: RemoveOptions,
    ) -> BoxFuture<'a, Result<(), RuntimeError>> {
        (**self).remove(name, options)
    }

    fn load_image<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), RuntimeError>> {
        (**self).load_image(archive)
    }

    fn tag_image<'a>(
        &'a self,
        src: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, Result<(), RuntimeError>> {
        (**self).tag_image(src, target)
    }

    fn remove_network<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), RuntimeError>> {
        (**self).remove_network(name)
    }
}
