//! Domain primitive types used across the harness workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a container, as returned by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first twelve characters, the way `docker ps` prints ids.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named volume created by the harness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volume {
    /// Identifier returned by the runtime.
    pub id: String,
    /// Human-readable name used in mount specifications.
    pub name: String,
}

impl Volume {
    /// Generates a unique volume name from a prefix such as `qmsharedlogs`.
    ///
    /// Scenarios may run in parallel, so fixed names would collide.
    #[must_use]
    pub fn unique_name(prefix: &str) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{prefix}-{}", &suffix[..8])
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A volume mounted into a container at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Name of the volume to mount.
    pub volume: String,
    /// Absolute path inside the container.
    pub target: String,
}

impl Mount {
    /// Creates a mount of `volume` at `target`.
    #[must_use]
    pub fn new(volume: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            target: target.into(),
        }
    }

    /// Renders the mount in `docker run --volume` syntax.
    #[must_use]
    pub fn to_bind(&self) -> String {
        format!("{}:{}", self.volume, self.target)
    }
}

/// Run state of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// The main process is running.
    Running,
    /// The main process has exited.
    Exited,
    /// The runtime reported something the harness does not model.
    Other,
}

impl ContainerState {
    /// Maps the `State.Status` string used by Docker.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status {
            "created" => Self::Created,
            "running" => Self::Running,
            "exited" | "dead" => Self::Exited,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Queue manager status as reported by `dspmq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueManagerStatus {
    /// Active instance serving requests.
    Running,
    /// Standby instance ready to take over.
    Standby,
    /// Active elsewhere; this host only sees the shared files.
    RunningElsewhere,
    /// Still initialising.
    Starting,
    /// Shutting down after outstanding work.
    Quiescing,
    /// Shutting down (immediately or pre-emptively).
    Ending,
    /// Not running (normally, immediately, pre-emptively or unexpectedly).
    Ended,
    /// `dspmq` could not determine a status.
    NotAvailable,
    /// Any other text, kept verbatim.
    Unknown(String),
}

impl QueueManagerStatus {
    /// Classifies the text found inside `STATUS(...)`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            "Running" => Self::Running,
            "Running as standby" => Self::Standby,
            "Running elsewhere" => Self::RunningElsewhere,
            "Starting" => Self::Starting,
            "Quiescing" => Self::Quiescing,
            "Status not available" => Self::NotAvailable,
            t if t.starts_with("Ending") => Self::Ending,
            t if t.starts_with("Ended") => Self::Ended,
            t => Self::Unknown(t.to_string()),
        }
    }

    /// Whether this is the active instance of a pair.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for QueueManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Standby => write!(f, "Running as standby"),
            Self::RunningElsewhere => write!(f, "Running elsewhere"),
            Self::Starting => write!(f, "Starting"),
            Self::Quiescing => write!(f, "Quiescing"),
            Self::Ending => write!(f, "Ending"),
            Self::Ended => write!(f, "Ended"),
            Self::NotAvailable => write!(f, "Status not available"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}
