//! Server roles and host selection.
//!
//! Every host in the fleet carries one or more [`Role`]s. Tasks never name
//! hosts directly; they declare a [`Target`] and the [`Topology`] resolves it
//! to the matching hosts in config order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Serves HTTP traffic through the reverse proxy.
    Web,
    /// Runs the supervised application process cluster.
    App,
    /// Hosts the database; the primary receives schema operations.
    Db,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Web => "web",
            Role::App => "app",
            Role::Db => "db",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
    pub roles: Vec<Role>,
    /// Primary host for each of its roles.
    #[serde(default)]
    pub primary: bool,
    /// Host receives no release checkout (e.g. a standalone database box).
    #[serde(default)]
    pub no_release: bool,
}

fn default_port() -> u16 {
    22
}

impl HostSpec {
    pub fn new(host: impl Into<String>, roles: &[Role]) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: default_port(),
            identity_file: None,
            roles: roles.to_vec(),
            primary: false,
            no_release: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn no_release(mut self) -> Self {
        self.no_release = true;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Which hosts a task runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every host that receives releases.
    AllReleaseHosts,
    /// Every host carrying the role.
    Role(Role),
    /// Hosts carrying the role that receive releases.
    ReleaseRole(Role),
    /// The primary host for the role.
    Primary(Role),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::AllReleaseHosts => f.write_str("all release hosts"),
            Target::Role(role) => write!(f, "role '{}'", role),
            Target::ReleaseRole(role) => write!(f, "release hosts with role '{}'", role),
            Target::Primary(role) => write!(f, "primary '{}' host", role),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    hosts: Vec<HostSpec>,
}

impl Topology {
    pub fn new(hosts: Vec<HostSpec>) -> Self {
        Self { hosts }
    }

    pub fn all(&self) -> &[HostSpec] {
        &self.hosts
    }

    /// Resolve a target to hosts, preserving config order.
    ///
    /// A role with no host marked `primary` falls back to its first host.
    pub fn hosts(&self, target: Target) -> Vec<&HostSpec> {
        match target {
            Target::AllReleaseHosts => self.hosts.iter().filter(|h| !h.no_release).collect(),
            Target::Role(role) => self.hosts.iter().filter(|h| h.has_role(role)).collect(),
            Target::ReleaseRole(role) => self
                .hosts
                .iter()
                .filter(|h| h.has_role(role) && !h.no_release)
                .collect(),
            Target::Primary(role) => {
                let with_role: Vec<&HostSpec> =
                    self.hosts.iter().filter(|h| h.has_role(role)).collect();
                let primaries: Vec<&HostSpec> =
                    with_role.iter().copied().filter(|h| h.primary).collect();
                if primaries.is_empty() {
                    with_role.into_iter().take(1).collect()
                } else {
                    primaries
                }
            }
        }
    }

    /// Like [`Topology::hosts`] but an empty match is an error naming the task.
    pub fn require_hosts(&self, target: Target, task: &str) -> Result<Vec<&HostSpec>> {
        let hosts = self.hosts(target);
        if hosts.is_empty() {
            return Err(Error::no_matching_hosts(task, target.to_string()));
        }
        Ok(hosts)
    }
}
