//! Build configuration.

use crate::timing::TimingData;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// When a log automaton propagates its log after local updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelayPolicy {
    /// Propagate after every local update
    #[serde(alias = "N")]
    Nothing,
    /// Propagate once the count of globally observed entries since the last
    /// propagation exceeds the delay amount
    #[serde(alias = "E")]
    EventsEmitted,
    /// Propagate once the count of own entries since the last propagation
    /// exceeds the delay amount
    #[serde(alias = "S")]
    EventsSelfEmitted,
}

/// Scope of the loop iteration counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopBounding {
    /// Every role instance may iterate each loop event `loop_bound` times
    #[default]
    RoleLocal,
    /// All instances together may iterate each loop event `loop_bound` times
    Global,
}

/// Configuration errors, reported once before analysis starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A role owning events has no instance count
    #[error("role '{role}' has no instance count")]
    MissingInstances { role: String },

    /// A role is configured with zero instances
    #[error("role '{role}' is configured with zero instances")]
    ZeroInstances { role: String },

    /// A role has no delay policy
    #[error("role '{role}' has no delay policy")]
    MissingDelayPolicy { role: String },

    /// A delayed role has no delay amount
    #[error("role '{role}' uses a delayed policy but has no delay amount")]
    MissingDelayAmount { role: String },

    /// A role is configured but absent from the protocol
    #[error("role '{role}' is configured but owns no events in the protocol")]
    UnknownRole { role: String },

    /// The log cannot hold any entry
    #[error("log size must be at least 1")]
    ZeroLogSize,

    /// Loops could never be entered
    #[error("loop bound must be at least 1")]
    ZeroLoopBound,
}

fn default_loop_bound() -> u32 {
    2
}

fn default_log_size() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// Settings for one model build.
///
/// Loadable from JSON:
///
/// ```
/// use swarmlog_types::{DelayPolicy, ModelSettings};
///
/// let settings: ModelSettings = serde_json::from_str(r#"{
///     "role_instances": {"Client": 2, "Provider": 1},
///     "delay_policy": {"Client": "E", "Provider": "NOTHING"},
///     "delay_amount": {"Client": 1},
///     "loop_counter": 3
/// }"#).unwrap();
///
/// assert_eq!(settings.loop_bound, 3);
/// assert_eq!(settings.log_size, 20);
/// assert_eq!(settings.delay("Client"), Some(DelayPolicy::EventsEmitted));
/// assert_eq!(settings.total_instances(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Number of concurrent instances per role
    pub role_instances: BTreeMap<String, usize>,
    /// Propagation policy per role
    #[serde(default)]
    pub delay_policy: BTreeMap<String, DelayPolicy>,
    /// Threshold used by the delayed policies, per role
    #[serde(default)]
    pub delay_amount: BTreeMap<String, u32>,
    /// Iterations allowed per loop event
    #[serde(default = "default_loop_bound", alias = "loop_counter")]
    pub loop_bound: u32,
    /// Whether loop iterations are counted per instance or globally
    #[serde(default)]
    pub loop_bounding: LoopBounding,
    /// Emissions allowed per instance for loop events off every exit path;
    /// `None` disables exit-path bounding
    #[serde(default)]
    pub path_bound: Option<u32>,
    /// Capacity of every log
    #[serde(default = "default_log_size")]
    pub log_size: usize,
    /// Validate branch-tracking ties during merge
    #[serde(default = "default_true")]
    pub branch_tracking: bool,
    /// Simplified merge without branch conflict resolution or consolidation
    #[serde(default)]
    pub standard_setting: bool,
    /// Optional event and log timing
    #[serde(default)]
    pub timing: Option<TimingData>,
}

impl ModelSettings {
    /// Settings with the given instance counts, immediate propagation for
    /// every role and defaults elsewhere.
    #[must_use]
    pub fn uniform<I, S>(role_instances: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let role_instances: BTreeMap<String, usize> = role_instances
            .into_iter()
            .map(|(role, count)| (role.into(), count))
            .collect();
        let delay_policy = role_instances
            .keys()
            .map(|role| (role.clone(), DelayPolicy::Nothing))
            .collect();

        Self {
            role_instances,
            delay_policy,
            delay_amount: BTreeMap::new(),
            loop_bound: default_loop_bound(),
            loop_bounding: LoopBounding::default(),
            path_bound: None,
            log_size: default_log_size(),
            branch_tracking: true,
            standard_setting: false,
            timing: None,
        }
    }

    /// Set the log capacity
    #[must_use]
    pub fn with_log_size(mut self, log_size: usize) -> Self {
        self.log_size = log_size;
        self
    }

    /// Set the loop bound
    #[must_use]
    pub fn with_loop_bound(mut self, loop_bound: u32) -> Self {
        self.loop_bound = loop_bound;
        self
    }

    /// Set the exit-path bound
    #[must_use]
    pub fn with_path_bound(mut self, path_bound: u32) -> Self {
        self.path_bound = Some(path_bound);
        self
    }

    /// Set the delay policy and amount of one role
    #[must_use]
    pub fn with_delay(mut self, role: impl Into<String>, policy: DelayPolicy, amount: u32) -> Self {
        let role = role.into();
        self.delay_amount.insert(role.clone(), amount);
        self.delay_policy.insert(role, policy);
        self
    }

    /// Set the timing data
    #[must_use]
    pub fn with_timing(mut self, timing: TimingData) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Number of instances of `role`
    #[must_use]
    pub fn instances(&self, role: &str) -> Option<usize> {
        self.role_instances.get(role).copied()
    }

    /// Delay policy of `role`
    #[must_use]
    pub fn delay(&self, role: &str) -> Option<DelayPolicy> {
        self.delay_policy.get(role).copied()
    }

    /// Delay threshold of `role`; zero for immediate propagation.
    #[must_use]
    pub fn delay_threshold(&self, role: &str) -> u32 {
        match self.delay(role) {
            Some(DelayPolicy::Nothing) | None => 0,
            Some(_) => self.delay_amount.get(role).copied().unwrap_or(0),
        }
    }

    /// Whether any role counts globally observed entries
    #[must_use]
    pub fn uses_global_event_bound(&self) -> bool {
        self.delay_policy
            .values()
            .any(|policy| *policy == DelayPolicy::EventsEmitted)
    }

    /// Total number of role instances, which is also the number of logs
    #[must_use]
    pub fn total_instances(&self) -> usize {
        self.role_instances.values().sum()
    }

    /// Check the settings against the roles owning events in the protocol.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self, roles: &BTreeSet<&str>) -> Result<(), ConfigError> {
        if self.log_size == 0 {
            return Err(ConfigError::ZeroLogSize);
        }
        if self.loop_bound == 0 {
            return Err(ConfigError::ZeroLoopBound);
        }

        for role in roles {
            let role = (*role).to_string();
            match self.instances(&role) {
                None => return Err(ConfigError::MissingInstances { role }),
                Some(0) => return Err(ConfigError::ZeroInstances { role }),
                Some(_) => {}
            }
            match self.delay(&role) {
                None => return Err(ConfigError::MissingDelayPolicy { role }),
                Some(DelayPolicy::Nothing) => {}
                Some(_) if !self.delay_amount.contains_key(&role) => {
                    return Err(ConfigError::MissingDelayAmount { role })
                }
                Some(_) => {}
            }
        }

        if let Some(role) = self
            .role_instances
            .keys()
            .find(|role| !roles.contains(role.as_str()))
        {
            return Err(ConfigError::UnknownRole { role: role.clone() });
        }

        Ok(())
    }
}
