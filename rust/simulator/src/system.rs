//! Executable state of a synthesized model.
//!
//! One role automaton state and one [`LocalLog`] per role instance, the
//! shared [`GlobalLog`] and the counters the emission guards read. Logs
//! exchange entries in propagation waves along the instance ring; every
//! change of view is replayed on the owning role automaton through its
//! backtrack and advance edges.

use crate::error::SimulationError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use swarmlog_automata::{EdgeIndex, LocationIndex};
use swarmlog_consistency::{GlobalLog, LocalLog, LogOverflow, MergeOutcome, ValidationRules};
use swarmlog_synthesis::{EventEdges, Model, RoleAutomaton};
use swarmlog_types::{DelayPolicy, EventId, InstanceId, LogEntry, LoopBounding, OrderCount};

/// Result of an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Logged {
        /// Whether the emitter's own view kept the entry
        accepted: bool,
    },
    Overflow(LogOverflow),
}

struct Instance<'m> {
    id: InstanceId,
    role: &'m RoleAutomaton,
    policy: DelayPolicy,
    threshold: u32,
    location: LocationIndex,
    log: LocalLog,
    updates_since_propagation: u32,
    new_updates: bool,
}

pub struct System<'m> {
    model: &'m Model,
    instances: Vec<Instance<'m>>,
    global: GlobalLog,
    loop_events: BTreeSet<EventId>,
    path_bounded: BTreeSet<EventId>,
    loop_counts: BTreeMap<(Option<InstanceId>, EventId), u32>,
    path_counts: BTreeMap<(InstanceId, EventId), u32>,
    global_updates: Vec<u32>,
}

impl<'m> System<'m> {
    /// Put every instance at its initial location with an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::MissingRole`] when a configured role has
    /// no automata in `model`.
    pub fn new(model: &'m Model) -> Result<Self, SimulationError> {
        let settings = model.settings();
        let shared = Arc::new(model.tables().clone());
        let global = GlobalLog::new(
            ValidationRules::global(shared.clone(), settings),
            settings.log_size,
        );

        let mut instances = Vec::new();
        for (id, role, _) in model.layout().instances() {
            let missing = || SimulationError::MissingRole {
                role: role.to_string(),
            };
            let automaton = model.role(role).ok_or_else(missing)?;
            let flow = model.log(role).ok_or_else(missing)?.flow().clone();
            let rules = ValidationRules::new(shared.clone(), flow, settings);
            instances.push(Instance {
                id,
                role: automaton,
                policy: settings.delay(role).unwrap_or(DelayPolicy::Nothing),
                threshold: settings.delay_threshold(role),
                location: automaton.initial(),
                log: LocalLog::new(id, rules, settings.standard_setting),
                updates_since_propagation: 0,
                new_updates: false,
            });
        }

        let numbering = &model.tables().numbering;
        let analysis = model.analysis();
        let loop_events = analysis
            .loop_events()
            .into_iter()
            .filter_map(|event| numbering.id(event.name()))
            .collect();
        let path_bounded = if settings.path_bound.is_some() {
            analysis
                .non_exit_events()
                .into_iter()
                .filter_map(|event| numbering.id(event.name()))
                .collect()
        } else {
            BTreeSet::new()
        };

        let global_updates = vec![0; instances.len()];
        Ok(Self {
            model,
            instances,
            global,
            loop_events,
            path_bounded,
            loop_counts: BTreeMap::new(),
            path_counts: BTreeMap::new(),
            global_updates,
        })
    }

    #[must_use]
    pub fn global(&self) -> &GlobalLog {
        &self.global
    }

    /// Number of role instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn log(&self, id: InstanceId) -> Option<&LocalLog> {
        self.instances.get(id.0).map(|instance| &instance.log)
    }

    /// Protocol location the instance's role automaton stands at
    #[must_use]
    pub fn location(&self, id: InstanceId) -> Option<&str> {
        self.instances
            .get(id.0)
            .and_then(|instance| instance.role.protocol_location(instance.location))
    }

    /// Emissions whose edge leaves the current location and whose loop and
    /// path budgets are not exhausted.
    #[must_use]
    pub fn enabled_emissions(&self) -> Vec<(InstanceId, EventId)> {
        let mut enabled = Vec::new();
        for instance in &self.instances {
            for (event, edges) in instance.role.events() {
                let Some(emit) = edges.emit else {
                    continue;
                };
                let leaves_here = endpoints(instance.role, emit)
                    .is_some_and(|(source, _)| source == instance.location);
                if leaves_here && self.within_budget(instance.id, event) {
                    enabled.push((instance.id, event));
                }
            }
        }
        enabled
    }

    /// Instances holding updates they have not propagated yet
    #[must_use]
    pub fn pending_propagations(&self) -> Vec<InstanceId> {
        self.instances
            .iter()
            .filter(|instance| instance.new_updates)
            .map(|instance| instance.id)
            .collect()
    }

    fn within_budget(&self, id: InstanceId, event: EventId) -> bool {
        let settings = self.model.settings();
        if self.loop_events.contains(&event) {
            let count = self.loop_counts.get(&self.loop_key(id, event)).copied().unwrap_or(0);
            if count >= settings.loop_bound {
                return false;
            }
        }
        if let (true, Some(bound)) = (self.path_bounded.contains(&event), settings.path_bound) {
            let count = self.path_counts.get(&(id, event)).copied().unwrap_or(0);
            if count >= bound {
                return false;
            }
        }
        true
    }

    fn loop_key(&self, id: InstanceId, event: EventId) -> (Option<InstanceId>, EventId) {
        match self.model.settings().loop_bounding {
            LoopBounding::RoleLocal => (Some(id), event),
            LoopBounding::Global => (None, event),
        }
    }

    /// Fire the emission edge of `event` and insert the entry.
    ///
    /// Propagation follows the emitter's delay policy. An entry the own view
    /// rejects is retracted from the role right away.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Desync`] when the emission edge does not
    /// leave the instance's location.
    pub fn emit(&mut self, id: InstanceId, event: EventId) -> Result<Emission, SimulationError> {
        let desync = SimulationError::Desync {
            instance: id,
            event,
        };
        let instance = self.instances.get(id.0).ok_or_else(|| desync.clone())?;
        let emit = instance
            .role
            .edges(event)
            .and_then(|edges| edges.emit)
            .ok_or_else(|| desync.clone())?;
        let (source, target) = endpoints(instance.role, emit).ok_or_else(|| desync.clone())?;
        if source != instance.location {
            return Err(desync);
        }

        if self.loop_events.contains(&event) {
            let key = self.loop_key(id, event);
            *self.loop_counts.entry(key).or_default() += 1;
        }
        if self.path_bounded.contains(&event) {
            *self.path_counts.entry((id, event)).or_default() += 1;
        }

        let instance = &mut self.instances[id.0];
        instance.location = target;
        let insertion = match instance.log.insert(event, &mut self.global) {
            Ok(insertion) => insertion,
            Err(overflow) => return Ok(Emission::Overflow(overflow)),
        };
        if !insertion.accepted {
            self.retract(id, &insertion.entry)?;
        }
        self.check_location(id)?;

        let instance = &mut self.instances[id.0];
        instance.updates_since_propagation += 1;
        instance.new_updates = true;
        let (policy, threshold, updates) = (
            instance.policy,
            instance.threshold,
            instance.updates_since_propagation,
        );
        for counter in &mut self.global_updates {
            *counter += 1;
        }

        match policy {
            DelayPolicy::Nothing => self.propagate(id)?,
            DelayPolicy::EventsSelfEmitted if updates > threshold => self.propagate(id)?,
            DelayPolicy::EventsSelfEmitted | DelayPolicy::EventsEmitted => {}
        }
        self.force_propagations()?;

        Ok(Emission::Logged {
            accepted: insertion.accepted,
        })
    }

    fn force_propagations(&mut self) -> Result<(), SimulationError> {
        let forced: Vec<InstanceId> = self
            .instances
            .iter()
            .filter(|instance| {
                instance.policy == DelayPolicy::EventsEmitted
                    && self.global_updates[instance.id.0] > instance.threshold
            })
            .map(|instance| instance.id)
            .collect();
        for id in forced {
            tracing::trace!(instance = %id, "forced propagation");
            self.propagate(id)?;
        }
        Ok(())
    }

    /// Hand the log of `from` around the ring, one hop per other instance.
    ///
    /// # Errors
    ///
    /// Fails when a receiving role cannot replay its change of view.
    pub fn propagate(&mut self, from: InstanceId) -> Result<(), SimulationError> {
        let mut current = from;
        for _ in 1..self.instances.len() {
            let next = self.model.layout().next(current);
            self.hop(current, next)?;
            current = next;
        }

        if let Some(instance) = self.instances.get_mut(from.0) {
            instance.updates_since_propagation = 0;
            instance.new_updates = false;
        }
        if let Some(counter) = self.global_updates.get_mut(from.0) {
            *counter = 0;
        }
        Ok(())
    }

    /// Two passes around the ring: afterwards every log knows every entry.
    ///
    /// # Errors
    ///
    /// Fails when a receiving role cannot replay its change of view.
    pub fn quiesce(&mut self) -> Result<(), SimulationError> {
        for _ in 0..2 {
            for index in 0..self.instances.len() {
                let from = InstanceId(index);
                self.hop(from, self.model.layout().next(from))?;
            }
        }
        for instance in &mut self.instances {
            instance.updates_since_propagation = 0;
            instance.new_updates = false;
        }
        self.global_updates.iter_mut().for_each(|counter| *counter = 0);
        Ok(())
    }

    fn hop(&mut self, from: InstanceId, to: InstanceId) -> Result<(), SimulationError> {
        if from == to {
            return Ok(());
        }
        let Some(sender) = self.instances.get(from.0) else {
            return Ok(());
        };
        let entries = sender.log.export();
        let Some(receiver) = self.instances.get_mut(to.0) else {
            return Ok(());
        };
        let outcome = receiver.log.merge(&entries);
        self.replay(to, &outcome)
    }

    fn replay(&mut self, id: InstanceId, outcome: &MergeOutcome) -> Result<(), SimulationError> {
        for entry in &outcome.backtrack {
            self.retract(id, entry)?;
        }
        for entry in &outcome.advance {
            self.advance(id, entry)?;
        }
        self.check_location(id)
    }

    fn retract(&mut self, id: InstanceId, entry: &LogEntry) -> Result<(), SimulationError> {
        self.follow(id, entry.event, |edges| edges.backtrack)
    }

    fn advance(&mut self, id: InstanceId, entry: &LogEntry) -> Result<(), SimulationError> {
        self.follow(id, entry.event, |edges| edges.advance)
    }

    fn follow(
        &mut self,
        id: InstanceId,
        event: EventId,
        select: fn(EventEdges) -> EdgeIndex,
    ) -> Result<(), SimulationError> {
        let desync = SimulationError::Desync {
            instance: id,
            event,
        };
        let instance = self.instances.get_mut(id.0).ok_or_else(|| desync.clone())?;
        let edge = instance
            .role
            .edges(event)
            .map(select)
            .ok_or_else(|| desync.clone())?;
        match endpoints(instance.role, edge) {
            Some((source, target)) if source == instance.location => {
                instance.location = target;
                Ok(())
            }
            _ => Err(desync),
        }
    }

    fn check_location(&self, id: InstanceId) -> Result<(), SimulationError> {
        let Some(instance) = self.instances.get(id.0) else {
            return Ok(());
        };
        let role_location = instance.role.protocol_location(instance.location);
        let log_location = instance.log.location().map(|location| location.as_str());
        if role_location == log_location {
            return Ok(());
        }
        Err(SimulationError::LocationMismatch {
            instance: id,
            role_location: role_location.unwrap_or_default().to_string(),
            log_location: log_location.unwrap_or_default().to_string(),
        })
    }

    /// Compare every pair of logs on the events both subscribe to, and every
    /// log with the true global log on the events it subscribes to.
    ///
    /// Only meaningful once every log has heard from every other, e.g. after
    /// [`System::quiesce`].
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::TrueViewMismatch`] or
    /// [`SimulationError::Diverged`] for the first disagreement found.
    pub fn check_convergence(&self) -> Result<(), SimulationError> {
        for (index, left) in self.instances.iter().enumerate() {
            let subscribed = |entry: &&LogEntry| left.log.rules().flow().contains(entry.event);
            let truth = orders(self.global.true_view().iter().filter(subscribed));
            if orders(left.log.view().iter()) != truth {
                return Err(SimulationError::TrueViewMismatch { instance: left.id });
            }

            for right in &self.instances[index + 1..] {
                let common = |entry: &&LogEntry| {
                    left.log.rules().flow().contains(entry.event)
                        && right.log.rules().flow().contains(entry.event)
                };
                let left_common = orders(left.log.view().iter().filter(common));
                let right_common = orders(right.log.view().iter().filter(common));
                if left_common != right_common {
                    return Err(SimulationError::Diverged {
                        left: left.id,
                        right: right.id,
                    });
                }
            }
        }
        Ok(())
    }
}

fn endpoints(role: &RoleAutomaton, edge: EdgeIndex) -> Option<(LocationIndex, LocationIndex)> {
    role.automaton()
        .edge(edge)
        .map(|(source, target, _)| (source, target))
}

fn orders<'a>(entries: impl Iterator<Item = &'a LogEntry>) -> Vec<OrderCount> {
    entries.map(|entry| entry.order).collect()
}
