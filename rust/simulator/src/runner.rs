//! Seeded runs over a synthesized model.
//!
//! Each step picks uniformly among the enabled emissions and the pending
//! propagations. A run ends when nothing is enabled, when the step budget is
//! spent, or when an emission overflows the global log.

use crate::error::SimulationError;
use crate::rng::SimRng;
use crate::system::{Emission, System};
use crate::trace::{Action, StepRecord, Trace};
use swarmlog_synthesis::Model;

/// Parameters of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub seed: u64,
    pub max_steps: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_steps: 1_000,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// No emission or propagation is enabled
    Completed,
    StepLimit,
    /// An emission found the global log full
    Overflow { capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub outcome: SimulationOutcome,
    pub steps: usize,
    pub trace: Trace,
}

/// A model under simulation.
pub struct Simulation<'m> {
    system: System<'m>,
    rng: SimRng,
    max_steps: usize,
    steps: usize,
    trace: Trace,
    outcome: Option<SimulationOutcome>,
}

impl<'m> Simulation<'m> {
    /// # Errors
    ///
    /// Fails when the model lacks automata for a configured role.
    pub fn new(model: &'m Model, config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::with_rng(model, SimRng::new(config.seed), config.max_steps)
    }

    /// # Errors
    ///
    /// Fails when the model lacks automata for a configured role.
    pub fn with_rng(
        model: &'m Model,
        rng: SimRng,
        max_steps: usize,
    ) -> Result<Self, SimulationError> {
        Ok(Self {
            system: System::new(model)?,
            rng,
            max_steps,
            steps: 0,
            trace: Trace::new(),
            outcome: None,
        })
    }

    #[must_use]
    pub fn system(&self) -> &System<'m> {
        &self.system
    }

    #[must_use]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Take one step; `Some` once the run has ended.
    ///
    /// # Errors
    ///
    /// Fails when a role automaton cannot follow its log.
    pub fn step(&mut self) -> Result<Option<SimulationOutcome>, SimulationError> {
        if let Some(outcome) = self.outcome {
            return Ok(Some(outcome));
        }
        if self.steps >= self.max_steps {
            return Ok(Some(self.finish(SimulationOutcome::StepLimit)));
        }

        let mut actions: Vec<Action> = self
            .system
            .enabled_emissions()
            .into_iter()
            .map(|(instance, event)| Action::Emit { instance, event })
            .collect();
        actions.extend(
            self.system
                .pending_propagations()
                .into_iter()
                .map(|instance| Action::Propagate { instance }),
        );
        let Some(action) = self.rng.pick(actions.len()).map(|index| actions[index]) else {
            return Ok(Some(self.finish(SimulationOutcome::Completed)));
        };

        tracing::trace!(step = self.steps, %action, "simulation step");
        match action {
            Action::Emit { instance, event } => {
                if let Emission::Overflow(overflow) = self.system.emit(instance, event)? {
                    self.record(action);
                    return Ok(Some(self.finish(SimulationOutcome::Overflow {
                        capacity: overflow.capacity,
                    })));
                }
            }
            Action::Propagate { instance } => self.system.propagate(instance)?,
        }
        self.record(action);
        Ok(None)
    }

    /// Step until the run ends.
    ///
    /// # Errors
    ///
    /// Fails when a role automaton cannot follow its log.
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        let outcome = loop {
            if let Some(outcome) = self.step()? {
                break outcome;
            }
        };
        Ok(SimulationReport {
            outcome,
            steps: self.steps,
            trace: self.trace.clone(),
        })
    }

    /// Exchange logs until every log knows every entry.
    ///
    /// # Errors
    ///
    /// Fails when a role automaton cannot follow its log.
    pub fn quiesce(&mut self) -> Result<(), SimulationError> {
        self.system.quiesce()
    }

    /// # Errors
    ///
    /// Returns the first disagreement between logs.
    pub fn check_convergence(&self) -> Result<(), SimulationError> {
        self.system.check_convergence()
    }

    fn record(&mut self, action: Action) {
        let location = self
            .system
            .location(action.instance())
            .unwrap_or_default()
            .to_string();
        self.trace.record(StepRecord {
            step: self.steps,
            action,
            location,
            entries: self.system.global().len(),
        });
        self.steps += 1;
    }

    fn finish(&mut self, outcome: SimulationOutcome) -> SimulationOutcome {
        tracing::debug!(
            steps = self.steps,
            entries = self.system.global().len(),
            ?outcome,
            "simulation finished"
        );
        self.outcome = Some(outcome);
        outcome
    }
}

/// Run `runs` simulations, each seeded from its own fork of `seed`.
///
/// Every run is quiesced and checked for convergence unless it overflowed.
///
/// # Errors
///
/// Returns the first simulation or convergence error.
pub fn explore(
    model: &Model,
    seed: u64,
    runs: usize,
    max_steps: usize,
) -> Result<Vec<SimulationReport>, SimulationError> {
    let mut rng = SimRng::new(seed);
    let mut reports = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut simulation = Simulation::with_rng(model, rng.fork(), max_steps)?;
        let report = simulation.run()?;
        if !matches!(report.outcome, SimulationOutcome::Overflow { .. }) {
            simulation.quiesce()?;
            simulation.check_convergence()?;
        }
        reports.push(report);
    }
    Ok(reports)
}
