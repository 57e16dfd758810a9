//! Global numbering of role instances.
//!
//! Roles are ordered by name. Instance `k` of role `R` gets the global id
//! `offset(R) + k`, where `offset(R)` is the number of instances of all roles
//! ordered before `R`. The same id indexes the role's log, the shared
//! counters and the propagation ring.

use swarmlog_types::{InstanceId, ModelSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoleSlot {
    name: String,
    offset: usize,
    count: usize,
}

/// Offsets and counts of every configured role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceLayout {
    slots: Vec<RoleSlot>,
}

impl InstanceLayout {
    #[must_use]
    pub fn new(settings: &ModelSettings) -> Self {
        let mut offset = 0;
        let slots = settings
            .role_instances
            .iter()
            .map(|(name, &count)| {
                let slot = RoleSlot {
                    name: name.clone(),
                    offset,
                    count,
                };
                offset += count;
                slot
            })
            .collect();
        Self { slots }
    }

    fn slot(&self, role: &str) -> Option<&RoleSlot> {
        self.slots.iter().find(|slot| slot.name == role)
    }

    /// Global id of the first instance of `role`
    #[must_use]
    pub fn offset(&self, role: &str) -> Option<usize> {
        self.slot(role).map(|slot| slot.offset)
    }

    #[must_use]
    pub fn count(&self, role: &str) -> Option<usize> {
        self.slot(role).map(|slot| slot.count)
    }

    /// Number of instances over all roles
    #[must_use]
    pub fn total(&self) -> usize {
        self.slots.iter().map(|slot| slot.count).sum()
    }

    /// Role names in layout order
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Every instance as `(global id, role, local index)`, in id order.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &str, usize)> {
        self.slots.iter().flat_map(|slot| {
            (0..slot.count)
                .map(move |local| (InstanceId(slot.offset + local), slot.name.as_str(), local))
        })
    }

    /// Role and local index of a global id
    #[must_use]
    pub fn role_of(&self, id: InstanceId) -> Option<(&str, usize)> {
        self.slots
            .iter()
            .find(|slot| id.0 >= slot.offset && id.0 < slot.offset + slot.count)
            .map(|slot| (slot.name.as_str(), id.0 - slot.offset))
    }

    /// Successor of `id` on the propagation ring.
    #[must_use]
    pub fn next(&self, id: InstanceId) -> InstanceId {
        match self.total() {
            0 => id,
            total => InstanceId((id.0 + 1) % total),
        }
    }
}
