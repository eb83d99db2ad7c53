//! Port allocation service.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::State;
use crate::error::{Error, Result};
use crate::ports::{PortProber, ProcessLiveness};
use crate::registry::Registry;

/// Maximum number of candidates tried before giving up.
pub const MAX_ATTEMPTS: u32 = 100;

/// Hands out ports that are free on the host, not held by a live tracked
/// process, and not already given out by this allocator.
///
/// The reservation set lives as long as the allocator value, so several
/// allocations within one invocation never collide with each other.
pub struct PortAllocator<P: PortProber, L: ProcessLiveness> {
    registry: Registry,
    prober: P,
    liveness: L,
    reserved: HashSet<u16>,
}

impl<P: PortProber, L: ProcessLiveness> PortAllocator<P, L> {
    pub fn new(registry: Registry, prober: P, liveness: L) -> Self {
        Self {
            registry,
            prober,
            liveness,
            reserved: HashSet::new(),
        }
    }

    /// Allocate a port at or after `preferred`, reading the registry first.
    pub async fn allocate(&mut self, preferred: u16, exclude: &[u16]) -> Result<u16> {
        let state = self.registry.load().await?;
        self.allocate_with_state(&state, preferred, exclude)
    }

    /// Same search as [`allocate`](Self::allocate) against a snapshot the
    /// caller already holds.
    pub fn allocate_with_state(
        &mut self,
        state: &State,
        preferred: u16,
        exclude: &[u16],
    ) -> Result<u16> {
        let excluded = self.exclusion_set(state, exclude);

        let mut candidate = u32::from(preferred);
        for _ in 0..MAX_ATTEMPTS {
            let Ok(port) = u16::try_from(candidate) else {
                break;
            };

            if excluded.contains(&port) {
                candidate += 1;
                continue;
            }

            let suggested = self.prober.nearest_free(port)?;
            if !excluded.contains(&suggested) {
                debug!(preferred = preferred, allocated = suggested, "Allocated port");
                self.reserved.insert(suggested);
                return Ok(suggested);
            }

            candidate = u32::from(suggested) + 1;
        }

        Err(Error::PortExhausted {
            preferred,
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Ports handed out so far.
    pub fn reserved(&self) -> &HashSet<u16> {
        &self.reserved
    }

    /// Forget every reservation.
    pub fn reset(&mut self) {
        self.reserved.clear();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn exclusion_set(&self, state: &State, exclude: &[u16]) -> HashSet<u16> {
        let mut excluded: HashSet<u16> = self.reserved.iter().copied().collect();
        excluded.extend(exclude.iter().copied());

        for (name, mapping) in &state.mappings {
            if !mapping.status.is_running() {
                continue;
            }
            // Stale entries must not block their ports forever.
            if !self.liveness.is_alive(mapping.pid) {
                debug!(name = %name, pid = mapping.pid, "Ignoring ports of dead process");
                continue;
            }
            excluded.extend(mapping.claimed_ports());
        }

        excluded
    }
}
