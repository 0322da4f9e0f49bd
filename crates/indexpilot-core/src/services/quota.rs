//! Run-scoped quota tracking
//!
//! A [`QuotaTracker`] is built fresh for every dispatch run from the
//! credentials authorized for that run. It combines an optimistic local
//! counter (`used_this_run`, bounded by the operation's daily cap) with
//! reactive exhaustion marking driven by live provider responses.
//!
//! Selection is a pure function of the current eligible set and the URL's
//! batch position, so a credential marked exhausted mid-batch is skipped by
//! every later URL without any iterator state to repair.

use serde::Serialize;

use super::credentials::AuthorizedCredential;

/// Quota state of one credential within one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaState {
    /// Provider signalled exhaustion; never reset within the run
    pub exhausted: bool,
    /// Successful calls made with this credential in this run
    pub used_this_run: u32,
}

/// Per-credential usage reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialUsage {
    pub credential_id: String,
    pub used: u32,
    pub exhausted: bool,
}

/// Round-robin pick: `eligible[index % eligible.len()]`
pub fn select<T>(eligible: &[T], index: usize) -> Option<&T> {
    if eligible.is_empty() {
        None
    } else {
        eligible.get(index % eligible.len())
    }
}

/// Quota bookkeeping for one dispatch run
pub struct QuotaTracker {
    credentials: Vec<AuthorizedCredential>,
    states: Vec<QuotaState>,
    unit_cap: u32,
}

impl QuotaTracker {
    /// Start a run over `credentials` (pool order) with a per-credential cap
    pub fn new(credentials: Vec<AuthorizedCredential>, unit_cap: u32) -> Self {
        let states = vec![QuotaState::default(); credentials.len()];
        Self {
            credentials,
            states,
            unit_cap,
        }
    }

    pub fn unit_cap(&self) -> u32 {
        self.unit_cap
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credential(&self, slot: usize) -> &AuthorizedCredential {
        &self.credentials[slot]
    }

    pub fn state(&self, slot: usize) -> QuotaState {
        self.states[slot]
    }

    /// Slots of credentials that are neither exhausted nor at the cap,
    /// in pool order
    pub fn eligible(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.exhausted && s.used_this_run < self.unit_cap)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Credential slot for the URL at batch position `index`, against the
    /// eligible set as it is right now
    pub fn select(&self, index: usize) -> Option<usize> {
        select(&self.eligible(), index).copied()
    }

    /// Flag a credential as exhausted for the rest of the run
    pub fn mark_exhausted(&mut self, slot: usize) {
        let state = &mut self.states[slot];
        if !state.exhausted {
            state.exhausted = true;
            log::info!(
                "[quota] {} exhausted after {} call(s) this run",
                self.credentials[slot].id(),
                state.used_this_run
            );
        }
    }

    /// Count one successful call against a credential
    pub fn record_use(&mut self, slot: usize) {
        let state = &mut self.states[slot];
        debug_assert!(state.used_this_run < self.unit_cap, "selected a capped credential");
        state.used_this_run = (state.used_this_run + 1).min(self.unit_cap);
    }

    /// Usage of every credential, in pool order
    pub fn usage(&self) -> Vec<CredentialUsage> {
        self.credentials
            .iter()
            .zip(&self.states)
            .map(|(c, s)| CredentialUsage {
                credential_id: c.id().to_string(),
                used: s.used_this_run,
                exhausted: s.exhausted,
            })
            .collect()
    }
}
