//! In-memory profile collection keyed by identity.
//!
//! Both producers (the REST list fetch and the event feed) go through
//! [`ProfileStore::upsert`]. A stored record is always replaced as a whole,
//! never merged field by field.

use std::collections::HashMap;

use crate::config::MergePolicy;
use crate::model::{Profile, ProfileId};

/// Where a previously unseen identity lands in the snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Newest first. Used for identities first observed on the feed.
    Front,
    /// After everything already known. Used for bulk REST results so the
    /// server's ordering is preserved.
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    /// Rejected by [`MergePolicy::NewestTimestamp`].
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    policy: MergePolicy,
    entries: HashMap<ProfileId, Profile>,
    order: Vec<ProfileId>,
}

impl ProfileStore {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn upsert(&mut self, profile: Profile, placement: Placement) -> Upsert {
        let id = profile.id;
        match self.entries.get_mut(&id) {
            Some(existing) => {
                if self.policy == MergePolicy::NewestTimestamp && is_older(&profile, existing) {
                    tracing::debug!(
                        profile_id = %id,
                        incoming = %profile.updated_at,
                        stored = %existing.updated_at,
                        "ignoring stale profile record"
                    );
                    return Upsert::Stale;
                }
                *existing = profile;
                Upsert::Replaced
            }
            None => {
                self.entries.insert(id, profile);
                match placement {
                    Placement::Front => self.order.insert(0, id),
                    Placement::Back => self.order.push(id),
                }
                Upsert::Inserted
            }
        }
    }

    /// Insert-or-replace every profile in order. Returns how many records
    /// were applied (inserted or replaced).
    pub fn upsert_all(&mut self, profiles: impl IntoIterator<Item = Profile>) -> usize {
        profiles
            .into_iter()
            .map(|profile| self.upsert(profile, Placement::Back))
            .filter(|outcome| *outcome != Upsert::Stale)
            .count()
    }

    pub fn get(&self, id: ProfileId) -> Option<&Profile> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Current values in observation order.
    pub fn snapshot(&self) -> Vec<Profile> {
        self.iter().cloned().collect()
    }
}

// Unparseable timestamps never count as older.
fn is_older(incoming: &Profile, stored: &Profile) -> bool {
    match (incoming.updated_at_utc(), stored.updated_at_utc()) {
        (Some(incoming), Some(stored)) => incoming < stored,
        _ => false,
    }
}
