//! Connection registry: live connections and their broadcast groups.
//!
//! The registry is the single authority on group membership. Every
//! connection is implicitly a member of `user:<id>` and `role:<role>s`, plus
//! whatever ride or system groups it joined.
//!
//! ```text
//! user:p-1       role:passengers     ride:r-9            ride_matching
//! └── conn-a     ├── conn-a          ├── conn-a          └── matcher (system)
//!                └── conn-c          └── conn-b
//! user:d-7       role:drivers
//! └── conn-b     └── conn-b
//! ```
//!
//! All state lives behind one `RwLock` so that admission, eviction and
//! removal are atomic with respect to group resolution. Resolution returns a
//! snapshot; no lock is held while events are delivered.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::oneshot;

use crate::domain::foundation::{AuthenticatedUser, ConnectionId, RideId, Role, UserId};

use super::messages::CloseReason;
pub use super::queue::{OutboundHandle, OutboundSender};

/// Name of a broadcast group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    User(UserId),
    Role(Role),
    Ride(RideId),
    EmergencyResponders,
    RideMatching,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::User(id) => write!(f, "user:{}", id),
            GroupKey::Role(role) => write!(f, "role:{}", role.group_name()),
            GroupKey::Ride(id) => write!(f, "ride:{}", id),
            GroupKey::EmergencyResponders => f.write_str("emergency_responders"),
            GroupKey::RideMatching => f.write_str("ride_matching"),
        }
    }
}

pub use crate::domain::foundation::SystemGroup;

impl From<SystemGroup> for GroupKey {
    fn from(group: SystemGroup) -> Self {
        match group {
            SystemGroup::EmergencyResponders => GroupKey::EmergencyResponders,
            SystemGroup::RideMatching => GroupKey::RideMatching,
        }
    }
}

/// A connection resolved for delivery.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub connection_id: ConnectionId,
    pub sender: OutboundSender,
}

/// What `remove` released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedConnection {
    pub connection_id: ConnectionId,
    pub user: Option<AuthenticatedUser>,
    pub groups: Vec<GroupKey>,
}

struct ConnectionEntry {
    user: Option<AuthenticatedUser>,
    sender: OutboundSender,
    /// Out-of-band close signal; absent for system subscribers.
    closer: Option<oneshot::Sender<CloseReason>>,
    groups: HashSet<GroupKey>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    by_user: HashMap<UserId, ConnectionId>,
    groups: HashMap<GroupKey, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn join(&mut self, id: ConnectionId, key: GroupKey) -> bool {
        let Some(entry) = self.connections.get_mut(&id) else {
            return false;
        };
        if !entry.groups.insert(key.clone()) {
            return false;
        }
        self.groups.entry(key).or_default().insert(id);
        true
    }

    fn leave(&mut self, id: ConnectionId, key: &GroupKey) -> bool {
        let Some(entry) = self.connections.get_mut(&id) else {
            return false;
        };
        if !entry.groups.remove(key) {
            return false;
        }
        self.release_membership(id, key);
        true
    }

    fn release_membership(&mut self, id: ConnectionId, key: &GroupKey) {
        if let Some(members) = self.groups.get_mut(key) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(key);
            }
        }
    }

    /// Drops the entry and every membership it held.
    fn detach(&mut self, id: ConnectionId) -> Option<(ConnectionEntry, Vec<GroupKey>)> {
        let entry = self.connections.remove(&id)?;
        let mut groups: Vec<GroupKey> = entry.groups.iter().cloned().collect();
        groups.sort();
        for key in &groups {
            self.release_membership(id, key);
        }
        if let Some(user) = &entry.user {
            if self.by_user.get(&user.id) == Some(&id) {
                self.by_user.remove(&user.id);
            }
        }
        Some((entry, groups))
    }
}

/// Registry of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits an authenticated connection.
    ///
    /// Any earlier connection of the same user is evicted in the same
    /// critical section: its memberships are released and it is told to
    /// close. The close travels outside the event queue, so it arrives even
    /// when that queue is full. Returns the evicted connection id.
    pub fn admit(
        &self,
        id: ConnectionId,
        user: &AuthenticatedUser,
        outbound: OutboundHandle,
    ) -> Option<ConnectionId> {
        let mut state = self.write();

        let evicted = match state.by_user.get(&user.id).copied() {
            Some(previous) if previous != id => {
                let closer = state.detach(previous).and_then(|(old, _)| old.closer);
                if let Some(closer) = closer {
                    // The old writer may already be gone; eviction stands either way.
                    let _ = closer.send(CloseReason::Replaced);
                }
                Some(previous)
            }
            _ => None,
        };

        if let Some((_, _)) = state.detach(id) {
            tracing::debug!(connection_id = %id, "Re-admitting connection");
        }

        state.connections.insert(
            id,
            ConnectionEntry {
                user: Some(user.clone()),
                sender: outbound.sender,
                closer: Some(outbound.closer),
                groups: HashSet::new(),
            },
        );
        state.by_user.insert(user.id.clone(), id);
        state.join(id, GroupKey::User(user.id.clone()));
        state.join(id, GroupKey::Role(user.role));
        for group in &user.system_groups {
            state.join(id, (*group).into());
        }

        evicted
    }

    /// Registers a connection-less consumer in a system group.
    pub fn attach(&self, id: ConnectionId, group: SystemGroup, sender: OutboundSender) {
        let mut state = self.write();
        state.connections.insert(
            id,
            ConnectionEntry {
                user: None,
                sender,
                closer: None,
                groups: HashSet::new(),
            },
        );
        state.join(id, group.into());
    }

    /// Adds a connection to a group. Returns false if it was already a
    /// member or the connection is unknown.
    pub fn join(&self, id: ConnectionId, key: GroupKey) -> bool {
        self.write().join(id, key)
    }

    /// Removes a connection from a group. Returns false if it was not a
    /// member.
    pub fn leave(&self, id: ConnectionId, key: &GroupKey) -> bool {
        self.write().leave(id, key)
    }

    pub fn join_ride_group(&self, id: ConnectionId, ride_id: &RideId) -> bool {
        self.join(id, GroupKey::Ride(ride_id.clone()))
    }

    pub fn leave_ride_group(&self, id: ConnectionId, ride_id: &RideId) -> bool {
        self.leave(id, &GroupKey::Ride(ride_id.clone()))
    }

    /// Joins a user's live connection, if any, to a ride group.
    pub fn join_user_to_ride(&self, user_id: &UserId, ride_id: &RideId) -> bool {
        let mut state = self.write();
        match state.by_user.get(user_id).copied() {
            Some(id) => state.join(id, GroupKey::Ride(ride_id.clone())),
            None => false,
        }
    }

    /// Removes a user's live connection, if any, from a ride group.
    pub fn remove_user_from_ride(&self, user_id: &UserId, ride_id: &RideId) -> bool {
        let mut state = self.write();
        match state.by_user.get(user_id).copied() {
            Some(id) => state.leave(id, &GroupKey::Ride(ride_id.clone())),
            None => false,
        }
    }

    /// Releases a connection and all its memberships.
    ///
    /// Idempotent: returns `None` when the connection is already gone.
    pub fn remove(&self, id: ConnectionId) -> Option<RemovedConnection> {
        let (entry, groups) = self.write().detach(id)?;
        Some(RemovedConnection {
            connection_id: id,
            user: entry.user,
            groups,
        })
    }

    /// Snapshot of a group's members.
    pub fn resolve_group(&self, key: &GroupKey) -> Vec<Recipient> {
        let state = self.read();
        state
            .groups
            .get(key)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| {
                        state.connections.get(id).map(|entry| Recipient {
                            connection_id: *id,
                            sender: entry.sender.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the union of several groups, each connection once.
    pub fn resolve_groups(&self, keys: &[GroupKey]) -> Vec<Recipient> {
        let state = self.read();
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for key in keys {
            let Some(members) = state.groups.get(key) else {
                continue;
            };
            for id in members {
                if !seen.insert(*id) {
                    continue;
                }
                if let Some(entry) = state.connections.get(id) {
                    recipients.push(Recipient {
                        connection_id: *id,
                        sender: entry.sender.clone(),
                    });
                }
            }
        }
        recipients
    }

    pub fn recipient(&self, id: ConnectionId) -> Option<Recipient> {
        self.read().connections.get(&id).map(|entry| Recipient {
            connection_id: id,
            sender: entry.sender.clone(),
        })
    }

    pub fn recipient_for_user(&self, user_id: &UserId) -> Option<Recipient> {
        let state = self.read();
        let id = *state.by_user.get(user_id)?;
        state.connections.get(&id).map(|entry| Recipient {
            connection_id: id,
            sender: entry.sender.clone(),
        })
    }

    pub fn connection_for_user(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.read().by_user.get(user_id).copied()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.read().connections.contains_key(&id)
    }

    /// Sorted list of a connection's groups; empty if unknown.
    pub fn memberships(&self, id: ConnectionId) -> Vec<GroupKey> {
        let state = self.read();
        let mut groups: Vec<GroupKey> = state
            .connections
            .get(&id)
            .map(|entry| entry.groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    pub fn group_size(&self, key: &GroupKey) -> usize {
        self.read().groups.get(key).map_or(0, HashSet::len)
    }

    /// Number of authenticated user connections.
    pub fn user_count(&self) -> usize {
        self.read().by_user.len()
    }

    /// Number of registered connections, system subscribers included.
    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::messages::{Delivery, ServerMessage};
    use crate::adapters::websocket::queue::{outbound_queue, OutboundQueue};
    use crate::domain::foundation::OutboundEvent;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn user(id: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new(id).unwrap(), role)
    }

    fn channel() -> (OutboundHandle, OutboundQueue) {
        outbound_queue(8)
    }

    fn ride(id: &str) -> RideId {
        RideId::new(id).unwrap()
    }

    #[test]
    fn group_keys_display_wire_names() {
        assert_eq!(GroupKey::User(UserId::new("u-1").unwrap()).to_string(), "user:u-1");
        assert_eq!(GroupKey::Role(Role::Driver).to_string(), "role:drivers");
        assert_eq!(GroupKey::Role(Role::Passenger).to_string(), "role:passengers");
        assert_eq!(GroupKey::Ride(ride("r-1")).to_string(), "ride:r-1");
        assert_eq!(GroupKey::EmergencyResponders.to_string(), "emergency_responders");
        assert_eq!(GroupKey::RideMatching.to_string(), "ride_matching");
    }

    #[test]
    fn admit_joins_user_and_role_groups() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let driver = user("d-1", Role::Driver);
        let (tx, _rx) = channel();

        assert_eq!(registry.admit(id, &driver, tx), None);

        assert_eq!(
            registry.memberships(id),
            vec![
                GroupKey::User(driver.id.clone()),
                GroupKey::Role(Role::Driver)
            ]
        );
        assert_eq!(registry.connection_for_user(&driver.id), Some(id));
    }

    #[test]
    fn second_admit_evicts_first_connection() {
        let registry = ConnectionRegistry::new();
        let passenger = user("p-1", Role::Passenger);
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let (tx1, mut rx1) = channel();
        let (tx2, _rx2) = channel();

        registry.admit(first, &passenger, tx1);
        registry.join_ride_group(first, &ride("r-1"));

        assert_eq!(registry.admit(second, &passenger, tx2), Some(first));

        assert!(!registry.is_registered(first));
        assert!(registry.memberships(first).is_empty());
        assert_eq!(registry.group_size(&GroupKey::Ride(ride("r-1"))), 0);
        assert_eq!(registry.connection_for_user(&passenger.id), Some(second));
        assert!(matches!(
            rx1.try_recv(),
            Ok(Delivery::Close(CloseReason::Replaced))
        ));
    }

    #[test]
    fn eviction_closes_connection_with_full_queue() {
        let registry = ConnectionRegistry::new();
        let passenger = user("p-1", Role::Passenger);
        let first = ConnectionId::new();
        let (tx1, mut rx1) = outbound_queue(1);
        let (tx2, _rx2) = channel();
        let filler = Delivery::Event(Arc::new(ServerMessage::new(
            OutboundEvent::Pong,
            serde_json::Value::Null,
        )));
        tx1.sender.try_send(filler.clone()).unwrap();
        assert!(tx1.sender.try_send(filler).is_err());

        registry.admit(first, &passenger, tx1);
        registry.admit(ConnectionId::new(), &passenger, tx2);

        assert!(matches!(
            rx1.try_recv(),
            Ok(Delivery::Close(CloseReason::Replaced))
        ));
    }

    #[test]
    fn admit_joins_granted_system_groups() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let operator = user("ops-1", Role::Driver)
            .with_system_groups([SystemGroup::EmergencyResponders]);
        let (tx, _rx) = channel();

        registry.admit(id, &operator, tx);

        assert!(registry.memberships(id).contains(&GroupKey::EmergencyResponders));
        assert_eq!(registry.group_size(&GroupKey::EmergencyResponders), 1);

        registry.remove(id);
        assert_eq!(registry.group_size(&GroupKey::EmergencyResponders), 0);
    }

    #[test]
    fn ride_group_join_and_leave_are_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = channel();
        registry.admit(id, &user("p-1", Role::Passenger), tx);
        let before = registry.memberships(id);

        assert!(registry.join_ride_group(id, &ride("r-1")));
        assert!(!registry.join_ride_group(id, &ride("r-1")));
        assert!(registry.leave_ride_group(id, &ride("r-1")));
        assert!(!registry.leave_ride_group(id, &ride("r-1")));
        assert!(!registry.leave_ride_group(id, &ride("never-joined")));

        assert_eq!(registry.memberships(id), before);
    }

    #[test]
    fn join_for_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.join_ride_group(ConnectionId::new(), &ride("r-1")));
        assert_eq!(registry.group_size(&GroupKey::Ride(ride("r-1"))), 0);
    }

    #[test]
    fn remove_releases_everything_and_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let driver = user("d-1", Role::Driver);
        let (tx, _rx) = channel();
        registry.admit(id, &driver, tx);
        registry.join_ride_group(id, &ride("r-1"));

        let removed = registry.remove(id).unwrap();

        assert_eq!(removed.user, Some(driver.clone()));
        assert_eq!(removed.groups.len(), 3);
        assert_eq!(registry.connection_for_user(&driver.id), None);
        assert_eq!(registry.group_size(&GroupKey::Role(Role::Driver)), 0);
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn removing_stale_connection_keeps_newer_user_mapping() {
        let registry = ConnectionRegistry::new();
        let passenger = user("p-1", Role::Passenger);
        let old = ConnectionId::new();
        let new = ConnectionId::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        registry.admit(old, &passenger, tx1);
        registry.admit(new, &passenger, tx2);

        assert!(registry.remove(old).is_none());

        assert_eq!(registry.connection_for_user(&passenger.id), Some(new));
    }

    #[test]
    fn resolve_empty_group_returns_nothing() {
        let registry = ConnectionRegistry::new();
        assert!(registry.resolve_group(&GroupKey::RideMatching).is_empty());
    }

    #[test]
    fn resolve_groups_deduplicates_members() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = channel();
        registry.admit(id, &user("d-1", Role::Driver), tx);
        registry.join(id, GroupKey::EmergencyResponders);
        registry.join_ride_group(id, &ride("r-1"));

        let recipients = registry.resolve_groups(&[
            GroupKey::EmergencyResponders,
            GroupKey::Ride(ride("r-1")),
        ]);

        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].connection_id, id);
    }

    #[test]
    fn attach_registers_system_subscriber_without_user() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(8);

        registry.attach(id, SystemGroup::RideMatching, tx);

        assert_eq!(registry.group_size(&GroupKey::RideMatching), 1);
        assert_eq!(registry.user_count(), 0);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn user_ride_helpers_follow_live_connection() {
        let registry = ConnectionRegistry::new();
        let passenger = user("p-1", Role::Passenger);
        let id = ConnectionId::new();
        let (tx, _rx) = channel();

        assert!(!registry.join_user_to_ride(&passenger.id, &ride("r-1")));

        registry.admit(id, &passenger, tx);
        assert!(registry.join_user_to_ride(&passenger.id, &ride("r-1")));
        assert!(registry.remove_user_from_ride(&passenger.id, &ride("r-1")));
        assert_eq!(registry.group_size(&GroupKey::Ride(ride("r-1"))), 0);
    }
}
