//! Active-ride index.
//!
//! Maps each active ride to its passenger/driver pair and keeps the reverse
//! user → rides index so location relay never scans every ride. Mutated
//! only through the hub's `add_active_ride`/`remove_active_ride`; the event
//! router only reads.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{RideId, Role, UserId};
use crate::domain::ride::ActiveRide;

#[derive(Default)]
struct IndexState {
    rides: HashMap<RideId, ActiveRide>,
    by_user: HashMap<UserId, BTreeSet<RideId>>,
}

impl IndexState {
    fn unindex(&mut self, ride: &ActiveRide) {
        for user in ride.participants() {
            if let Some(rides) = self.by_user.get_mut(user) {
                rides.remove(&ride.ride_id);
                if rides.is_empty() {
                    self.by_user.remove(user);
                }
            }
        }
    }
}

#[derive(Default)]
pub struct ActiveRideIndex {
    state: RwLock<IndexState>,
}

impl ActiveRideIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a ride. Returns the record it replaced.
    pub fn add(&self, ride: ActiveRide) -> Option<ActiveRide> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let replaced = state.rides.remove(&ride.ride_id);
        if let Some(old) = &replaced {
            state.unindex(old);
        }

        for user in ride.participants() {
            state
                .by_user
                .entry(user.clone())
                .or_default()
                .insert(ride.ride_id.clone());
        }
        state.rides.insert(ride.ride_id.clone(), ride);

        replaced
    }

    /// Removes a ride. Returns `None` if it was not active.
    pub fn remove(&self, ride_id: &RideId) -> Option<ActiveRide> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let ride = state.rides.remove(ride_id)?;
        state.unindex(&ride);
        Some(ride)
    }

    /// Every active ride the user takes part in, in either role.
    pub fn rides_for(&self, user_id: &UserId) -> BTreeSet<RideId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_user
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Active rides where the user holds the given role.
    pub fn rides_as(&self, user_id: &UserId, role: Role) -> Vec<RideId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(ride_ids) = state.by_user.get(user_id) else {
            return Vec::new();
        };
        ride_ids
            .iter()
            .filter(|id| {
                state
                    .rides
                    .get(*id)
                    .is_some_and(|ride| ride.has_participant(user_id, role))
            })
            .cloned()
            .collect()
    }

    pub fn get(&self, ride_id: &RideId) -> Option<ActiveRide> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rides
            .get(ride_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rides
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
