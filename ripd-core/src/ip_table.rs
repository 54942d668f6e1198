//! The routing table: a bounded set of routes with longest-prefix-match
//! lookup.

use std::{collections::BTreeMap, fmt};

use thiserror::Error as ThisError;

use crate::{
    hal::PciSlot,
    protocols::ipv4::{
        subnetting::{Ipv4Mask, Ipv4Net},
        Ipv4Address,
    },
};

/// How many routes a table holds unless told otherwise.
pub const DEFAULT_CAPACITY: usize = 100;

/// Metric of a route to a directly connected network.
pub const DIRECT_METRIC: u32 = 1;

/// A routing table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    /// The destination network. Only its prefix bits can be nonzero.
    pub net: Ipv4Net,
    /// The interface packets for this network leave through
    pub slot: PciSlot,
    /// The router to hand packets to, or `None` when the network is directly
    /// reachable on `slot`
    pub next_hop: Option<Ipv4Address>,
    /// Hop count, from 1 to 16
    pub metric: u32,
}

impl Route {
    pub fn new(net: Ipv4Net, slot: PciSlot, next_hop: Option<Ipv4Address>, metric: u32) -> Self {
        Self {
            net,
            slot,
            next_hop,
            metric,
        }
    }

    /// A route to a network attached to one of our own interfaces.
    pub fn direct(net: Ipv4Net, slot: PciSlot) -> Self {
        Self::new(net, slot, None, DIRECT_METRIC)
    }

    pub fn prefix(&self) -> Ipv4Address {
        self.net.id()
    }

    pub fn prefix_len(&self) -> u32 {
        self.net.prefix_len()
    }

    pub fn is_direct(&self) -> bool {
        self.next_hop.is_none()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let next_hop = match self.next_hop {
            Some(next_hop) => next_hop.to_string(),
            None => "direct".to_string(),
        };
        write!(f, "{}\t{}\t{}\t{}", self.net, self.slot, next_hop, self.metric)
    }
}

/// Holds at most one [`Route`] per network and finds the most specific route
/// for an address.
///
/// Routes are keyed by network, and a count of routes per mask is kept so a
/// lookup only has to try the mask lengths actually in use, longest first.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    table: BTreeMap<Ipv4Net, Route>,
    masks: BTreeMap<Ipv4Mask, u32>,
    capacity: usize,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Default::default(),
            masks: Default::default(),
            capacity,
        }
    }

    /// Stores `route`, overwriting the route for the same network if there is
    /// one. Returns the route that was replaced.
    ///
    /// Adding a new network to a full table fails and leaves the table as it
    /// was.
    pub fn insert_or_replace(&mut self, route: Route) -> Result<Option<Route>, TableError> {
        if let Some(existing) = self.table.get_mut(&route.net) {
            return Ok(Some(std::mem::replace(existing, route)));
        }
        if self.table.len() >= self.capacity {
            return Err(TableError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.table.insert(route.net, route);
        *self.masks.entry(route.net.mask()).or_insert(0) += 1;
        Ok(None)
    }

    /// Removes the route for `net`, if present.
    pub fn delete(&mut self, net: Ipv4Net) -> Option<Route> {
        let removed = self.table.remove(&net)?;
        if let Some(count) = self.masks.get_mut(&net.mask()) {
            *count -= 1;
            if *count == 0 {
                self.masks.remove(&net.mask());
            }
        }
        Some(removed)
    }

    /// Gets the route for exactly `net`.
    pub fn get(&self, net: Ipv4Net) -> Option<&Route> {
        self.table.get(&net)
    }

    /// Gets the route with the longest prefix that contains `address`.
    pub fn lookup(&self, address: Ipv4Address) -> Option<&Route> {
        self.masks
            .keys()
            .rev()
            .find_map(|mask| self.table.get(&Ipv4Net::new(address, *mask)))
    }

    /// Every route in the table. The order is unspecified and may change
    /// whenever the table does.
    pub fn entries(&self) -> impl Iterator<Item = &Route> + Clone + '_ {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "network\tslot\tnext hop\tmetric")?;
        self.entries()
            .try_for_each(|route| writeln!(f, "{}", route))
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("The routing table is full ({capacity} routes)")]
    CapacityExceeded { capacity: usize },
}
