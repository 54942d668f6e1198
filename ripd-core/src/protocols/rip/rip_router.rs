use super::{
    rip_parsing::{Command, RipEntry, RipPacket},
    INFINITY, MAX_ENTRIES,
};
use crate::{
    hal::PciSlot,
    ip_table::{Route, RoutingTable, TableError},
    protocols::ipv4::{subnetting::Ipv4Net, Ipv4Address},
};
use std::cmp::min;
use tracing::{debug, info, warn};

/// What a received advertisement did to the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChange {
    /// A route to a previously unknown network
    Installed(Route),
    /// A known route got a new metric, interface or next hop
    Updated { old: Route, new: Route },
    /// The neighbor we route through can no longer reach the network
    Withdrawn(Route),
    /// A route that should have been installed did not fit
    Rejected { net: Ipv4Net, error: TableError },
}

/// The distance-vector half of a RIP router. Owns the routing table, builds
/// the advertisements sent to neighbors and applies the ones received from
/// them.
#[derive(Debug, Clone, Default)]
pub struct RipRouter {
    table: RoutingTable,
}

impl RipRouter {
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Adds a route to a network attached to interface `slot`.
    pub fn add_direct_route(
        &mut self,
        net: Ipv4Net,
        slot: PciSlot,
    ) -> Result<Option<Route>, TableError> {
        self.table.insert_or_replace(Route::direct(net, slot))
    }

    /// The Responses to send out of interface `slot`. Routes that leave
    /// through `slot` are left out so a neighbor is never told about routes it
    /// taught us (split horizon).
    ///
    /// Always returns at least one packet, even when there is nothing to
    /// advertise.
    pub fn advertisement_for(&self, slot: PciSlot) -> Vec<RipPacket> {
        let entries: Vec<RipEntry> = self
            .table
            .entries()
            .filter(|route| route.slot != slot)
            .map(|route| {
                RipEntry::new(
                    route.prefix(),
                    route.net.mask(),
                    route.next_hop.unwrap_or(Ipv4Address::UNSPECIFIED),
                    route.metric,
                )
            })
            .collect();

        if entries.is_empty() {
            return vec![RipPacket::new_response(vec![])];
        }
        entries
            .chunks(MAX_ENTRIES)
            .map(|chunk| RipPacket::new_response(chunk.to_vec()))
            .collect()
    }

    /// Answers a Request that arrived on interface `slot`. Every request is
    /// answered with the whole table, less what split horizon holds back.
    pub fn process_request(&self, slot: PciSlot) -> Vec<RipPacket> {
        self.advertisement_for(slot)
    }

    /// Applies the entries of a Response sent by `neighbor` and received on
    /// interface `slot`, in order.
    pub fn process_response(
        &mut self,
        neighbor: Ipv4Address,
        slot: PciSlot,
        packet: &RipPacket,
    ) -> Vec<RouteChange> {
        if packet.command != Command::Response {
            warn!("Ignoring a {:?} handed over as a response", packet.command);
            return vec![];
        }

        let mut changes = Vec::new();
        for entry in packet.entries.iter() {
            let net = entry.network();
            // cost through the neighbor is one more hop than its own cost
            let metric = min(entry.metric.saturating_add(1), INFINITY);
            let candidate = Route::new(net, slot, Some(neighbor), metric);

            let change = match self.table.get(net).copied() {
                Some(existing) if existing.slot == slot => {
                    if metric == INFINITY {
                        self.table.delete(net);
                        Some(RouteChange::Withdrawn(existing))
                    } else {
                        self.replace(existing, candidate)
                    }
                }
                Some(existing) => {
                    if metric < existing.metric {
                        self.replace(existing, candidate)
                    } else {
                        None
                    }
                }
                None if metric < INFINITY => match self.table.insert_or_replace(candidate) {
                    Ok(_) => Some(RouteChange::Installed(candidate)),
                    Err(error) => Some(RouteChange::Rejected { net, error }),
                },
                None => None,
            };

            if let Some(change) = change {
                match change {
                    RouteChange::Installed(route) => {
                        info!(net = %route.net, %neighbor, slot, metric = route.metric, "Installed route")
                    }
                    RouteChange::Updated { new, .. } => {
                        debug!(net = %new.net, %neighbor, slot, metric = new.metric, "Updated route")
                    }
                    RouteChange::Withdrawn(route) => {
                        info!(net = %route.net, %neighbor, slot, "Withdrew route")
                    }
                    RouteChange::Rejected { net, error } => {
                        warn!(%net, %neighbor, "Could not install route: {}", error)
                    }
                }
                changes.push(change);
            }
        }
        changes
    }

    /// Overwrites a route in place. Replacing never needs room in the table.
    fn replace(&mut self, old: Route, new: Route) -> Option<RouteChange> {
        match self.table.insert_or_replace(new) {
            Ok(_) if old == new => None,
            Ok(_) => Some(RouteChange::Updated { old, new }),
            Err(error) => Some(RouteChange::Rejected {
                net: new.net,
                error,
            }),
        }
    }
}
