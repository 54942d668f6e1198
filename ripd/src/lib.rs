//! `ripd` runs a RIP version 2 router whose interfaces are UDP tunnels, so a
//! small network of routers can be built out of processes on one machine.
//!
//! See [`config`] for the configuration file and [`udp_link`] for how frames
//! travel between routers.

pub mod cli;
pub mod config;
pub mod udp_link;
