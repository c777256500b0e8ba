//! Node and sealer placement for benchmark networks
//!
//! [`allocate`] spreads nodes and sealers across hosts, and
//! [`ConfigSynthesizer`] turns the resulting [`Allocation`] into the one view
//! of sealer membership shared by the genesis rewrite and the network
//! description handed to the workload driver.

pub mod allocator;
pub mod layout;
pub mod synthesizer;

use ab_common::{Result, RunConfig};

pub use allocator::{allocate, Allocation};
pub use layout::{node_name, HostLayout, PortLayout};
pub use synthesizer::{ConfigSynthesizer, NodeSlot, SealerEndpoint};

/// Allocate and synthesize the topology of a run
pub fn plan_topology(config: &RunConfig) -> Result<(Allocation, ConfigSynthesizer)> {
    let allocation = Allocation::for_run(config)?;
    let synthesizer = ConfigSynthesizer::new(&config.hosts, &allocation)?;
    Ok((allocation, synthesizer))
}
