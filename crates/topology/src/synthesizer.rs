use ab_common::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::allocator::Allocation;
use crate::layout::PortLayout;

/// A node position: host, slot on that host, and global index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSlot {
    pub host_index: usize,
    pub host: String,
    pub local_index: usize,
    pub global_index: usize,
}

/// Address the workload driver uses to reach a sealer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealerEndpoint {
    pub host: String,
    pub rpc_port: u16,
    pub channel_port: u16,
}

/// Single source of sealer membership for every generated artifact
///
/// Global indices are assigned by walking hosts in order and, within a host,
/// local slots `0..nodes_per_host[i]`. Sealers are the first
/// `sealers_per_host[i]` slots of each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSynthesizer {
    hosts: Vec<String>,
    nodes_per_host: Vec<usize>,
    sealers_per_host: Vec<usize>,
    sealer_set: BTreeSet<usize>,
}

impl ConfigSynthesizer {
    pub fn new(hosts: &[String], allocation: &Allocation) -> Result<Self> {
        let nodes_per_host = allocation.nodes_per_host();
        let sealers_per_host = allocation.sealers_per_host();

        if nodes_per_host.len() != hosts.len() || sealers_per_host.len() != hosts.len() {
            return Err(Error::ConfigInconsistent(format!(
                "allocation covers {} node hosts and {} sealer hosts, expected {}",
                nodes_per_host.len(),
                sealers_per_host.len(),
                hosts.len()
            )));
        }

        let mut sealer_set = BTreeSet::new();
        let mut next_global = 0;
        for (host_index, (&nodes, &sealers)) in
            nodes_per_host.iter().zip(sealers_per_host).enumerate()
        {
            if sealers > nodes {
                return Err(Error::ConfigInconsistent(format!(
                    "host {} ({}) is assigned {} sealers but only {} nodes",
                    host_index, hosts[host_index], sealers, nodes
                )));
            }
            sealer_set.extend(next_global..next_global + sealers);
            next_global += nodes;
        }

        debug!(
            nodes = ?nodes_per_host,
            sealers = ?sealers_per_host,
            sealer_set = ?sealer_set,
            "Synthesized sealer set"
        );

        Ok(Self {
            hosts: hosts.to_vec(),
            nodes_per_host: nodes_per_host.to_vec(),
            sealers_per_host: sealers_per_host.to_vec(),
            sealer_set,
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn nodes_per_host(&self) -> &[usize] {
        &self.nodes_per_host
    }

    pub fn node_count(&self) -> usize {
        self.nodes_per_host.iter().sum()
    }

    pub fn sealer_count(&self) -> usize {
        self.sealer_set.len()
    }

    pub fn sealer_set(&self) -> &BTreeSet<usize> {
        &self.sealer_set
    }

    pub fn is_sealer(&self, global_index: usize) -> bool {
        self.sealer_set.contains(&global_index)
    }

    /// Every node slot in global index order
    pub fn slots(&self) -> impl Iterator<Item = NodeSlot> + '_ {
        let mut next_global = 0;
        self.hosts
            .iter()
            .zip(&self.nodes_per_host)
            .enumerate()
            .flat_map(move |(host_index, (host, &nodes))| {
                let first = next_global;
                next_global += nodes;
                (0..nodes).map(move |local_index| NodeSlot {
                    host_index,
                    host: host.clone(),
                    local_index,
                    global_index: first + local_index,
                })
            })
    }

    /// Node slots placed on one host
    pub fn host_slots(&self, host_index: usize) -> impl Iterator<Item = NodeSlot> + '_ {
        self.slots().filter(move |slot| slot.host_index == host_index)
    }

    /// Sealer endpoints in global index order, at most `sealer_count` of them
    pub fn sealer_endpoints(&self, ports: &PortLayout) -> Vec<SealerEndpoint> {
        self.slots()
            .filter(|slot| self.is_sealer(slot.global_index))
            .take(self.sealer_count())
            .map(|slot| SealerEndpoint {
                rpc_port: ports.rpc_port(slot.local_index),
                channel_port: ports.channel_port(slot.local_index),
                host: slot.host,
            })
            .collect()
    }
}
