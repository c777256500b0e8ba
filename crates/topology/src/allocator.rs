use ab_common::{Error, Result, RunConfig};
use serde::Serialize;

/// Split `total` units across `hosts` as evenly as possible.
///
/// Every entry is `total / hosts` or one more; the last `total % hosts`
/// hosts receive the extra unit.
pub fn allocate(total: usize, hosts: usize) -> Result<Vec<usize>> {
    if hosts == 0 {
        return Err(Error::InvalidArgument(
            "cannot allocate across zero hosts".to_string(),
        ));
    }

    let base = total / hosts;
    let remainder = total % hosts;
    let mut assigned = vec![base; hosts - remainder];
    assigned.extend(std::iter::repeat(base + 1).take(remainder));
    Ok(assigned)
}

/// Per-host node and sealer counts of one run
///
/// Computed once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    nodes_per_host: Vec<usize>,
    sealers_per_host: Vec<usize>,
}

impl Allocation {
    pub fn for_run(config: &RunConfig) -> Result<Self> {
        let hosts = config.host_count();
        Ok(Self {
            nodes_per_host: allocate(config.node_count, hosts)?,
            sealers_per_host: allocate(config.sealer_count, hosts)?,
        })
    }

    /// Build an allocation from explicit per-host counts
    pub fn from_parts(nodes_per_host: Vec<usize>, sealers_per_host: Vec<usize>) -> Self {
        Self {
            nodes_per_host,
            sealers_per_host,
        }
    }

    pub fn nodes_per_host(&self) -> &[usize] {
        &self.nodes_per_host
    }

    pub fn sealers_per_host(&self) -> &[usize] {
        &self.sealers_per_host
    }

    pub fn node_count(&self) -> usize {
        self.nodes_per_host.iter().sum()
    }

    pub fn sealer_count(&self) -> usize {
        self.sealers_per_host.iter().sum()
    }
}
