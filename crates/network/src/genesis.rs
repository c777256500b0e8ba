use ab_common::RunConfig;
use ab_topology::ConfigSynthesizer;
use regex::Regex;
use std::sync::LazyLock;

static CONSENSUS_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(max_trans_num|epoch_sealer_num|consensus_timeout|epoch_block_num)\s*=")
        .unwrap()
});
static CONSENSUS_NODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*node\.(\d+)\s*=").unwrap());
static BANDWIDTH_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*;?\s*outgoing_bandwidth_limit\s*=").unwrap());

/// Rewrite a group genesis file for one run.
///
/// Consensus parameters take the run's values and every `node.<k>=` entry
/// whose global index is not a sealer is dropped.
pub fn rewrite_genesis(content: &str, config: &RunConfig, topology: &ConfigSynthesizer) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if let Some(caps) = CONSENSUS_PARAM.captures(line) {
            let value = match &caps[1] {
                "max_trans_num" => config.block_tx_num.to_string(),
                "epoch_sealer_num" => config.epoch_sealer_num.to_string(),
                "consensus_timeout" => config.consensus_timeout.to_string(),
                _ => config.epoch_block_num.to_string(),
            };
            out.push_str(&format!("    {}={}\n", &caps[1], value));
            continue;
        }
        if let Some(caps) = CONSENSUS_NODE.captures(line) {
            let keep = caps[1]
                .parse::<usize>()
                .map(|index| topology.is_sealer(index))
                .unwrap_or(false);
            if !keep {
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Enable the outgoing bandwidth limit of a node `config.ini`; a zero limit leaves it untouched
pub fn rewrite_node_ini(content: &str, limit: u64) -> String {
    if limit == 0 {
        return content.to_string();
    }
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if BANDWIDTH_LIMIT.is_match(line) {
            out.push_str(&format!("    outgoing_bandwidth_limit={}\n", limit));
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
