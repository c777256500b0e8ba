use ab_topology::{node_name, ConfigSynthesizer, HostLayout, PortLayout};

/// Chain generator input: one `host:count agency group p2p,channel,rpc` line per host
pub fn ipconfig(topology: &ConfigSynthesizer, agency: &str, group: u32, ports: &PortLayout) -> String {
    topology
        .hosts()
        .iter()
        .zip(topology.nodes_per_host())
        .map(|(host, nodes)| {
            format!(
                "{}:{} {} {} {},{},{}\n",
                host, nodes, agency, group, ports.p2p_base, ports.channel_base, ports.rpc_base
            )
        })
        .collect()
}

/// Operator scripts starting and stopping every node container through the hosts' Docker daemons
pub fn docker_scripts(
    topology: &ConfigSynthesizer,
    ports: &PortLayout,
    layout: &HostLayout,
) -> (String, String) {
    let mut start = String::from("#!/bin/bash\n");
    let mut stop = String::from("#!/bin/bash\n");
    for slot in topology.slots() {
        let endpoint = layout.docker_endpoint(&slot.host);
        let name = node_name(slot.local_index);
        let p2p = ports.p2p_port(slot.local_index);
        let channel = ports.channel_port(slot.local_index);
        let rpc = ports.rpc_port(slot.local_index);
        start.push_str(&format!(
            "docker -H {endpoint} run -d --rm --name {name} -v {dir}/:/data \
             -p {p2p}:{p2p} -p {channel}:{channel} -p {rpc}:{rpc} -w=/data {image} -c config.ini \
             1> /dev/null && echo \"remote {host} container {name} started\"\n",
            dir = layout.remote_node_dir(&slot.host, slot.local_index),
            image = layout.node_image,
            host = slot.host,
        ));
        stop.push_str(&format!(
            "docker -H {endpoint} stop {name} 1> /dev/null && echo \"remote {host} container {name} stopped\"\n",
            host = slot.host,
        ));
    }
    (start, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_common::RunConfig;
    use ab_topology::plan_topology;

    #[test]
    fn test_ipconfig_lines() {
        let config = RunConfig::new(5, 3, vec!["10.0.0.1".into(), "10.0.0.2".into()]);
        let (_, topology) = plan_topology(&config).unwrap();
        assert_eq!(
            ipconfig(&topology, "dfface", 1, &PortLayout::default()),
            "10.0.0.1:2 dfface 1 30300,20200,8545\n10.0.0.2:3 dfface 1 30300,20200,8545\n"
        );
    }

    #[test]
    fn test_docker_scripts_cover_every_slot() {
        let config = RunConfig::new(3, 1, vec!["h1".into(), "h2".into()]);
        let (_, topology) = plan_topology(&config).unwrap();
        let (start, stop) = docker_scripts(&topology, &PortLayout::default(), &HostLayout::default());

        assert_eq!(start.lines().count(), 4);
        assert_eq!(stop.lines().count(), 4);
        assert!(start.contains(
            "docker -H h2:2375 run -d --rm --name node1 -v /data/nodes/h2/node1/:/data \
             -p 30301:30301 -p 20201:20201 -p 8546:8546"
        ));
        assert!(stop.contains("docker -H h1:2375 stop node0"));
    }
}
