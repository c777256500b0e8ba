use bollard::errors::Error;
use bollard::models::{PortBinding, PortMap};
use std::collections::HashMap;

pub fn tcp_port(p: u16) -> String {
    format!("{}/tcp", p)
}

/// Publish each port on the same host port, on every interface
pub fn port_bindings(ports: &[u16]) -> PortMap {
    ports
        .iter()
        .map(|&port| {
            (
                tcp_port(port),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(port.to_string()),
                }]),
            )
        })
        .collect()
}

pub fn exposed_ports(ports: &[u16]) -> HashMap<String, HashMap<(), ()>> {
    ports
        .iter()
        .map(|&port| (tcp_port(port), HashMap::new()))
        .collect()
}

/// Split an image reference into repository and tag, defaulting to `latest`.
///
/// A `:` before the last `/` belongs to a registry port, not a tag.
pub fn split_image(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, tag),
        _ => (image, "latest"),
    }
}

/// Container names reported by the daemon carry a leading `/`
pub fn is_node_container(names: &[String]) -> bool {
    names.iter().any(|name| {
        name.trim_start_matches('/')
            .strip_prefix("node")
            .is_some_and(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Daemon replies meaning the container is already in the requested state
pub fn is_settled(err: &Error, codes: &[u16]) -> bool {
    matches!(err, Error::DockerResponseServerError { status_code, .. } if codes.contains(status_code))
}
