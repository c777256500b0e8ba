mod utils;

use ab_topology::{node_name, HostLayout, PortLayout};
use anyhow::{Context, Result};
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::DockerConfig;
use crate::NodeRuntime;
use utils::{exposed_ports, is_node_container, is_settled, port_bindings, split_image};

/// Node runtime driving each host's Docker daemon over TCP
#[derive(Debug, Clone)]
pub struct DockerNodeRuntime {
    config: DockerConfig,
    layout: HostLayout,
    ports: PortLayout,
}

impl DockerNodeRuntime {
    pub fn new(config: DockerConfig, layout: HostLayout, ports: PortLayout) -> Self {
        Self {
            config,
            layout,
            ports,
        }
    }

    fn connect(&self, host: &str) -> Result<Docker> {
        let address = format!("http://{}", self.layout.docker_endpoint(host));
        Docker::connect_with_http(&address, self.config.timeout, API_DEFAULT_VERSION)
            .with_context(|| format!("Failed to connect to Docker daemon at {}", address))
    }

    /// Container definition of one node slot
    pub fn node_config(&self, host: &str, local_index: usize) -> Config<String> {
        let ports = [
            self.ports.p2p_port(local_index),
            self.ports.channel_port(local_index),
            self.ports.rpc_port(local_index),
        ];
        Config {
            image: Some(self.layout.node_image.clone()),
            cmd: Some(vec!["-c".to_string(), "config.ini".to_string()]),
            working_dir: Some("/data".to_string()),
            exposed_ports: Some(exposed_ports(&ports)),
            host_config: Some(HostConfig {
                binds: Some(vec![format!(
                    "{}/:/data",
                    self.layout.remote_node_dir(host, local_index)
                )]),
                port_bindings: Some(port_bindings(&ports)),
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn ensure_image(&self, docker: &Docker, host: &str) -> Result<()> {
        let image = &self.layout.node_image;
        if docker.inspect_image(image).await.is_ok() {
            debug!("[DOCKER] {} already has image {}", host, image);
            return Ok(());
        }

        let (from_image, tag) = split_image(image);
        info!("[DOCKER] Pulling image {}:{} on {}", from_image, tag, host);
        let stream = docker.create_image(
            Some(CreateImageOptions {
                from_image: from_image.to_string(),
                tag: tag.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );
        tokio::pin!(stream);
        while let Some(progress) = stream.try_next().await? {
            if let Some(status) = progress.status {
                if status.contains("Downloaded newer image") || status.contains("up to date") {
                    info!("[DOCKER] {}: {}", host, status);
                }
            }
        }
        Ok(())
    }

    async fn remove_container(&self, docker: &Docker, name: &str) -> Result<()> {
        match docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_settled(&e, &[404, 409]) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl NodeRuntime for DockerNodeRuntime {
    async fn start_node(&self, host: &str, local_index: usize) -> Result<()> {
        let docker = self.connect(host)?;
        let name = node_name(local_index);
        self.ensure_image(&docker, host).await?;

        // A leftover container would hold the name and ports.
        self.remove_container(&docker, &name).await?;

        docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    ..Default::default()
                }),
                self.node_config(host, local_index),
            )
            .await
            .with_context(|| format!("Failed to create {} on {}", name, host))?;
        docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await
            .with_context(|| format!("Failed to start {} on {}", name, host))?;

        info!("[DOCKER] Remote {} container {} started", host, name);
        Ok(())
    }

    async fn stop_nodes(&self, host: &str) -> Result<usize> {
        let docker = self.connect(host)?;
        let containers = docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters: HashMap::from([("name".to_string(), vec!["node".to_string()])]),
                ..Default::default()
            }))
            .await
            .with_context(|| format!("Failed to list containers on {}", host))?;

        let mut stopped = 0;
        for container in containers {
            let names = container.names.unwrap_or_default();
            if !is_node_container(&names) {
                continue;
            }
            let Some(id) = container.id else {
                continue;
            };
            match docker
                .stop_container(
                    &id,
                    Some(StopContainerOptions {
                        t: self.config.stop_grace,
                    }),
                )
                .await
            {
                Ok(()) => {}
                Err(e) if is_settled(&e, &[304, 404]) => {}
                Err(e) => return Err(e.into()),
            }
            self.remove_container(&docker, &id).await?;
            debug!("[DOCKER] Remote {} container {:?} stopped", host, names);
            stopped += 1;
        }

        info!("[DOCKER] Stopped {} node containers on {}", stopped, host);
        Ok(stopped)
    }
}
