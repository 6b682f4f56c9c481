//! Reflector-backed Cluster Cache
//!
//! Mirrors Pods, PersistentVolumes, PersistentVolumeClaims and Nodes into
//! local kube-runtime stores. Each store flags itself synced once its first
//! full listing has been applied.

use crate::domain::ports::{ClusterCache, ResourceKind};
use crate::error::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cluster cache fed by kube watchers
pub struct KubeCache {
    pods: Store<Pod>,
    persistent_volumes: Store<PersistentVolume>,
    persistent_volume_claims: Store<PersistentVolumeClaim>,
    nodes: Store<Node>,
    synced: [Arc<AtomicBool>; 4],
    tasks: Vec<JoinHandle<()>>,
}

impl KubeCache {
    /// Start watching the cluster; the returned cache fills in the background
    pub fn start(client: Client) -> Arc<Self> {
        let synced: [Arc<AtomicBool>; 4] = Default::default();

        let (pods, pods_task) =
            spawn_reflector(Api::<Pod>::all(client.clone()), synced[0].clone());
        let (persistent_volumes, pvs_task) = spawn_reflector(
            Api::<PersistentVolume>::all(client.clone()),
            synced[1].clone(),
        );
        let (persistent_volume_claims, pvcs_task) = spawn_reflector(
            Api::<PersistentVolumeClaim>::all(client.clone()),
            synced[2].clone(),
        );
        let (nodes, nodes_task) = spawn_reflector(Api::<Node>::all(client), synced[3].clone());

        info!("Cluster cache watchers started");

        Arc::new(Self {
            pods,
            persistent_volumes,
            persistent_volume_claims,
            nodes,
            synced,
            tasks: vec![pods_task, pvs_task, pvcs_task, nodes_task],
        })
    }

    fn flag(&self, kind: ResourceKind) -> &AtomicBool {
        let index = match kind {
            ResourceKind::Pod => 0,
            ResourceKind::PersistentVolume => 1,
            ResourceKind::PersistentVolumeClaim => 2,
            ResourceKind::Node => 3,
        };
        &self.synced[index]
    }
}

impl Drop for KubeCache {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl ClusterCache for KubeCache {
    fn list_pods(&self) -> Result<Vec<Arc<Pod>>> {
        Ok(self.pods.state())
    }

    fn list_persistent_volumes(&self) -> Result<Vec<Arc<PersistentVolume>>> {
        Ok(self.persistent_volumes.state())
    }

    fn get_persistent_volume(&self, name: &str) -> Result<Option<Arc<PersistentVolume>>> {
        Ok(self.persistent_volumes.get(&ObjectRef::new(name)))
    }

    fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<PersistentVolumeClaim>>> {
        Ok(self
            .persistent_volume_claims
            .get(&ObjectRef::new(name).within(namespace)))
    }

    fn get_node(&self, name: &str) -> Result<Option<Arc<Node>>> {
        Ok(self.nodes.get(&ObjectRef::new(name)))
    }

    fn has_synced(&self, kind: ResourceKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }
}

/// Run a reflector for `K` until the task is aborted
fn spawn_reflector<K>(api: Api<K>, synced: Arc<AtomicBool>) -> (Store<K>, JoinHandle<()>)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let kind = K::kind(&()).to_string();
    let stream = reflector::reflector(
        writer,
        watcher(api, watcher::Config::default()).default_backoff(),
    );

    let handle = tokio::spawn(async move {
        futures::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Restarted(objects)) => {
                    if !synced.swap(true, Ordering::AcqRel) {
                        info!(kind = %kind, count = objects.len(), "Initial listing synced");
                    } else {
                        debug!(kind = %kind, count = objects.len(), "Watch restarted");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Watcher error, will retry");
                }
            }
        }

        warn!(kind = %kind, "Watch stream exited unexpectedly");
    });

    (reader, handle)
}
