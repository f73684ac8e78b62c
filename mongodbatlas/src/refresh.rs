//! Refresh functions handed to the poller and the dependents gate

use futures::future::BoxFuture;
use tfretry::{Observation, RefreshError};

use crate::api::clusters::{AdvancedCluster, Cluster};
use crate::api::Client;
use crate::state::ClusterState;

pub type ClusterObservation = Observation<Cluster, ClusterState>;

/// Reads one cluster and reports its `stateName`
pub async fn refresh_cluster(
    client: &Client,
    project_id: &str,
    name: &str,
) -> Result<ClusterObservation, RefreshError> {
    let cluster = match client.clusters().get(project_id, name).await {
        Ok(cluster) => cluster,
        Err(e) => {
            tracing::debug!("Refresh of cluster {} failed: {}", name, e);
            return Err(e.into());
        }
    };

    match cluster.state_name.clone() {
        Some(state) => {
            tracing::debug!("status for MongoDB cluster {}: {}", name, state);
            Ok(Observation::new(cluster, state))
        }
        None => {
            tracing::debug!("MongoDB cluster {} reported no state", name);
            Ok(Observation::unknown(cluster))
        }
    }
}

/// Refresh closure for waits on a single cluster
pub fn cluster_refresh<'a>(
    client: &'a Client,
    project_id: &'a str,
    name: &'a str,
) -> impl FnMut() -> BoxFuture<'a, Result<ClusterObservation, RefreshError>> + 'a {
    move || Box::pin(refresh_cluster(client, project_id, name))
}

/// Lists every cluster of a project, the dependents checked before the
/// project is deleted
pub fn project_dependents_lister<'a>(
    client: &'a Client,
    project_id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, Result<Vec<AdvancedCluster>, RefreshError>> + 'a {
    move || {
        Box::pin(async move {
            let clusters = client.advanced_clusters().list_all(project_id).await?;
            Ok::<_, RefreshError>(clusters)
        })
    }
}
