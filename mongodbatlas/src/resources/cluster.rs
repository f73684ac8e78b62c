//! Cluster resource operations
//!
//! Every mutating call is followed by a wait on the cluster's `stateName`
//! until Atlas reports the change as applied.

use std::time::Duration;
use tfretry::{Context, PollResult, StateChangeConf};

use super::{OperationTimeouts, ResourceError};
use crate::api::clusters::{Cluster, ProcessArgs};
use crate::provider_data::AtlasProviderData;
use crate::refresh::cluster_refresh;
use crate::state::ClusterState;

const PAUSED_CLUSTER_ERROR: &str = "CANNOT_UPDATE_PAUSED_CLUSTER";

fn create_conf(timeout: Duration) -> StateChangeConf<ClusterState> {
    StateChangeConf::new(
        [
            ClusterState::Creating,
            ClusterState::Updating,
            ClusterState::Repairing,
            ClusterState::Repeating,
            ClusterState::Pending,
        ],
        [ClusterState::Idle],
    )
    .timeout(timeout)
    .min_timeout(Duration::from_secs(60))
    .delay(Duration::from_secs(3 * 60))
}

fn update_conf(timeout: Duration) -> StateChangeConf<ClusterState> {
    StateChangeConf::new(
        [
            ClusterState::Creating,
            ClusterState::Updating,
            ClusterState::Repairing,
        ],
        [ClusterState::Idle],
    )
    .timeout(timeout)
    .min_timeout(Duration::from_secs(30))
    .delay(Duration::from_secs(60))
}

fn delete_conf(timeout: Duration) -> StateChangeConf<ClusterState> {
    StateChangeConf::new(
        [
            ClusterState::Idle,
            ClusterState::Creating,
            ClusterState::Updating,
            ClusterState::Repairing,
            ClusterState::Deleting,
        ],
        [ClusterState::Deleted],
    )
    .timeout(timeout)
    .min_timeout(Duration::from_secs(30))
    .delay(Duration::from_secs(60))
}

/// Shared tiers cannot be paused and are resized through a tenant upgrade
pub fn is_shared_tier(instance_size: &str) -> bool {
    matches!(instance_size, "M0" | "M2" | "M5")
}

fn cluster_label(name: &str) -> String {
    format!("cluster ({})", name)
}

/// Requested changes to an existing cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterUpdate {
    /// Changed attributes only; unset fields are left untouched
    pub changes: Cluster,
    /// Instance size deployed before this update
    pub current_instance_size: Option<String>,
    pub advanced_configuration: Option<ProcessArgs>,
    pub paused: Option<bool>,
}

impl ClusterUpdate {
    /// Moving off a shared tier requires a tenant upgrade instead of a PATCH
    pub fn is_upgrade(&self) -> bool {
        match (
            self.current_instance_size.as_deref(),
            self.changes.instance_size_name(),
        ) {
            (Some(current), Some(updated)) => current != updated && is_shared_tier(current),
            _ => false,
        }
    }

    fn target_instance_size(&self) -> Option<&str> {
        self.changes
            .instance_size_name()
            .or(self.current_instance_size.as_deref())
    }
}

pub struct ClusterResource {
    provider_data: AtlasProviderData,
}

impl ClusterResource {
    pub fn new(provider_data: AtlasProviderData) -> Self {
        Self { provider_data }
    }

    /// Creates the cluster and waits until it is `IDLE`
    ///
    /// Advanced configuration and pausing are applied once the cluster is
    /// running, as Atlas rejects both at creation time.
    pub async fn create(
        &self,
        ctx: &Context,
        project_id: &str,
        request: &Cluster,
        advanced_configuration: Option<&ProcessArgs>,
        timeouts: &OperationTimeouts,
    ) -> Result<Cluster, ResourceError> {
        let name = request
            .name
            .clone()
            .ok_or_else(|| ResourceError::InvalidRequest("cluster name is required".to_string()))?;

        let mut body = request.clone();
        let pause = body.paused.take() == Some(true);

        tracing::info!("Creating MongoDB cluster {} in project {}", name, project_id);
        self.provider_data
            .client
            .clusters()
            .create(project_id, &body)
            .await?;

        let result = self
            .wait(ctx, create_conf(timeouts.create), project_id, &name)
            .await
            .map_err(|e| ResourceError::poll("creating", cluster_label(&name), e))?;
        let mut cluster = settled(result);

        if let Some(args) = advanced_configuration.filter(|args| !args.is_empty()) {
            self.provider_data
                .client
                .clusters()
                .update_process_args(project_id, &name, args)
                .await?;
        }

        if pause {
            let request = Cluster {
                paused: Some(true),
                ..Default::default()
            };
            cluster = self
                .update_and_wait(ctx, project_id, &name, &request, timeouts.create)
                .await?;
        }

        Ok(cluster)
    }

    /// Reads the cluster; `None` when Atlas no longer knows it
    pub async fn read(&self, project_id: &str, name: &str) -> Result<Option<Cluster>, ResourceError> {
        match self.provider_data.client.clusters().get(project_id, name).await {
            Ok(cluster) => {
                tracing::debug!("GET Cluster {:?}", cluster);
                Ok(Some(cluster))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("MongoDB cluster {} not found, removing from state", name);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(
        &self,
        ctx: &Context,
        project_id: &str,
        name: &str,
        update: &ClusterUpdate,
        timeouts: &OperationTimeouts,
    ) -> Result<Option<Cluster>, ResourceError> {
        let mut latest = None;

        let mut changes = update.changes.clone();
        if update.paused == Some(false) {
            changes.paused = Some(false);
        }

        if update.is_upgrade() {
            changes.name = Some(name.to_string());
            latest = Some(self.upgrade_and_wait(ctx, project_id, name, &changes, timeouts.update).await?);
        } else if changes != Cluster::default() {
            let updated = match self
                .update_and_wait(ctx, project_id, name, &changes, timeouts.update)
                .await
            {
                Err(e) if e.error_code() == Some(PAUSED_CLUSTER_ERROR) => {
                    tracing::info!("MongoDB cluster {} is paused, resuming before update", name);
                    let resume = Cluster {
                        paused: Some(false),
                        ..Default::default()
                    };
                    self.update_and_wait(ctx, project_id, name, &resume, timeouts.update)
                        .await?;
                    self.update_and_wait(ctx, project_id, name, &changes, timeouts.update)
                        .await?
                }
                other => other?,
            };
            latest = Some(updated);
        }

        if let Some(args) = update
            .advanced_configuration
            .as_ref()
            .filter(|args| !args.is_empty())
        {
            self.provider_data
                .client
                .clusters()
                .update_process_args(project_id, name, args)
                .await?;
        }

        let shared = update.target_instance_size().is_some_and(is_shared_tier);
        if update.paused == Some(true) && !shared {
            let request = Cluster {
                paused: Some(true),
                ..Default::default()
            };
            latest = Some(
                self.update_and_wait(ctx, project_id, name, &request, timeouts.update)
                    .await?,
            );
        }

        Ok(latest)
    }

    /// Deletes the cluster and waits until Atlas reports it gone
    pub async fn delete(
        &self,
        ctx: &Context,
        project_id: &str,
        name: &str,
        retain_backups: Option<bool>,
        timeouts: &OperationTimeouts,
    ) -> Result<(), ResourceError> {
        tracing::info!("Deleting MongoDB cluster {} in project {}", name, project_id);
        self.provider_data
            .client
            .clusters()
            .delete(project_id, name, retain_backups)
            .await?;

        self.wait(ctx, delete_conf(timeouts.delete), project_id, name)
            .await
            .map_err(|e| ResourceError::poll("deleting", cluster_label(name), e))?;

        Ok(())
    }

    async fn update_and_wait(
        &self,
        ctx: &Context,
        project_id: &str,
        name: &str,
        request: &Cluster,
        timeout: Duration,
    ) -> Result<Cluster, ResourceError> {
        self.provider_data
            .client
            .clusters()
            .update(project_id, name, request)
            .await?;

        let result = self
            .wait(ctx, update_conf(timeout), project_id, name)
            .await
            .map_err(|e| ResourceError::poll("updating", cluster_label(name), e))?;
        Ok(settled(result))
    }

    async fn upgrade_and_wait(
        &self,
        ctx: &Context,
        project_id: &str,
        name: &str,
        request: &Cluster,
        timeout: Duration,
    ) -> Result<Cluster, ResourceError> {
        tracing::info!("Upgrading shared-tier MongoDB cluster {}", name);
        self.provider_data
            .client
            .clusters()
            .upgrade(project_id, request)
            .await?;

        let result = self
            .wait(ctx, update_conf(timeout), project_id, name)
            .await
            .map_err(|e| ResourceError::poll("upgrading", cluster_label(name), e))?;
        Ok(settled(result))
    }

    async fn wait(
        &self,
        ctx: &Context,
        conf: StateChangeConf<ClusterState>,
        project_id: &str,
        name: &str,
    ) -> tfretry::Result<PollResult<Cluster, ClusterState>> {
        let client = &self.provider_data.client;
        conf.wait_for_state(
            ctx,
            self.provider_data.clock.as_ref(),
            cluster_refresh(client, project_id, name),
        )
        .await
    }
}

// IDLE is only ever reached through an observed cluster
fn settled(result: PollResult<Cluster, ClusterState>) -> Cluster {
    result.payload.unwrap_or_default()
}
