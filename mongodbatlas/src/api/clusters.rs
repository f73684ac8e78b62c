//! Cluster API implementation

use serde::{Deserialize, Serialize};
use tfretry::Dependent;

use super::common::{
    deserialize_non_empty, segment, ApiQueryParams, PageParams, Paginated, API_V1, API_V1_5,
};
use super::{ApiError, Client};
use crate::state::ClusterState;

const LIST_PAGE_SIZE: u32 = 500;

/// Cluster as returned by `/api/atlas/v1.0/groups/{group}/clusters`
///
/// The same type is used for create and update requests; unset fields are
/// left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,
    #[serde(rename = "mongoDBMajorVersion", skip_serializing_if = "Option::is_none")]
    pub mongo_db_major_version: Option<String>,
    #[serde(rename = "diskSizeGB", skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_shards: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_protection_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_release_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_settings: Option<ProviderSettings>,

    // Read-only fields
    #[serde(
        skip_serializing,
        deserialize_with = "deserialize_non_empty",
        default
    )]
    pub state_name: Option<ClusterState>,
    #[serde(skip_serializing)]
    pub connection_strings: Option<ConnectionStrings>,
}

impl Cluster {
    pub fn instance_size_name(&self) -> Option<&str> {
        self.provider_settings
            .as_ref()
            .and_then(|settings| settings.instance_size_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backing_provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_size_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrings {
    pub standard: Option<String>,
    pub standard_srv: Option<String>,
}

/// Advanced configuration options (`processArgs`) of a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_index_key_too_long: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_enabled_tls_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_table_scan: Option<bool>,
    #[serde(rename = "oplogSizeMB", skip_serializing_if = "Option::is_none")]
    pub oplog_size_mb: Option<i64>,
    #[serde(rename = "sampleSizeBIConnector", skip_serializing_if = "Option::is_none")]
    pub sample_size_bi_connector: Option<i64>,
    #[serde(
        rename = "sampleRefreshIntervalBIConnector",
        skip_serializing_if = "Option::is_none"
    )]
    pub sample_refresh_interval_bi_connector: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_lifetime_limit_seconds: Option<i64>,
}

impl ProcessArgs {
    pub fn is_empty(&self) -> bool {
        *self == ProcessArgs::default()
    }
}

/// Cluster as listed by the v1.5 advanced clusters endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedCluster {
    pub id: Option<String>,
    pub name: Option<String>,
    pub group_id: Option<String>,
    pub cluster_type: Option<String>,
    pub paused: Option<bool>,
    #[serde(deserialize_with = "deserialize_non_empty", default)]
    pub state_name: Option<ClusterState>,
}

impl Dependent for AdvancedCluster {
    fn is_deleting(&self) -> bool {
        self.state_name == Some(ClusterState::Deleting)
    }
}

fn clusters_path(project_id: &str) -> String {
    format!("{}/groups/{}/clusters", API_V1, segment(project_id))
}

fn cluster_path(project_id: &str, name: &str) -> String {
    format!("{}/{}", clusters_path(project_id), segment(name))
}

/// Clusters API for cluster operations
pub struct ClustersApi<'a> {
    client: &'a Client,
}

impl<'a> ClustersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/atlas/v1.0/groups/{group}/clusters/{name}
    pub async fn get(&self, project_id: &str, name: &str) -> Result<Cluster, ApiError> {
        self.client.get(&cluster_path(project_id, name)).await
    }

    /// POST /api/atlas/v1.0/groups/{group}/clusters
    pub async fn create(&self, project_id: &str, request: &Cluster) -> Result<Cluster, ApiError> {
        self.client.post(&clusters_path(project_id), request).await
    }

    /// PATCH /api/atlas/v1.0/groups/{group}/clusters/{name}
    pub async fn update(
        &self,
        project_id: &str,
        name: &str,
        request: &Cluster,
    ) -> Result<Cluster, ApiError> {
        self.client
            .patch(&cluster_path(project_id, name), request)
            .await
    }

    /// POST /api/atlas/v1.0/groups/{group}/clusters/tenantUpgrade
    pub async fn upgrade(&self, project_id: &str, request: &Cluster) -> Result<Cluster, ApiError> {
        let path = format!("{}/tenantUpgrade", clusters_path(project_id));
        self.client.post(&path, request).await
    }

    /// DELETE /api/atlas/v1.0/groups/{group}/clusters/{name}
    pub async fn delete(
        &self,
        project_id: &str,
        name: &str,
        retain_backups: Option<bool>,
    ) -> Result<(), ApiError> {
        let params = ApiQueryParams::new().add_optional("retainBackups", retain_backups);
        self.client
            .delete_with_params(&cluster_path(project_id, name), &params)
            .await
    }

    /// PATCH /api/atlas/v1.0/groups/{group}/clusters/{name}/processArgs
    pub async fn update_process_args(
        &self,
        project_id: &str,
        name: &str,
        args: &ProcessArgs,
    ) -> Result<ProcessArgs, ApiError> {
        let path = format!("{}/processArgs", cluster_path(project_id, name));
        self.client.patch(&path, args).await
    }
}

/// Advanced clusters API (v1.5)
pub struct AdvancedClustersApi<'a> {
    client: &'a Client,
}

impl<'a> AdvancedClustersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/atlas/v1.5/groups/{group}/clusters
    pub async fn list(
        &self,
        project_id: &str,
        page: &PageParams,
    ) -> Result<Paginated<AdvancedCluster>, ApiError> {
        let path = format!("{}/groups/{}/clusters", API_V1_5, segment(project_id));
        self.client
            .get_with_params(&path, &page.to_query_params())
            .await
    }

    /// Walks every page of the listing until `totalCount` clusters were seen
    /// or a page comes back empty
    pub async fn list_all(&self, project_id: &str) -> Result<Vec<AdvancedCluster>, ApiError> {
        let mut clusters = Vec::new();
        let mut page_num = 1;

        loop {
            let page = PageParams::new()
                .with_page(page_num)
                .with_items_per_page(LIST_PAGE_SIZE);
            let listed = self.list(project_id, &page).await?;
            let fetched = listed.results.len();
            clusters.extend(listed.results);

            if fetched == 0 || clusters.len() as u64 >= listed.total_count {
                return Ok(clusters);
            }
            tracing::debug!(
                "Listed {} of {} clusters in project {}",
                clusters.len(),
                listed.total_count,
                project_id
            );
            page_num += 1;
        }
    }
}
