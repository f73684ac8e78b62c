//! Project resource operations

use std::time::Duration;
use tfretry::{gate_conf, Context, DependentsGate};

use super::ResourceError;
use crate::api::projects::Project;
use crate::provider_data::AtlasProviderData;
use crate::refresh::project_dependents_lister;

const DEPENDENTS_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEPENDENTS_MIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ProjectResource {
    provider_data: AtlasProviderData,
}

impl ProjectResource {
    pub fn new(provider_data: AtlasProviderData) -> Self {
        Self { provider_data }
    }

    pub async fn create(
        &self,
        request: &Project,
        project_owner_id: Option<&str>,
    ) -> Result<Project, ResourceError> {
        tracing::info!("Creating MongoDB project {}", request.name);
        let project = self
            .provider_data
            .client
            .projects()
            .create(request, project_owner_id)
            .await?;
        Ok(project)
    }

    /// Reads the project; `None` when Atlas no longer knows it
    pub async fn read(&self, project_id: &str) -> Result<Option<Project>, ResourceError> {
        match self.provider_data.client.projects().get(project_id).await {
            Ok(project) => Ok(Some(project)),
            Err(e) if e.is_not_found() => {
                tracing::warn!("MongoDB project {} not found, removing from state", project_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for the project's clusters to finish deleting, then deletes the
    /// project
    ///
    /// A failed wait is only logged: Atlas rejects the delete itself with a
    /// precise error if clusters remain.
    pub async fn delete(&self, ctx: &Context, project_id: &str) -> Result<(), ResourceError> {
        let client = &self.provider_data.client;
        let gate = DependentsGate::new(project_id, project_dependents_lister(client, project_id));

        match gate
            .wait(
                ctx,
                self.provider_data.clock.as_ref(),
                gate_conf(DEPENDENTS_TIMEOUT, DEPENDENTS_MIN_TIMEOUT),
            )
            .await
        {
            Ok(clusters) => {
                tracing::debug!(
                    "{} cluster(s) remain in project {} before delete",
                    clusters.len(),
                    project_id
                );
            }
            Err(e) if e.is_cancelled() => {
                return Err(ResourceError::poll(
                    "deleting",
                    format!("project ({})", project_id),
                    e,
                ));
            }
            Err(e) => {
                tracing::warn!(
                    "error deleting MongoDB project ({}): waiting for clusters failed: {}",
                    project_id,
                    e
                );
            }
        }

        client.projects().delete(project_id).await?;
        Ok(())
    }
}
