//! Project (group) API implementation

use serde::{Deserialize, Serialize};

use super::common::{segment, ApiQueryParams, API_V1};
use super::{ApiError, Client};

/// Atlas project, called a group in the v1.0 API paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub org_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_default_alerts_settings: Option<bool>,

    // Read-only fields
    #[serde(skip_serializing)]
    pub cluster_count: Option<i64>,
    #[serde(skip_serializing)]
    pub created: Option<String>,
}

/// Projects API for project operations
pub struct ProjectsApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /api/atlas/v1.0/groups
    pub async fn create(
        &self,
        request: &Project,
        project_owner_id: Option<&str>,
    ) -> Result<Project, ApiError> {
        let params = ApiQueryParams::new().add_optional("projectOwnerId", project_owner_id);
        let path = format!("{}/groups{}", API_V1, params.to_query_string());
        self.client.post(&path, request).await
    }

    /// GET /api/atlas/v1.0/groups/{group}
    pub async fn get(&self, project_id: &str) -> Result<Project, ApiError> {
        let path = format!("{}/groups/{}", API_V1, segment(project_id));
        self.client.get(&path).await
    }

    /// DELETE /api/atlas/v1.0/groups/{group}
    pub async fn delete(&self, project_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/groups/{}", API_V1, segment(project_id));
        self.client.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_project_with_owner() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/atlas/v1.0/groups")
            .match_query(Matcher::UrlEncoded(
                "projectOwnerId".into(),
                "owner-1".into(),
            ))
            .match_body(Matcher::Json(serde_json::json!({
                "name": "payments",
                "orgId": "org-1"
            })))
            .with_status(201)
            .with_body(r#"{"id":"p1","name":"payments","orgId":"org-1","clusterCount":0}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let request = Project {
            name: "payments".to_string(),
            org_id: "org-1".to_string(),
            ..Default::default()
        };

        let project = client
            .projects()
            .create(&request, Some("owner-1"))
            .await
            .unwrap();
        assert_eq!(project.id.as_deref(), Some("p1"));
        assert_eq!(project.cluster_count, Some(0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_missing_project_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/atlas/v1.0/groups/nope")
            .with_status(404)
            .with_body(r#"{"error":404,"errorCode":"GROUP_NOT_FOUND","detail":"No group with ID nope exists."}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.projects().get("nope").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.error_code(), Some("GROUP_NOT_FOUND"));
    }

    #[tokio::test]
    async fn delete_project_by_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/atlas/v1.0/groups/p1")
            .with_status(202)
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client.projects().delete("p1").await.unwrap();
        mock.assert_async().await;
    }
}
