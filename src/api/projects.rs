use super::ApiClient;
use crate::error::ApiError;
use crate::models::{NewProject, Project, ProjectUpdate};

pub struct ProjectsApi<'a> {
    pub(super) client: &'a ApiClient,
}

impl ProjectsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Project>, ApiError> {
        self.client.get_list("/projects", &[]).await
    }

    pub async fn get(&self, id: &str) -> Result<Project, ApiError> {
        self.client.get(&format!("/projects/{}", id)).await
    }

    pub async fn create(&self, project: &NewProject) -> Result<Project, ApiError> {
        self.client.post("/projects", project).await
    }

    pub async fn update(&self, id: &str, update: &ProjectUpdate) -> Result<Project, ApiError> {
        self.client.put(&format!("/projects/{}", id), update).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("/projects/{}", id)).await
    }
}
