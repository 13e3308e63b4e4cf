use super::ApiClient;
use crate::error::ApiError;
use crate::models::{NewTask, Task, TaskUpdate};

pub struct TasksApi<'a> {
    pub(super) client: &'a ApiClient,
}

impl TasksApi<'_> {
    /// All tasks, or only those in `project_id` when given.
    pub async fn list(&self, project_id: Option<&str>) -> Result<Vec<Task>, ApiError> {
        match project_id {
            Some(id) => {
                self.client
                    .get_list("/tasks", &[("project_id", id.to_string())])
                    .await
            }
            None => self.client.get_list("/tasks", &[]).await,
        }
    }

    pub async fn today(&self) -> Result<Vec<Task>, ApiError> {
        self.client.get_list("/tasks/today", &[]).await
    }

    pub async fn upcoming(&self, days: u32) -> Result<Vec<Task>, ApiError> {
        self.client
            .get_list("/tasks/upcoming", &[("days", days.to_string())])
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Task, ApiError> {
        self.client.get(&format!("/tasks/{}", id)).await
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.client.post("/tasks", task).await
    }

    pub async fn update(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        self.client.put(&format!("/tasks/{}", id), update).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("/tasks/{}", id)).await
    }
}
