use crate::api::ApiClient;
use crate::error::ApiError;
use crate::guard::Route;
use crate::models::{
    AuthResponse, CheckoutSession, NewProject, NewTask, Project, ProjectUpdate, Task, TaskUpdate,
    User,
};
use crate::schedule::{self, DayBucket, UPCOMING_DAYS};
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;

/// Hands out sequence numbers for view loads so that only the newest
/// response is applied.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn accept(&self, ticket: u64) -> bool {
        ticket == self.latest
    }

    /// Makes every outstanding ticket stale.
    pub fn cancel(&mut self) {
        self.latest += 1;
    }
}

#[derive(Debug)]
pub enum Payload {
    Tasks(Vec<Task>),
    Upcoming(Vec<DayBucket>),
    Projects(Vec<Project>),
    Project(Project, Vec<Task>),
}

#[derive(Debug)]
pub struct Fetched {
    pub ticket: u64,
    pub route: Route,
    pub result: Result<Payload, ApiError>,
}

pub async fn load(api: &ApiClient, route: &Route) -> Option<Result<Payload, ApiError>> {
    let result = match route {
        Route::Today => api.tasks().today().await.map(Payload::Tasks),
        Route::Upcoming => api
            .tasks()
            .upcoming(UPCOMING_DAYS)
            .await
            .map(|tasks| Payload::Upcoming(schedule::group_upcoming(tasks, UPCOMING_DAYS))),
        Route::Projects => api.projects().list().await.map(Payload::Projects),
        Route::Project(id) => {
            let (projects, tasks) = (api.projects(), api.tasks());
            tokio::try_join!(projects.get(id), tasks.list(Some(id)))
                .map(|(project, tasks)| Payload::Project(project, tasks))
        }
        Route::Login | Route::Register => return None,
    };
    Some(result)
}

/// A write the user asked for. The view is reloaded once it lands.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateTask(NewTask),
    UpdateTask(String, TaskUpdate),
    DeleteTask(String),
    CreateProject(NewProject),
    UpdateProject(String, ProjectUpdate),
    DeleteProject(String),
}

impl Mutation {
    pub async fn run(&self, api: &ApiClient) -> Result<(), ApiError> {
        match self {
            Mutation::CreateTask(task) => {
                let created = api.tasks().create(task).await?;
                tracing::info!(id = %created.id, "task created");
                Ok(())
            }
            Mutation::UpdateTask(id, update) => api.tasks().update(id, update).await.map(|_| ()),
            Mutation::DeleteTask(id) => api.tasks().delete(id).await,
            Mutation::CreateProject(project) => {
                let created = api.projects().create(project).await?;
                tracing::info!(id = %created.id, "project created");
                Ok(())
            }
            Mutation::UpdateProject(id, update) => {
                api.projects().update(id, update).await.map(|_| ())
            }
            Mutation::DeleteProject(id) => api.projects().delete(id).await,
        }
    }
}

/// Everything that finishes in the background and is applied by the UI loop.
#[derive(Debug)]
pub enum Update {
    Loaded(Fetched),
    Mutated {
        mutation: Mutation,
        result: Result<(), ApiError>,
    },
    /// A fresh copy of the task whose edit form is open.
    TaskDetail(Result<Task, ApiError>),
    SignedIn(Result<AuthResponse, ApiError>),
    Profile(Result<User, ApiError>),
    Checkout(Result<CheckoutSession, ApiError>),
}

/// Loads `route` in the background and reports on `tx`.
pub fn spawn(api: ApiClient, route: Route, ticket: u64, tx: UnboundedSender<Update>) {
    tokio::spawn(async move {
        if let Some(result) = load(&api, &route).await {
            tracing::debug!(?route, ticket, ok = result.is_ok(), "view loaded");
            let _ = tx.send(Update::Loaded(Fetched {
                ticket,
                route,
                result,
            }));
        }
    });
}

pub fn mutate(api: ApiClient, mutation: Mutation, tx: UnboundedSender<Update>) {
    tokio::spawn(async move {
        let result = mutation.run(&api).await;
        tracing::debug!(?mutation, ok = result.is_ok(), "mutation finished");
        let _ = tx.send(Update::Mutated { mutation, result });
    });
}

/// Runs `work` on the runtime and sends what it produces.
pub fn run<F>(tx: UnboundedSender<Update>, work: F)
where
    F: Future<Output = Update> + Send + 'static,
{
    tokio::spawn(async move {
        let _ = tx.send(work.await);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_ticket_is_accepted() {
        let mut tracker = RequestTracker::default();
        let first = tracker.issue();
        let second = tracker.issue();

        assert!(!tracker.accept(first));
        assert!(tracker.accept(second));
    }

    #[test]
    fn test_cancel_invalidates_outstanding() {
        let mut tracker = RequestTracker::default();
        let ticket = tracker.issue();
        tracker.cancel();
        assert!(!tracker.accept(ticket));
    }

    #[tokio::test]
    async fn test_public_routes_load_nothing() {
        let api = ApiClient::new("http://127.0.0.1:9");
        assert!(load(&api, &Route::Login).await.is_none());
    }

    #[tokio::test]
    async fn test_project_route_loads_project_and_tasks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects/p1")
            .with_status(200)
            .with_body(r#"{"id":"p1","name":"Home","color":"","user_id":"u1","created_at":"2026-10-01T10:00:00Z"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tasks")
            .match_query(mockito::Matcher::UrlEncoded("project_id".into(), "p1".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let api = ApiClient::new(&server.url());
        let payload = load(&api, &Route::Project("p1".to_string()))
            .await
            .unwrap()
            .unwrap();

        match payload {
            Payload::Project(project, tasks) => {
                assert_eq!(project.name, "Home");
                assert!(tasks.is_empty());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_projects_load_as_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let api = ApiClient::new(&server.url());
        match load(&api, &Route::Projects).await.unwrap().unwrap() {
            Payload::Projects(projects) => assert!(projects.is_empty()),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mutation_reports_on_channel() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/projects/p1")
            .with_status(204)
            .create_async()
            .await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        mutate(
            ApiClient::new(&server.url()),
            Mutation::DeleteProject("p1".to_string()),
            tx,
        );

        match rx.recv().await.unwrap() {
            Update::Mutated { mutation, result } => {
                assert_eq!(mutation, Mutation::DeleteProject("p1".to_string()));
                assert!(result.is_ok());
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }
}
