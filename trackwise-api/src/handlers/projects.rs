//! Project commands and queries.

use async_trait::async_trait;
use trackwise_core::{
    next_modification, EntityId, EntityKind, ExpectedVersion, NoFilter, Page, PageRequest,
    Project, TrackError, TrackResult, Versioned, MAX_PAGE_SIZE,
};
use trackwise_storage::WriteOutcome;

use super::{normalize, Services};
use crate::pipeline::{rule, Handler, Request, Validate, Validator};
use crate::validation::{
    validate_id, ValidateRange, ValidateText, PROJECT_DESCRIPTION_MAX, PROJECT_NAME_MAX,
    PROJECT_NAME_MIN,
};

#[derive(Debug, Clone)]
pub struct CreateProject {
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateProject {
    pub id: EntityId,
    pub actor: String,
    pub name: String,
    pub description: Option<String>,
    pub expected: Option<ExpectedVersion>,
}

#[derive(Debug, Clone)]
pub struct DeleteProject {
    pub id: EntityId,
    pub actor: String,
    pub expected: Option<ExpectedVersion>,
}

#[derive(Debug, Clone)]
pub struct GetProjectById {
    pub id: EntityId,
    pub requester: String,
}

#[derive(Debug, Clone)]
pub struct ListProjects {
    pub owner_id: String,
    pub page: PageRequest,
}

impl Request for CreateProject {
    const NAME: &'static str = "CreateProject";
    type Response = Versioned<Project>;
}

impl Request for UpdateProject {
    const NAME: &'static str = "UpdateProject";
    type Response = Versioned<Project>;
}

impl Request for DeleteProject {
    const NAME: &'static str = "DeleteProject";
    type Response = ();
}

impl Request for GetProjectById {
    const NAME: &'static str = "GetProjectById";
    type Response = Versioned<Project>;
}

impl Request for ListProjects {
    const NAME: &'static str = "ListProjects";
    type Response = Page<Versioned<Project>>;
}

impl Validate for CreateProject {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| r.owner_id.validate_non_blank("owner_id")),
            rule(|r: &Self| r.name.validate_length("name", PROJECT_NAME_MIN, PROJECT_NAME_MAX)),
            rule(|r: &Self| {
                r.description
                    .validate_max_length("description", PROJECT_DESCRIPTION_MAX)
            }),
        ]
    }
}

impl Validate for UpdateProject {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
            rule(|r: &Self| r.name.validate_length("name", PROJECT_NAME_MIN, PROJECT_NAME_MAX)),
            rule(|r: &Self| {
                r.description
                    .validate_max_length("description", PROJECT_DESCRIPTION_MAX)
            }),
        ]
    }
}

impl Validate for DeleteProject {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.actor.validate_non_blank("actor")),
        ]
    }
}

impl Validate for GetProjectById {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| validate_id(&r.id, "id")),
            rule(|r: &Self| r.requester.validate_non_blank("requester")),
        ]
    }
}

impl Validate for ListProjects {
    fn validators() -> Vec<Box<dyn Validator<Self>>> {
        vec![
            rule(|r: &Self| r.owner_id.validate_non_blank("owner_id")),
            rule(|r: &Self| r.page.page_number.validate_range("page_number", 1, u32::MAX)),
            rule(|r: &Self| r.page.page_size.validate_range("page_size", 1, MAX_PAGE_SIZE)),
        ]
    }
}

fn duplicate_name(owner_id: &str, name: &str) -> TrackError {
    TrackError::Duplicate {
        kind: EntityKind::Project,
        scope: owner_id.to_string(),
        key: name.to_string(),
    }
}

#[async_trait]
impl Handler<CreateProject> for Services {
    async fn handle(&self, request: CreateProject) -> TrackResult<Versioned<Project>> {
        let project = Project::new(
            request.owner_id.trim(),
            request.name.trim(),
            normalize(request.description),
            self.clock.now(),
        );

        match self.projects.create(&project).await? {
            WriteOutcome::Applied => {}
            WriteOutcome::Duplicate => return Err(duplicate_name(&project.owner_id, &project.name)),
            other => {
                return Err(TrackError::Unavailable {
                    reason: format!("unexpected create outcome {:?}", other),
                })
            }
        }

        self.invalidation.on_created(&project).await;
        tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");
        Ok(Versioned::from_document(project))
    }
}

#[async_trait]
impl Handler<UpdateProject> for Services {
    async fn handle(&self, request: UpdateProject) -> TrackResult<Versioned<Project>> {
        self.owned_project(request.id, &request.actor).await?;

        let name = request.name.trim().to_string();
        let description = normalize(request.description);
        let clock = self.clock.as_ref();
        let actor = request.actor.as_str();

        let updated = self
            .project_writer()
            .update(request.id, request.expected.as_ref(), |current: &Project| {
                let mut next = current.clone();
                next.name = name.clone();
                next.description = description.clone();
                next.touch(actor, next_modification(clock, current.updated_at));
                Ok(next)
            })
            .await?;

        self.invalidation.on_updated(&updated).await;
        tracing::info!(project_id = %updated.id, "Project updated");
        Ok(Versioned::from_document(updated))
    }
}

#[async_trait]
impl Handler<DeleteProject> for Services {
    async fn handle(&self, request: DeleteProject) -> TrackResult<()> {
        self.owned_project(request.id, &request.actor).await?;

        let deleted = self
            .project_writer()
            .delete(request.id, request.expected.as_ref())
            .await?;

        self.invalidation.on_deleted(&deleted).await;
        tracing::info!(project_id = %deleted.id, "Project deleted");
        Ok(())
    }
}

#[async_trait]
impl Handler<GetProjectById> for Services {
    async fn handle(&self, request: GetProjectById) -> TrackResult<Versioned<Project>> {
        let project = self.owned_project(request.id, &request.requester).await?;
        Ok(Versioned::from_document(project))
    }
}

#[async_trait]
impl Handler<ListProjects> for Services {
    async fn handle(&self, request: ListProjects) -> TrackResult<Page<Versioned<Project>>> {
        let owner_id = request.owner_id.trim();
        self.cached_page(self.projects.as_ref(), owner_id, &NoFilter, request.page)
            .await
    }
}
