//! REST route handlers for users, projects, and tasks.
//!
//! Role rules: team leads have full CRUD over projects and tasks they own;
//! developers can read and update only the tasks assigned to them (and see
//! only their own user record). Notification enqueues are fire-and-forget:
//! a handler's response never depends on mail delivery.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use taskhive_core::types::{
    ProjectCreate, ProjectPatch, Task, TaskCreate, TaskPatch, TaskStatus, UserRole,
};
use taskhive_mailer::Notifier;

use crate::auth::AuthedUser;
use crate::server::AppState;

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"detail": message}))).into_response()
}

fn internal(e: impl std::fmt::Display) -> Response {
    tracing::error!("Internal error: {e}");
    detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Root endpoint.
pub async fn read_root() -> Json<serde_json::Value> {
    Json(json!({"message": "Task Management API is running!"}))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "taskhive-gateway",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ── Users ──────────────────────────────

#[derive(Deserialize)]
pub struct RegisterReq {
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterReq>,
) -> Response {
    if req.email.is_empty() || !req.email.contains('@') {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email address");
    }
    if req.password.is_empty() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "Password is required");
    }
    match state.store.user_by_email(&req.email) {
        Ok(Some(_)) => return detail(StatusCode::BAD_REQUEST, "Email already registered"),
        Ok(None) => {}
        Err(e) => return internal(e),
    }

    // bcrypt is CPU-bound; keep it off the async runtime
    let password = req.password.clone();
    let hashed = match tokio::task::spawn_blocking(move || crate::auth::hash_password(&password))
        .await
    {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => return internal(e),
        Err(e) => return internal(e),
    };

    match state.store.create_user(&req.email, &hashed, req.role) {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({"id": user.id, "email": user.email, "role": user.role})),
        )
            .into_response(),
        Err(taskhive_core::TaskHiveError::Validation(msg)) => {
            detail(StatusCode::BAD_REQUEST, &msg)
        }
        Err(e) => internal(e),
    }
}

pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginReq>,
) -> Response {
    let user = match state.store.user_by_email(&req.email) {
        Ok(Some(u)) => u,
        Ok(None) => return detail(StatusCode::UNAUTHORIZED, "Invalid email or password"),
        Err(e) => return internal(e),
    };

    let password = req.password.clone();
    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || crate::auth::verify_password(&password, &hash))
        .await
        .unwrap_or(false);
    if !ok {
        return detail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    match crate::auth::create_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    ) {
        Ok(token) => Json(json!({
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "access_token": token,
            "token_type": "bearer",
        }))
        .into_response(),
        Err(e) => internal(e),
    }
}

/// Team leads see all users; developers only themselves.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
) -> Response {
    if !authed.is_team_lead() {
        return Json(json!([authed.0])).into_response();
    }
    match state.store.list_users() {
        Ok(users) => Json(json!(users)).into_response(),
        Err(e) => internal(e),
    }
}

/// Current user profile with assigned tasks.
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
) -> Response {
    let tasks = match state.store.tasks_by_assignee(authed.0.id) {
        Ok(t) => t,
        Err(e) => return internal(e),
    };
    Json(json!({
        "id": authed.0.id,
        "email": authed.0.email,
        "role": authed.0.role,
        "tasks_assigned": tasks,
    }))
    .into_response()
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(user_id): Path<i64>,
) -> Response {
    if !authed.is_team_lead() && authed.0.id != user_id {
        return detail(
            StatusCode::FORBIDDEN,
            "Developers can only view their own profile",
        );
    }
    match state.store.user_by_id(user_id) {
        Ok(Some(user)) => Json(json!({
            "id": user.id,
            "email": user.email,
            "role": user.role,
        }))
        .into_response(),
        Ok(None) => detail(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => internal(e),
    }
}

// ── Projects ──────────────────────────────

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Json(req): Json<ProjectCreate>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can create projects");
    }
    match state
        .store
        .create_project(&req.name, req.description.as_deref(), authed.0.id)
    {
        Ok(project) => (StatusCode::CREATED, Json(json!(project))).into_response(),
        Err(e) => internal(e),
    }
}

/// Team leads see all projects; developers only those they own.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
) -> Response {
    let result = if authed.is_team_lead() {
        state.store.list_projects()
    } else {
        state.store.projects_by_owner(authed.0.id)
    };
    match result {
        Ok(projects) => Json(json!(projects)).into_response(),
        Err(e) => internal(e),
    }
}

/// Project details with all of its tasks.
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(project_id): Path<i64>,
) -> Response {
    let project = match state.store.project_by_id(project_id) {
        Ok(Some(p)) => p,
        Ok(None) => return detail(StatusCode::NOT_FOUND, "Project not found"),
        Err(e) => return internal(e),
    };
    if !authed.is_team_lead() && project.owner_id != authed.0.id {
        return detail(StatusCode::FORBIDDEN, "Not authorized to view this project");
    }
    let tasks = match state.store.tasks_by_project(project_id) {
        Ok(t) => t,
        Err(e) => return internal(e),
    };
    Json(json!({"project": project, "tasks": tasks})).into_response()
}

pub async fn patch_project(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(project_id): Path<i64>,
    Json(patch): Json<ProjectPatch>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can update projects");
    }
    match state.store.update_project(project_id, authed.0.id, &patch) {
        Ok(Some(project)) => Json(json!(project)).into_response(),
        Ok(None) => detail(StatusCode::NOT_FOUND, "Project not found"),
        Err(e) => internal(e),
    }
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(project_id): Path<i64>,
    Json(req): Json<ProjectCreate>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can update projects");
    }
    let patch = ProjectPatch {
        name: Some(req.name),
        description: Some(req.description),
    };
    match state.store.update_project(project_id, authed.0.id, &patch) {
        Ok(Some(project)) => Json(json!(project)).into_response(),
        Ok(None) => detail(StatusCode::NOT_FOUND, "Project not found"),
        Err(e) => internal(e),
    }
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(project_id): Path<i64>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can delete projects");
    }
    match state.store.delete_project(project_id, authed.0.id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => detail(StatusCode::NOT_FOUND, "Project not found"),
        Err(e) => internal(e),
    }
}

// ── Tasks ──────────────────────────────

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Json(req): Json<TaskCreate>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can create tasks");
    }
    match state.store.project_by_id(req.project_id) {
        Ok(Some(_)) => {}
        Ok(None) => return detail(StatusCode::NOT_FOUND, "Project not found"),
        Err(e) => return internal(e),
    }

    let status = req.status.unwrap_or(TaskStatus::Todo);
    match state.store.create_task(
        &req.title,
        req.description.as_deref(),
        status,
        req.due_date,
        req.project_id,
        req.assigned_user_id,
    ) {
        Ok(task) => {
            if task.assigned_user_id.is_some() {
                state.notifier.task_assigned(&task);
            }
            (StatusCode::CREATED, Json(json!(task))).into_response()
        }
        Err(e) => internal(e),
    }
}

/// Team leads see all tasks; developers only their assigned ones.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
) -> Response {
    let result = if authed.is_team_lead() {
        state.store.list_tasks()
    } else {
        state.store.tasks_by_assignee(authed.0.id)
    };
    match result {
        Ok(tasks) => Json(json!(tasks)).into_response(),
        Err(e) => internal(e),
    }
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(task_id): Path<i64>,
) -> Response {
    let task = match state.store.task_by_id(task_id) {
        Ok(Some(t)) => t,
        Ok(None) => return detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => return internal(e),
    };
    if !authed.is_team_lead() && task.assigned_user_id != Some(authed.0.id) {
        return detail(StatusCode::FORBIDDEN, "Not authorized to view this task");
    }
    Json(json!(task)).into_response()
}

/// Fire reassignment/status-change notifications from a before/after diff.
fn fire_update_notifications(notifier: &Notifier, old: &Task, new: &Task) {
    if new.assigned_user_id != old.assigned_user_id {
        notifier.task_reassigned(new, old.assigned_user_id);
    }
    if new.status != old.status {
        notifier.task_status_changed(new, old.status);
    }
}

pub async fn patch_task(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(task_id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> Response {
    let old = match state.store.task_by_id(task_id) {
        Ok(Some(t)) => t,
        Ok(None) => return detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => return internal(e),
    };
    if !authed.is_team_lead() && old.assigned_user_id != Some(authed.0.id) {
        return detail(StatusCode::FORBIDDEN, "Not authorized to update this task");
    }

    match state.store.update_task(task_id, &patch) {
        Ok(Some(task)) => {
            fire_update_notifications(&state.notifier, &old, &task);
            Json(json!(task)).into_response()
        }
        Ok(None) => detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => internal(e),
    }
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(task_id): Path<i64>,
    Json(req): Json<TaskCreate>,
) -> Response {
    let old = match state.store.task_by_id(task_id) {
        Ok(Some(t)) => t,
        Ok(None) => return detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => return internal(e),
    };
    if !authed.is_team_lead() && old.assigned_user_id != Some(authed.0.id) {
        return detail(StatusCode::FORBIDDEN, "Not authorized to update this task");
    }

    let patch = TaskPatch {
        title: Some(req.title),
        description: Some(req.description),
        status: Some(req.status.unwrap_or(old.status)),
        due_date: Some(req.due_date),
        project_id: Some(req.project_id),
        assigned_user_id: Some(req.assigned_user_id),
    };
    match state.store.update_task(task_id, &patch) {
        Ok(Some(task)) => {
            fire_update_notifications(&state.notifier, &old, &task);
            Json(json!(task)).into_response()
        }
        Ok(None) => detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => internal(e),
    }
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedUser>,
    Path(task_id): Path<i64>,
) -> Response {
    if !authed.is_team_lead() {
        return detail(StatusCode::FORBIDDEN, "Only team leads can delete tasks");
    }
    match state.store.delete_task(task_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => detail(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => internal(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use taskhive_db::Store;
    use taskhive_mailer::{DevMailer, Mailer};

    #[tokio::test]
    async fn test_update_diff_drives_notifications() {
        let log_dir = std::env::temp_dir().join("taskhive-test-routes-diff");
        std::fs::remove_dir_all(&log_dir).ok();
        let transport =
            Arc::new(DevMailer::new(PathBuf::from(&log_dir).join("sent_emails.json")));
        let mailer = Mailer::start(transport.clone());
        let store = Arc::new(Store::open_in_memory().unwrap());
        let notifier = Notifier::new(store.clone(), mailer.clone());

        let lead = store
            .create_user("lead@example.com", "h", UserRole::TeamLead)
            .unwrap();
        let dev_a = store
            .create_user("a@example.com", "h", UserRole::Developer)
            .unwrap();
        let dev_b = store
            .create_user("b@example.com", "h", UserRole::Developer)
            .unwrap();
        let project = store.create_project("Apollo", None, lead.id).unwrap();
        let old = store
            .create_task("T", None, TaskStatus::Todo, None, project.id, Some(dev_a.id))
            .unwrap();

        // Reassign a→b and move todo→in_progress in one update:
        // assignment email to b, reassigned-away to a, status change to b.
        let mut new = old.clone();
        new.assigned_user_id = Some(dev_b.id);
        new.status = TaskStatus::InProgress;
        fire_update_notifications(&notifier, &old, &new);
        mailer.flush().await;

        let records = transport.recent(10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].to, "b@example.com");
        assert_eq!(records[1].to, "a@example.com");
        assert_eq!(records[2].to, "b@example.com");

        // No diff, no emails
        fire_update_notifications(&notifier, &new, &new);
        mailer.flush().await;
        assert_eq!(transport.recent(10).unwrap().len(), 3);

        std::fs::remove_dir_all(&log_dir).ok();
    }
}
