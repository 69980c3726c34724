//! SQLite store — users, projects, and tasks.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use taskhive_core::error::{Result, TaskHiveError};
use taskhive_core::types::{
    Project, ProjectPatch, Task, TaskPatch, TaskStatus, User, UserRole,
};

/// Persistent store for all TaskHive entities.
pub struct Store {
    conn: Mutex<Connection>,
}

const DATE_FMT: &str = "%Y-%m-%d";

fn db_err(e: impl std::fmt::Display) -> TaskHiveError {
    TaskHiveError::Database(e.to_string())
}

/// Shared SELECT column list for task queries — single source of truth.
const TASK_SELECT: &str =
    "SELECT id, title, description, status, due_date, project_id, assigned_user_id FROM tasks";

/// Map a database row to a Task struct.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let due_date: Option<String> = row.get(4)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: status.parse().unwrap_or(TaskStatus::Todo),
        due_date: due_date.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FMT).ok()),
        project_id: row.get(5)?,
        assigned_user_id: row.get(6)?,
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: role.parse().unwrap_or(UserRole::Developer),
    })
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
    })
}

impl Store {
    /// Open or create the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;

        // WAL mode for concurrent readers alongside the writer
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .ok();

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'todo',
                due_date TEXT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                assigned_user_id INTEGER REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assigned_user_id);
            CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
            ",
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ── Users ──────────────────────────────

    /// Create a user. Fails with Validation on duplicate email.
    pub fn create_user(&self, email: &str, password_hash: &str, role: UserRole) -> Result<User> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT INTO users (email, password_hash, role) VALUES (?1, ?2, ?3)",
            params![email, password_hash, role.as_str()],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                TaskHiveError::Validation("Email already registered".into())
            }
            other => db_err(other),
        })?;
        let id = conn.last_insert_rowid();
        Ok(User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        })
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.query_row(
            "SELECT id, email, password_hash, role FROM users WHERE email=?1",
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.query_row(
            "SELECT id, email, password_hash, role FROM users WHERE id=?1",
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT id, email, password_hash, role FROM users ORDER BY id")
            .map_err(db_err)?;
        let users = stmt
            .query_map([], row_to_user)
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(users)
    }

    pub fn users_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT id, email, password_hash, role FROM users WHERE role=?1 ORDER BY id")
            .map_err(db_err)?;
        let users = stmt
            .query_map(params![role.as_str()], row_to_user)
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(users)
    }

    // ── Projects ──────────────────────────────

    pub fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<Project> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT INTO projects (name, description, owner_id) VALUES (?1, ?2, ?3)",
            params![name, description, owner_id],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        Ok(Project {
            id,
            name: name.to_string(),
            description: description.map(String::from),
            owner_id,
        })
    }

    pub fn project_by_id(&self, id: i64) -> Result<Option<Project>> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.query_row(
            "SELECT id, name, description, owner_id FROM projects WHERE id=?1",
            params![id],
            row_to_project,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT id, name, description, owner_id FROM projects ORDER BY id")
            .map_err(db_err)?;
        let projects = stmt
            .query_map([], row_to_project)
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(projects)
    }

    pub fn projects_by_owner(&self, owner_id: i64) -> Result<Vec<Project>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT id, name, description, owner_id FROM projects WHERE owner_id=?1 ORDER BY id")
            .map_err(db_err)?;
        let projects = stmt
            .query_map(params![owner_id], row_to_project)
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(projects)
    }

    /// Apply a closed-set patch to a project owned by `owner_id`.
    /// Returns None when no such project exists for that owner.
    pub fn update_project(
        &self,
        id: i64,
        owner_id: i64,
        patch: &ProjectPatch,
    ) -> Result<Option<Project>> {
        {
            let conn = self.conn.lock().map_err(db_err)?;
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM projects WHERE id=?1 AND owner_id=?2",
                    params![id, owner_id],
                    |r| r.get(0),
                )
                .optional()
                .map_err(db_err)?;
            if exists.is_none() {
                return Ok(None);
            }
            if let Some(name) = &patch.name {
                conn.execute(
                    "UPDATE projects SET name=?1 WHERE id=?2",
                    params![name, id],
                )
                .map_err(db_err)?;
            }
            if let Some(description) = &patch.description {
                conn.execute(
                    "UPDATE projects SET description=?1 WHERE id=?2",
                    params![description.as_deref(), id],
                )
                .map_err(db_err)?;
            }
        }
        self.project_by_id(id)
    }

    /// Delete a project owned by `owner_id`. Returns false when nothing matched.
    pub fn delete_project(&self, id: i64, owner_id: i64) -> Result<bool> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute(
                "DELETE FROM projects WHERE id=?1 AND owner_id=?2",
                params![id, owner_id],
            )
            .map_err(db_err)?;
        Ok(n > 0)
    }

    // ── Tasks ──────────────────────────────

    pub fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
        status: TaskStatus,
        due_date: Option<NaiveDate>,
        project_id: i64,
        assigned_user_id: Option<i64>,
    ) -> Result<Task> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT INTO tasks (title, description, status, due_date, project_id, assigned_user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                title,
                description,
                status.as_str(),
                due_date.map(|d| d.format(DATE_FMT).to_string()),
                project_id,
                assigned_user_id
            ],
        )
        .map_err(db_err)?;
        let id = conn.last_insert_rowid();
        Ok(Task {
            id,
            title: title.to_string(),
            description: description.map(String::from),
            status,
            due_date,
            project_id,
            assigned_user_id,
        })
    }

    pub fn task_by_id(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.query_row(
            &format!("{TASK_SELECT} WHERE id=?1"),
            params![id],
            row_to_task,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.query_tasks(&format!("{TASK_SELECT} ORDER BY id"), [])
    }

    pub fn tasks_by_assignee(&self, user_id: i64) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!("{TASK_SELECT} WHERE assigned_user_id=?1 ORDER BY id"),
            params![user_id],
        )
    }

    pub fn tasks_by_project(&self, project_id: i64) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!("{TASK_SELECT} WHERE project_id=?1 ORDER BY id"),
            params![project_id],
        )
    }

    /// All tasks not yet done — the status-normalization scan set.
    pub fn tasks_not_done(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!("{TASK_SELECT} WHERE status != 'done' ORDER BY id"),
            [],
        )
    }

    /// Assigned, not-done tasks due exactly on the given date.
    pub fn tasks_due_on(&self, date: NaiveDate) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "{TASK_SELECT} WHERE due_date=?1 AND status != 'done' \
                 AND assigned_user_id IS NOT NULL ORDER BY id"
            ),
            params![date.format(DATE_FMT).to_string()],
        )
    }

    /// Assigned, not-done tasks strictly past their due date.
    pub fn tasks_overdue(&self, today: NaiveDate) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "{TASK_SELECT} WHERE due_date < ?1 AND due_date IS NOT NULL \
                 AND status != 'done' AND assigned_user_id IS NOT NULL ORDER BY id"
            ),
            params![today.format(DATE_FMT).to_string()],
        )
    }

    fn query_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Task>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let tasks = stmt
            .query_map(params, row_to_task)
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tasks)
    }

    /// Apply a closed-set patch to a task. Returns None when the task does
    /// not exist.
    pub fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        {
            let conn = self.conn.lock().map_err(db_err)?;
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM tasks WHERE id=?1", params![id], |r| {
                    r.get(0)
                })
                .optional()
                .map_err(db_err)?;
            if exists.is_none() {
                return Ok(None);
            }
            if let Some(title) = &patch.title {
                conn.execute("UPDATE tasks SET title=?1 WHERE id=?2", params![title, id])
                    .map_err(db_err)?;
            }
            if let Some(description) = &patch.description {
                conn.execute(
                    "UPDATE tasks SET description=?1 WHERE id=?2",
                    params![description.as_deref(), id],
                )
                .map_err(db_err)?;
            }
            if let Some(status) = patch.status {
                conn.execute(
                    "UPDATE tasks SET status=?1 WHERE id=?2",
                    params![status.as_str(), id],
                )
                .map_err(db_err)?;
            }
            if let Some(due_date) = &patch.due_date {
                conn.execute(
                    "UPDATE tasks SET due_date=?1 WHERE id=?2",
                    params![due_date.map(|d| d.format(DATE_FMT).to_string()), id],
                )
                .map_err(db_err)?;
            }
            if let Some(project_id) = patch.project_id {
                conn.execute(
                    "UPDATE tasks SET project_id=?1 WHERE id=?2",
                    params![project_id, id],
                )
                .map_err(db_err)?;
            }
            if let Some(assigned) = &patch.assigned_user_id {
                conn.execute(
                    "UPDATE tasks SET assigned_user_id=?1 WHERE id=?2",
                    params![assigned, id],
                )
                .map_err(db_err)?;
            }
        }
        self.task_by_id(id)
    }

    /// Set just the status of a task — the scanner's transition write.
    pub fn set_task_status(&self, id: i64, status: TaskStatus) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "UPDATE tasks SET status=?1 WHERE id=?2",
            params![status.as_str(), id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Delete a task. Returns false when nothing matched.
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute("DELETE FROM tasks WHERE id=?1", params![id])
            .map_err(db_err)?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn seed_lead_and_project(store: &Store) -> (User, Project) {
        let lead = store
            .create_user("lead@example.com", "hash", UserRole::TeamLead)
            .unwrap();
        let project = store
            .create_project("Apollo", Some("Launch prep"), lead.id)
            .unwrap();
        (lead, project)
    }

    #[test]
    fn test_user_crud() {
        let store = store();
        let user = store
            .create_user("dev@example.com", "hash", UserRole::Developer)
            .unwrap();
        assert_eq!(user.id, 1);

        let found = store.user_by_email("dev@example.com").unwrap().unwrap();
        assert_eq!(found.role, UserRole::Developer);
        assert!(store.user_by_email("ghost@example.com").unwrap().is_none());

        // Duplicate email rejected
        let dup = store.create_user("dev@example.com", "hash2", UserRole::TeamLead);
        assert!(matches!(dup, Err(TaskHiveError::Validation(_))));
    }

    #[test]
    fn test_users_by_role() {
        let store = store();
        store
            .create_user("lead@example.com", "h", UserRole::TeamLead)
            .unwrap();
        store
            .create_user("dev1@example.com", "h", UserRole::Developer)
            .unwrap();
        store
            .create_user("dev2@example.com", "h", UserRole::Developer)
            .unwrap();
        assert_eq!(store.users_by_role(UserRole::TeamLead).unwrap().len(), 1);
        assert_eq!(store.users_by_role(UserRole::Developer).unwrap().len(), 2);
    }

    #[test]
    fn test_project_owner_scoping() {
        let store = store();
        let (lead, project) = seed_lead_and_project(&store);
        let other = store
            .create_user("other@example.com", "h", UserRole::TeamLead)
            .unwrap();

        // Patch by the wrong owner is a no-op
        let patch = ProjectPatch {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(store.update_project(project.id, other.id, &patch).unwrap().is_none());

        let updated = store
            .update_project(project.id, lead.id, &patch)
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");

        assert!(!store.delete_project(project.id, other.id).unwrap());
        assert!(store.delete_project(project.id, lead.id).unwrap());
        assert!(store.project_by_id(project.id).unwrap().is_none());
    }

    #[test]
    fn test_task_patch_closed_set() {
        let store = store();
        let (_, project) = seed_lead_and_project(&store);
        let dev = store
            .create_user("dev@example.com", "h", UserRole::Developer)
            .unwrap();
        let task = store
            .create_task("Fix bug", None, TaskStatus::Todo, None, project.id, Some(dev.id))
            .unwrap();

        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            assigned_user_id: Some(None), // explicit unassign
            ..Default::default()
        };
        let updated = store.update_task(task.id, &patch).unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.assigned_user_id.is_none());

        // Untouched fields survive
        assert_eq!(updated.title, "Fix bug");
    }

    #[test]
    fn test_due_date_queries() {
        let store = store();
        let (_, project) = seed_lead_and_project(&store);
        let dev = store
            .create_user("dev@example.com", "h", UserRole::Developer)
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let tomorrow = today.succ_opt().unwrap();

        store
            .create_task("Due today", None, TaskStatus::Todo, Some(today), project.id, Some(dev.id))
            .unwrap();
        store
            .create_task("Due tomorrow", None, TaskStatus::Todo, Some(tomorrow), project.id, Some(dev.id))
            .unwrap();
        store
            .create_task("Late", None, TaskStatus::InProgress, Some(yesterday), project.id, Some(dev.id))
            .unwrap();
        // Done and unassigned tasks are excluded from every sweep query
        store
            .create_task("Late but done", None, TaskStatus::Done, Some(yesterday), project.id, Some(dev.id))
            .unwrap();
        store
            .create_task("Late unassigned", None, TaskStatus::Todo, Some(yesterday), project.id, None)
            .unwrap();

        let due_today = store.tasks_due_on(today).unwrap();
        assert_eq!(due_today.len(), 1);
        assert_eq!(due_today[0].title, "Due today");

        let due_tomorrow = store.tasks_due_on(tomorrow).unwrap();
        assert_eq!(due_tomorrow.len(), 1);

        let overdue = store.tasks_overdue(today).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "Late");

        // Normalization scan set includes unassigned/undated ones, not done
        assert_eq!(store.tasks_not_done().unwrap().len(), 4);
    }

    #[test]
    fn test_set_task_status() {
        let store = store();
        let (_, project) = seed_lead_and_project(&store);
        let task = store
            .create_task("T", None, TaskStatus::Todo, None, project.id, None)
            .unwrap();
        store.set_task_status(task.id, TaskStatus::Pending).unwrap();
        assert_eq!(
            store.task_by_id(task.id).unwrap().unwrap().status,
            TaskStatus::Pending
        );
    }

    #[test]
    fn test_delete_project_cascades_tasks() {
        let store = store();
        let (lead, project) = seed_lead_and_project(&store);
        store
            .create_task("T", None, TaskStatus::Todo, None, project.id, None)
            .unwrap();
        store.delete_project(project.id, lead.id).unwrap();
        assert!(store.list_tasks().unwrap().is_empty());
    }
}
