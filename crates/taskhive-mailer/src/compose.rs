//! Notification composer — builds subject/body for each event type from
//! task/user/project snapshots and hands the result to the delivery queue.
//!
//! Lookup failures (missing assignee, vanished user) skip the notification
//! silently; nothing here can fail the triggering business operation.

use chrono::NaiveDate;
use std::sync::Arc;

use taskhive_core::types::{Task, TaskStatus, User};
use taskhive_db::Store;

use crate::queue::Mailer;

const SIGNATURE: &str = "Best regards,\nTask Management System";

/// Composes and enqueues notification emails. Read-only store access plus
/// enqueue calls — no other I/O.
pub struct Notifier {
    store: Arc<Store>,
    mailer: Mailer,
}

impl Notifier {
    pub fn new(store: Arc<Store>, mailer: Mailer) -> Self {
        Self { store, mailer }
    }

    fn project_name(&self, project_id: i64) -> String {
        self.store
            .project_by_id(project_id)
            .ok()
            .flatten()
            .map(|p| p.name)
            .unwrap_or_else(|| "Unknown Project".to_string())
    }

    fn assignee(&self, task: &Task) -> Option<User> {
        let user_id = task.assigned_user_id?;
        self.store.user_by_id(user_id).ok().flatten()
    }

    /// Assignment email to the task's assignee. Skipped when the task has no
    /// assignee or the assignee cannot be resolved.
    pub fn task_assigned(&self, task: &Task) {
        let Some(user) = self.assignee(task) else {
            return;
        };
        let project_name = self.project_name(task.project_id);

        let due_line = task
            .due_date
            .map(|d| format!("⏰ Due Date: {d}\n"))
            .unwrap_or_default();
        let body = format!(
            "Hello {email},\n\n\
             You have been assigned a new task:\n\n\
             📋 Task: {title}\n\
             📝 Description: {description}\n\
             🏢 Project: {project_name}\n\
             📅 Status: {status}\n\
             {due_line}\n\
             Please log in to your task management dashboard to view details.\n\n\
             {SIGNATURE}",
            email = user.email,
            title = task.title,
            description = task.description.as_deref().unwrap_or(""),
            status = task.status,
        );

        self.mailer
            .enqueue_email(&user.email, "🎯 New Task Assigned", &body);
        tracing::info!("Task assignment email queued for {}", user.email);
    }

    /// Status-change email. Skipped when the task has no assignee.
    pub fn task_status_changed(&self, task: &Task, old_status: TaskStatus) {
        let Some(user) = self.assignee(task) else {
            return;
        };
        let project_name = self.project_name(task.project_id);

        let due_line = task
            .due_date
            .map(|d| format!("⏰ Due Date: {d}\n"))
            .unwrap_or_default();
        let subject = format!("📊 Task Status Updated: {}", task.title);
        let body = format!(
            "Hello {email},\n\n\
             Your task status has been updated:\n\n\
             📋 Task: {title}\n\
             🏢 Project: {project_name}\n\
             📊 Status: {old_emoji} {old} → {new_emoji} {new}\n\
             {due_line}\n\
             Keep up the great work!\n\n\
             {SIGNATURE}",
            email = user.email,
            title = task.title,
            old_emoji = old_status.emoji(),
            old = old_status,
            new_emoji = task.status.emoji(),
            new = task.status,
        );

        self.mailer.enqueue_email(&user.email, &subject, &body);
        tracing::info!("Task status change email queued for {}", user.email);
    }

    /// Reassignment: an assignment email to the new assignee, plus a
    /// "reassigned away" email to the previous one (skipped when there was
    /// none).
    pub fn task_reassigned(&self, task: &Task, old_assignee_id: Option<i64>) {
        self.task_assigned(task);

        let Some(old_id) = old_assignee_id else {
            return;
        };
        let Some(old_user) = self.store.user_by_id(old_id).ok().flatten() else {
            return;
        };

        let body = format!(
            "Hello {email},\n\n\
             The following task has been reassigned to another team member:\n\n\
             📋 Task: {title}\n\
             📝 Description: {description}\n\n\
             Thank you for your previous work on this task.\n\n\
             {SIGNATURE}",
            email = old_user.email,
            title = task.title,
            description = task.description.as_deref().unwrap_or(""),
        );

        self.mailer
            .enqueue_email(&old_user.email, "📤 Task Reassigned", &body);
        tracing::info!(
            "Task reassignment email queued for previous assignee {}",
            old_user.email
        );
    }

    /// Due-today reminder.
    pub fn due_today(&self, task: &Task) {
        let Some(user) = self.assignee(task) else {
            return;
        };
        let project_name = self.project_name(task.project_id);
        let due = task.due_date.map(|d| d.to_string()).unwrap_or_default();

        let body = format!(
            "Hello {email},\n\n\
             ⚠️ URGENT: You have a task due TODAY that requires immediate attention!\n\n\
             📋 Task: {title}\n\
             📝 Description: {description}\n\
             🏢 Project: {project_name}\n\
             📅 Due Date: {due} (TODAY)\n\
             📊 Current Status: {status}\n\n\
             Please complete this task today to avoid it becoming overdue.\n\n\
             {SIGNATURE}",
            email = user.email,
            title = task.title,
            description = task.description.as_deref().unwrap_or(""),
            status = task.status,
        );

        self.mailer
            .enqueue_email(&user.email, "🚨 Task Due TODAY - Action Required", &body);
        tracing::info!("Due today reminder email queued for {}", user.email);
    }

    /// Due-tomorrow reminder.
    pub fn due_tomorrow(&self, task: &Task) {
        let Some(user) = self.assignee(task) else {
            return;
        };
        let project_name = self.project_name(task.project_id);
        let due = task.due_date.map(|d| d.to_string()).unwrap_or_default();

        let body = format!(
            "Hello {email},\n\n\
             🚨 Friendly reminder: You have a task due tomorrow!\n\n\
             📋 Task: {title}\n\
             📝 Description: {description}\n\
             🏢 Project: {project_name}\n\
             📅 Due Date: {due}\n\
             📊 Current Status: {status}\n\n\
             Please ensure you complete this task on time.\n\n\
             {SIGNATURE}",
            email = user.email,
            title = task.title,
            description = task.description.as_deref().unwrap_or(""),
            status = task.status,
        );

        self.mailer
            .enqueue_email(&user.email, "⏰ Task Due Tomorrow - Reminder", &body);
        tracing::info!(
            "Due tomorrow reminder queued for {} (task: {})",
            user.email,
            task.title
        );
    }

    /// Overdue reminder with the days-past-due count.
    pub fn overdue(&self, task: &Task, today: NaiveDate) {
        let Some(user) = self.assignee(task) else {
            return;
        };
        let Some(due) = task.due_date else {
            return;
        };
        let project_name = self.project_name(task.project_id);
        let days_overdue = (today - due).num_days();

        let subject = format!("🚨 OVERDUE: Task {days_overdue} day(s) past due");
        let body = format!(
            "Hello {email},\n\n\
             ⚠️ URGENT: You have an overdue task that needs immediate attention!\n\n\
             📋 Task: {title}\n\
             📝 Description: {description}\n\
             🏢 Project: {project_name}\n\
             📅 Due Date: {due}\n\
             🚨 Days Overdue: {days_overdue}\n\
             📊 Current Status: {status}\n\n\
             Please prioritize this task and update its status as soon as possible.\n\n\
             {SIGNATURE}",
            email = user.email,
            title = task.title,
            description = task.description.as_deref().unwrap_or(""),
            status = task.status,
        );

        self.mailer.enqueue_email(&user.email, &subject, &body);
        tracing::info!(
            "Overdue reminder queued for {} (task: {}, {} days overdue)",
            user.email,
            task.title,
            days_overdue
        );
    }

    /// The daily-normalization notice sent when a task is parked as pending
    /// because its due date passed.
    pub fn task_marked_overdue(&self, task: &Task, user: &User) {
        let body = format!(
            "The task '{}' is overdue. Please update its status.",
            task.title
        );
        self.mailer
            .enqueue_email(&user.email, "Task Overdue Notification", &body);
    }

    /// Weekly summary for one team lead, aggregated across owned projects.
    /// Returns true when a summary was enqueued, false when skipped (no
    /// projects, or zero tasks across them).
    pub fn weekly_summary(&self, lead: &User, today: NaiveDate) -> bool {
        let Ok(projects) = self.store.projects_by_owner(lead.id) else {
            return false;
        };
        if projects.is_empty() {
            return false;
        }

        let mut total_tasks = 0usize;
        let mut completed_tasks = 0usize;
        let mut overdue_tasks = 0usize;
        let mut project_summaries = Vec::new();

        for project in &projects {
            let tasks = self.store.tasks_by_project(project.id).unwrap_or_default();
            let project_total = tasks.len();
            let project_completed = tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .count();
            let project_overdue = tasks
                .iter()
                .filter(|t| t.is_overdue(today) && t.status != TaskStatus::Done)
                .count();

            total_tasks += project_total;
            completed_tasks += project_completed;
            overdue_tasks += project_overdue;

            project_summaries.push(format!(
                "  • {}: {}/{} completed, {} overdue",
                project.name, project_completed, project_total, project_overdue
            ));
        }

        if total_tasks == 0 {
            return false;
        }

        let completion_rate = completed_tasks as f64 / total_tasks as f64 * 100.0;
        // Approximation, not a strict partition: a task can be both overdue
        // and otherwise counted, so this can go negative.
        let in_progress = total_tasks as i64 - completed_tasks as i64 - overdue_tasks as i64;

        let action_line = if overdue_tasks > 0 {
            format!("⚠️  Action Required: {overdue_tasks} tasks are overdue and need attention.")
        } else {
            "✅ Great job! No overdue tasks.".to_string()
        };

        let subject = format!("📊 Weekly Team Summary - {completion_rate:.1}% Completion Rate");
        let body = format!(
            "Hello {email},\n\n\
             Here's your weekly team summary:\n\n\
             📈 OVERVIEW:\n\
             • Total Tasks: {total_tasks}\n\
             • Completed: {completed_tasks} ({completion_rate:.1}%)\n\
             • Overdue: {overdue_tasks}\n\
             • In Progress: {in_progress}\n\n\
             🏢 PROJECT BREAKDOWN:\n\
             {breakdown}\n\n\
             {action_line}\n\n\
             {SIGNATURE}",
            email = lead.email,
            breakdown = project_summaries.join("\n"),
        );

        self.mailer.enqueue_email(&lead.email, &subject, &body);
        tracing::info!("Weekly summary queued for team lead: {}", lead.email);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devlog::DevMailer;
    use std::path::PathBuf;
    use taskhive_core::types::UserRole;

    struct Fixture {
        store: Arc<Store>,
        notifier: Notifier,
        mailer: Mailer,
        transport: Arc<DevMailer>,
        log_dir: PathBuf,
    }

    fn fixture(name: &str) -> Fixture {
        let log_dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&log_dir).ok();
        let transport = Arc::new(DevMailer::new(log_dir.join("sent_emails.json")));
        let mailer = Mailer::start(transport.clone());
        let store = Arc::new(Store::open_in_memory().unwrap());
        let notifier = Notifier::new(store.clone(), mailer.clone());
        Fixture {
            store,
            notifier,
            mailer,
            transport,
            log_dir,
        }
    }

    impl Fixture {
        fn seed(&self) -> (User, User, Task) {
            let lead = self
                .store
                .create_user("lead@example.com", "h", UserRole::TeamLead)
                .unwrap();
            let dev = self
                .store
                .create_user("dev@example.com", "h", UserRole::Developer)
                .unwrap();
            let project = self
                .store
                .create_project("Apollo", None, lead.id)
                .unwrap();
            let task = self
                .store
                .create_task(
                    "Wire telemetry",
                    Some("Hook up the downlink"),
                    TaskStatus::Todo,
                    None,
                    project.id,
                    Some(dev.id),
                )
                .unwrap();
            (lead, dev, task)
        }

        fn cleanup(&self) {
            std::fs::remove_dir_all(&self.log_dir).ok();
        }
    }

    #[tokio::test]
    async fn test_assignment_email_content() {
        let fx = fixture("taskhive-test-compose-assign");
        let (_, _, task) = fx.seed();

        fx.notifier.task_assigned(&task);
        fx.mailer.flush().await;

        let records = fx.transport.recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to, "dev@example.com");
        assert_eq!(records[0].subject, "🎯 New Task Assigned");
        assert!(records[0].body.contains("Wire telemetry"));
        assert!(records[0].body.contains("Apollo"));
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_assignment_skipped_without_assignee() {
        let fx = fixture("taskhive-test-compose-skip");
        let (_, _, mut task) = fx.seed();
        task.assigned_user_id = None;

        fx.notifier.task_assigned(&task);
        fx.mailer.flush().await;

        assert!(fx.transport.recent(10).unwrap().is_empty());
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_reassignment_two_emails_with_prior_assignee() {
        let fx = fixture("taskhive-test-compose-reassign");
        let (_, dev, mut task) = fx.seed();
        let new_dev = fx
            .store
            .create_user("new@example.com", "h", UserRole::Developer)
            .unwrap();
        task.assigned_user_id = Some(new_dev.id);

        fx.notifier.task_reassigned(&task, Some(dev.id));
        fx.mailer.flush().await;

        let records = fx.transport.recent(10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to, "new@example.com");
        assert_eq!(records[0].subject, "🎯 New Task Assigned");
        assert_eq!(records[1].to, "dev@example.com");
        assert_eq!(records[1].subject, "📤 Task Reassigned");
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_reassignment_one_email_without_prior_assignee() {
        let fx = fixture("taskhive-test-compose-first-assign");
        let (_, _, task) = fx.seed();

        fx.notifier.task_reassigned(&task, None);
        fx.mailer.flush().await;

        assert_eq!(fx.transport.recent(10).unwrap().len(), 1);
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_status_change_shows_transition() {
        let fx = fixture("taskhive-test-compose-status");
        let (_, _, mut task) = fx.seed();
        task.status = TaskStatus::InProgress;

        fx.notifier.task_status_changed(&task, TaskStatus::Todo);
        fx.mailer.flush().await;

        let records = fx.transport.recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].body.contains("todo → "));
        assert!(records[0].body.contains("in_progress"));
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_overdue_days_count() {
        let fx = fixture("taskhive-test-compose-overdue");
        let (_, _, mut task) = fx.seed();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        task.due_date = Some(NaiveDate::from_ymd_opt(2026, 8, 3).unwrap());

        fx.notifier.overdue(&task, today);
        fx.mailer.flush().await;

        let records = fx.transport.recent(10).unwrap();
        assert_eq!(records[0].subject, "🚨 OVERDUE: Task 3 day(s) past due");
        assert!(records[0].body.contains("Days Overdue: 3"));
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_weekly_summary_completion_rate() {
        let fx = fixture("taskhive-test-compose-weekly");
        let (lead, dev, _) = fx.seed();
        let project2 = fx
            .store
            .create_project("Borealis", None, lead.id)
            .unwrap();
        // 10 tasks total across projects (1 seeded + 9 here), 7 done
        for i in 0..9 {
            let status = if i < 7 { TaskStatus::Done } else { TaskStatus::Todo };
            fx.store
                .create_task(&format!("t{i}"), None, status, None, project2.id, Some(dev.id))
                .unwrap();
        }
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        assert!(fx.notifier.weekly_summary(&lead, today));
        fx.mailer.flush().await;

        let records = fx.transport.recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to, "lead@example.com");
        assert!(records[0].subject.contains("70.0% Completion Rate"));
        assert!(records[0].body.contains("Total Tasks: 10"));
        assert!(records[0].body.contains("Completed: 7 (70.0%)"));
        assert!(records[0].body.contains("• Apollo:"));
        assert!(records[0].body.contains("• Borealis:"));
        fx.cleanup();
    }

    #[tokio::test]
    async fn test_weekly_summary_skipped_without_projects() {
        let fx = fixture("taskhive-test-compose-weekly-skip");
        let lonely = fx
            .store
            .create_user("lonely@example.com", "h", UserRole::TeamLead)
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        assert!(!fx.notifier.weekly_summary(&lonely, today));
        fx.mailer.flush().await;
        assert!(fx.transport.recent(10).unwrap().is_empty());
        fx.cleanup();
    }
}
