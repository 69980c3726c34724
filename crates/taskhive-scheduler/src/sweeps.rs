//! The periodic task scans: status normalization, due-date reminders, and
//! weekly team-lead summaries.
//!
//! Each sweep is a plain function over the store and the notifier so it can
//! be run (and tested) directly; `register_sweeps` wires them into the
//! scheduler under their production schedules.

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use std::sync::Arc;

use taskhive_core::config::SchedulerConfig;
use taskhive_core::error::Result;
use taskhive_core::types::{TaskStatus, UserRole};
use taskhive_db::Store;
use taskhive_mailer::Notifier;

use crate::job::Scheduler;

/// Daily status normalization: overdue, not-done tasks are parked as
/// `pending` (with an overdue notice to the assignee); `pending` tasks whose
/// due date is no longer past revert to `todo` with no email. Idempotent:
/// a task already parked is left alone.
pub fn normalize_task_statuses(
    store: &Store,
    notifier: &Notifier,
    today: NaiveDate,
) -> Result<(usize, usize)> {
    let mut marked = 0;
    let mut reverted = 0;

    for task in store.tasks_not_done()? {
        if task.is_overdue(today) {
            if task.status != TaskStatus::Pending {
                store.set_task_status(task.id, TaskStatus::Pending)?;
                marked += 1;
                if let Some(user_id) = task.assigned_user_id
                    && let Ok(Some(user)) = store.user_by_id(user_id)
                {
                    notifier.task_marked_overdue(&task, &user);
                }
            }
        } else if task.status == TaskStatus::Pending {
            store.set_task_status(task.id, TaskStatus::Todo)?;
            reverted += 1;
        }
    }

    if marked > 0 || reverted > 0 {
        tracing::info!("🗂️ Status normalization: {marked} marked pending, {reverted} reverted");
    }
    Ok((marked, reverted))
}

/// Daily reminder sweep: due-today, due-tomorrow, and overdue reminders for
/// assigned, not-done tasks.
pub fn due_date_sweep(
    store: &Store,
    notifier: &Notifier,
    today: NaiveDate,
) -> Result<(usize, usize, usize)> {
    let due_today = store.tasks_due_on(today)?;
    for task in &due_today {
        notifier.due_today(task);
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    let due_tomorrow = store.tasks_due_on(tomorrow)?;
    for task in &due_tomorrow {
        notifier.due_tomorrow(task);
    }

    let overdue = store.tasks_overdue(today)?;
    for task in &overdue {
        notifier.overdue(task, today);
    }

    tracing::info!(
        "📨 Processed {} due today, {} due tomorrow, {} overdue tasks",
        due_today.len(),
        due_tomorrow.len(),
        overdue.len()
    );
    Ok((due_today.len(), due_tomorrow.len(), overdue.len()))
}

/// Weekly summary sweep: one aggregate email per team lead.
pub fn weekly_summary_sweep(
    store: &Store,
    notifier: &Notifier,
    today: NaiveDate,
) -> Result<usize> {
    let mut sent = 0;
    for lead in store.users_by_role(UserRole::TeamLead)? {
        if notifier.weekly_summary(&lead, today) {
            sent += 1;
        }
    }
    tracing::info!("📨 Weekly summaries sent to {sent} team lead(s)");
    Ok(sent)
}

/// Register the three production sweeps on the scheduler.
pub fn register_sweeps(
    scheduler: &mut Scheduler,
    config: &SchedulerConfig,
    store: Arc<Store>,
    notifier: Arc<Notifier>,
) {
    {
        let store = store.clone();
        let notifier = notifier.clone();
        scheduler.register_interval(
            "status-normalization",
            config.normalize_interval_secs,
            Arc::new(move || {
                let store = store.clone();
                let notifier = notifier.clone();
                async move {
                    normalize_task_statuses(&store, &notifier, Utc::now().date_naive())?;
                    Ok(())
                }
                .boxed()
            }),
        );
    }

    {
        let store = store.clone();
        let notifier = notifier.clone();
        scheduler.register_cron(
            "due-date-reminders",
            &config.reminder_cron,
            Arc::new(move || {
                let store = store.clone();
                let notifier = notifier.clone();
                async move {
                    due_date_sweep(&store, &notifier, Utc::now().date_naive())?;
                    Ok(())
                }
                .boxed()
            }),
        );
    }

    scheduler.register_cron(
        "weekly-team-summary",
        &config.summary_cron,
        Arc::new(move || {
            let store = store.clone();
            let notifier = notifier.clone();
            async move {
                weekly_summary_sweep(&store, &notifier, Utc::now().date_naive())?;
                Ok(())
            }
            .boxed()
        }),
    );
}
