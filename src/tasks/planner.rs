use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::debug;
use rusqlite::Connection;

use super::recurrence::{materialize, should_generate};
use crate::db::repository::TaskRepo;
use crate::models::{PrayerTime, Task};

/// All tasks on `date`, creating any recurring instances that are due.
pub fn tasks_for_day(conn: &Connection, date: NaiveDate) -> Result<Vec<Task>> {
    let mut tasks = TaskRepo::on_date(conn, date)?;
    let parents = TaskRepo::recurring_parents_until(conn, date)?;

    for parent in &parents {
        if !should_generate(date, parent, &tasks) {
            continue;
        }
        if let Some(mut instance) = materialize(parent, date) {
            instance.id = Some(TaskRepo::insert(conn, &instance)?);
            debug!(
                "materialized '{}' on {} from task {:?}",
                instance.title, date, parent.id
            );
            tasks.push(instance);
        }
    }

    tasks.sort_by_key(|t| (t.scheduled_at, t.id));
    Ok(tasks)
}

pub fn create_task(conn: &Connection, mut task: Task) -> Result<Task> {
    task.id = Some(TaskRepo::insert(conn, &task)?);
    Ok(task)
}

/// Flip completion, stamping or clearing the completion time.
pub fn toggle_complete(conn: &Connection, id: i64, now: NaiveDateTime) -> Result<Task> {
    let mut task = TaskRepo::get(conn, id)?.with_context(|| format!("No task with id {}", id))?;
    task.completed = !task.completed;
    task.completed_at = task.completed.then_some(now);
    TaskRepo::set_completed(conn, id, task.completed, task.completed_at)?;
    Ok(task)
}

/// Delete one task. Removing a recurring instance records its date on the
/// parent so it is not generated again.
pub fn delete_instance(conn: &Connection, id: i64) -> Result<bool> {
    let Some(task) = TaskRepo::get(conn, id)? else {
        return Ok(false);
    };
    if let (Some(parent_id), Some(date)) = (task.parent_id, task.scheduled_date()) {
        if TaskRepo::get(conn, parent_id)?.is_some() {
            TaskRepo::add_dismissal(conn, parent_id, date)?;
        }
    }
    TaskRepo::delete(conn, id)
}

/// Delete a whole series given the parent or any of its instances.
pub fn delete_series(conn: &Connection, id: i64) -> Result<usize> {
    let task = TaskRepo::get(conn, id)?.with_context(|| format!("No task with id {}", id))?;
    let root = task.parent_id.unwrap_or(id);
    TaskRepo::delete_with_children(conn, root)
}

fn task_span(task: &Task) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = task.scheduled_at?;
    Some((start, start + Duration::minutes(task.duration_minutes as i64)))
}

/// Prayers whose window overlaps the task.
pub fn conflicts<'p>(task: &Task, prayers: &'p [PrayerTime]) -> Vec<&'p PrayerTime> {
    let Some((start, end)) = task_span(task) else {
        return Vec::new();
    };
    prayers
        .iter()
        .filter(|p| {
            let (ws, we) = p.window();
            start < we && ws < end
        })
        .collect()
}

/// Earliest start at or after `after` where `minutes` fit between prayer
/// windows.
pub fn first_free_slot(prayers: &[PrayerTime], after: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let length = Duration::minutes(minutes as i64);
    let mut windows: Vec<_> = prayers.iter().map(|p| p.window()).collect();
    windows.sort();

    let mut candidate = after;
    for (ws, we) in windows {
        if candidate + length <= ws {
            break;
        }
        if candidate < we {
            candidate = we;
        }
    }
    candidate
}
