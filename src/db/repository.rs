use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use crate::models::{PrayerKind, PrayerTime, RecurrenceRule, Task, TaskCategory};
use crate::prayer_times::methods::CalculationMethod;
use crate::utils::format::{DATETIME_FMT, DATE_FMT};
use crate::utils::geo::Coordinates;

/// Stored and queried coordinates are both snapped to the 0.1° grid, so a
/// difference under half a cell means the same cell.
const SAME_CELL_EPS: f64 = 0.05;

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| conversion_err(idx, e))
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|e| conversion_err(idx, e))
}

fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = start + Duration::days(1);
    (
        start.format(DATETIME_FMT).to_string(),
        end.format(DATETIME_FMT).to_string(),
    )
}

// ─── Prayer times ────────────────────────────────────────────────────────────

const PRAYER_COLUMNS: &str = "id, date, kind, adhan, duration_minutes, buffer_before,
    buffer_after, method, latitude, longitude, hijri";

fn row_to_prayer(row: &Row) -> rusqlite::Result<PrayerTime> {
    let date: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let adhan: String = row.get(3)?;
    let method: String = row.get(7)?;
    Ok(PrayerTime {
        id: Some(row.get(0)?),
        date: parse_date(1, &date)?,
        kind: PrayerKind::from_str(&kind).map_err(|e| conversion_err(2, e))?,
        adhan: parse_datetime(3, &adhan)?,
        duration_minutes: row.get(4)?,
        buffer_before: row.get(5)?,
        buffer_after: row.get(6)?,
        method: CalculationMethod::from_str(&method).map_err(|e| conversion_err(7, e))?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        hijri: row.get(10)?,
    })
}

pub struct PrayerTimeRepo;

impl PrayerTimeRepo {
    /// Rows for one (date, location cell, method) tuple, ordered by adhan.
    pub fn find_for_day(
        conn: &Connection,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> rusqlite::Result<Vec<PrayerTime>> {
        let c = coords.rounded();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM prayer_times
             WHERE date = ?1
               AND ABS(latitude - ?2) < ?4
               AND ABS(longitude - ?3) < ?4
               AND method = ?5
             ORDER BY adhan",
            PRAYER_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                date.format(DATE_FMT).to_string(),
                c.latitude,
                c.longitude,
                SAME_CELL_EPS,
                method.name()
            ],
            row_to_prayer,
        )?;
        rows.collect()
    }

    /// Delete whatever is stored for the tuple and insert `times` in one
    /// transaction. Returns the rows with their new ids.
    pub fn replace_for_day(
        conn: &Connection,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
        times: &[PrayerTime],
    ) -> rusqlite::Result<Vec<PrayerTime>> {
        let c = coords.rounded();
        let date_str = date.format(DATE_FMT).to_string();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM prayer_times
             WHERE date = ?1
               AND ABS(latitude - ?2) < ?4
               AND ABS(longitude - ?3) < ?4
               AND method = ?5",
            params![date_str, c.latitude, c.longitude, SAME_CELL_EPS, method.name()],
        )?;

        let mut stored = Vec::with_capacity(times.len());
        for t in times {
            tx.execute(
                "INSERT INTO prayer_times
                    (date, kind, adhan, duration_minutes, buffer_before, buffer_after,
                     method, latitude, longitude, hijri)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    date_str,
                    t.kind.as_str(),
                    t.adhan.format(DATETIME_FMT).to_string(),
                    t.duration_minutes,
                    t.buffer_before,
                    t.buffer_after,
                    method.name(),
                    c.latitude,
                    c.longitude,
                    t.hijri,
                ],
            )?;
            let mut t = t.clone();
            t.id = Some(tx.last_insert_rowid());
            stored.push(t);
        }

        tx.commit()?;
        stored.sort_by_key(|t| t.adhan);
        Ok(stored)
    }

    pub fn clear_all(conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute("DELETE FROM prayer_times", [])
    }
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

const TASK_COLUMNS: &str = "id, title, duration_minutes, category, scheduled_at, due_date,
    notes, completed, completed_at, recurrence, parent_id, dismissed_dates";

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let category: String = row.get(3)?;
    let scheduled_at: Option<String> = row.get(4)?;
    let due_date: Option<String> = row.get(5)?;
    let completed_at: Option<String> = row.get(8)?;
    let recurrence: Option<String> = row.get(9)?;
    let dismissed: String = row.get(11)?;

    Ok(Task {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        duration_minutes: row.get(2)?,
        category: TaskCategory::from_str(&category).map_err(|e| conversion_err(3, e))?,
        scheduled_at: scheduled_at
            .as_deref()
            .map(|s| parse_datetime(4, s))
            .transpose()?,
        due_date: due_date.as_deref().map(|s| parse_date(5, s)).transpose()?,
        notes: row.get(6)?,
        completed: row.get::<_, i32>(7)? != 0,
        completed_at: completed_at
            .as_deref()
            .map(|s| parse_datetime(8, s))
            .transpose()?,
        recurrence: recurrence
            .as_deref()
            .map(serde_json::from_str::<RecurrenceRule>)
            .transpose()
            .map_err(|e| conversion_err(9, e))?,
        parent_id: row.get(10)?,
        dismissed_dates: serde_json::from_str(&dismissed).map_err(|e| conversion_err(11, e))?,
    })
}

struct TaskColumns {
    scheduled_at: Option<String>,
    due_date: Option<String>,
    completed_at: Option<String>,
    recurrence: Option<String>,
    dismissed_dates: String,
}

impl TaskColumns {
    fn from_task(task: &Task) -> Result<Self> {
        anyhow::ensure!(
            task.parent_id.is_none() || task.recurrence.is_none(),
            "a recurring instance cannot carry its own recurrence rule"
        );
        Ok(Self {
            scheduled_at: task.scheduled_at.map(|d| d.format(DATETIME_FMT).to_string()),
            due_date: task.due_date.map(|d| d.format(DATE_FMT).to_string()),
            completed_at: task.completed_at.map(|d| d.format(DATETIME_FMT).to_string()),
            recurrence: task
                .recurrence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("Serializing recurrence rule")?,
            dismissed_dates: serde_json::to_string(&task.dismissed_dates)
                .context("Serializing dismissed dates")?,
        })
    }
}

pub struct TaskRepo;

impl TaskRepo {
    pub fn insert(conn: &Connection, task: &Task) -> Result<i64> {
        let cols = TaskColumns::from_task(task)?;
        conn.execute(
            "INSERT INTO tasks
                (title, duration_minutes, category, scheduled_at, due_date, notes,
                 completed, completed_at, recurrence, parent_id, dismissed_dates)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.title,
                task.duration_minutes,
                task.category.as_str(),
                cols.scheduled_at,
                cols.due_date,
                task.notes,
                task.completed as i32,
                cols.completed_at,
                cols.recurrence,
                task.parent_id,
                cols.dismissed_dates,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(conn: &Connection, task: &Task) -> Result<()> {
        let id = task.id.context("Cannot update a task that was never saved")?;
        let cols = TaskColumns::from_task(task)?;
        conn.execute(
            "UPDATE tasks SET
                title = ?1, duration_minutes = ?2, category = ?3, scheduled_at = ?4,
                due_date = ?5, notes = ?6, completed = ?7, completed_at = ?8,
                recurrence = ?9, parent_id = ?10, dismissed_dates = ?11
             WHERE id = ?12",
            params![
                task.title,
                task.duration_minutes,
                task.category.as_str(),
                cols.scheduled_at,
                cols.due_date,
                task.notes,
                task.completed as i32,
                cols.completed_at,
                cols.recurrence,
                task.parent_id,
                cols.dismissed_dates,
                id,
            ],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Task>> {
        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id],
            row_to_task,
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    /// Tasks whose start falls on `date`, earliest first.
    pub fn on_date(conn: &Connection, date: NaiveDate) -> Result<Vec<Task>> {
        let (start, end) = day_bounds(date);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks
             WHERE scheduled_at >= ?1 AND scheduled_at < ?2
             ORDER BY scheduled_at, id",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![start, end], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    /// Series parents that started on or before `date`.
    pub fn recurring_parents_until(conn: &Connection, date: NaiveDate) -> Result<Vec<Task>> {
        let (_, end) = day_bounds(date);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks
             WHERE recurrence IS NOT NULL AND parent_id IS NULL
               AND scheduled_at IS NOT NULL AND scheduled_at < ?1
             ORDER BY scheduled_at, id",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![end], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn children_of(conn: &Connection, parent_id: i64) -> Result<Vec<Task>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE parent_id = ?1 ORDER BY scheduled_at, id",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![parent_id], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    /// Tasks with no start time, newest first.
    pub fn unscheduled(conn: &Connection) -> Result<Vec<Task>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE scheduled_at IS NULL ORDER BY id DESC",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn set_completed(
        conn: &Connection,
        id: i64,
        completed: bool,
        at: Option<NaiveDateTime>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE tasks SET completed = ?1, completed_at = ?2 WHERE id = ?3",
            params![
                completed as i32,
                at.map(|d| d.format(DATETIME_FMT).to_string()),
                id
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Delete a series parent and every materialized instance of it.
    pub fn delete_with_children(conn: &Connection, id: i64) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let children = tx.execute("DELETE FROM tasks WHERE parent_id = ?1", params![id])?;
        let parent = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(children + parent)
    }

    /// Remember that the user removed the occurrence on `date`.
    pub fn add_dismissal(conn: &Connection, id: i64, date: NaiveDate) -> Result<()> {
        let mut task = Self::get(conn, id)?
            .with_context(|| format!("No task with id {}", id))?;
        if !task.dismissed_dates.contains(&date) {
            task.dismissed_dates.push(date);
            task.dismissed_dates.sort();
            Self::update(conn, &task)?;
        }
        Ok(())
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{Frequency, RecurrenceRule};
    use chrono::NaiveTime;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn prayer(date: NaiveDate, kind: PrayerKind, h: u32, m: u32, coords: Coordinates) -> PrayerTime {
        let c = coords.rounded();
        PrayerTime {
            id: None,
            date,
            kind,
            adhan: at(date, h, m),
            duration_minutes: 20,
            buffer_before: 5,
            buffer_after: 10,
            method: CalculationMethod::Karachi,
            latitude: c.latitude,
            longitude: c.longitude,
            hijri: Some("19 Jumada al-Thani 1445".into()),
        }
    }

    fn five(date: NaiveDate, coords: Coordinates) -> Vec<PrayerTime> {
        vec![
            prayer(date, PrayerKind::Isha, 18, 59, coords),
            prayer(date, PrayerKind::Fajr, 5, 26, coords),
            prayer(date, PrayerKind::Maghrib, 17, 35, coords),
            prayer(date, PrayerKind::Dhuhr, 12, 13, coords),
            prayer(date, PrayerKind::Asr, 15, 3, coords),
        ]
    }

    #[test]
    fn test_replace_then_find_sorted_by_adhan() {
        let conn = setup_db();
        let date = d(2024, 1, 1);
        let here = Coordinates::new(33.6938, 73.0651);
        PrayerTimeRepo::replace_for_day(&conn, date, here, CalculationMethod::Karachi, &five(date, here))
            .unwrap();

        let found =
            PrayerTimeRepo::find_for_day(&conn, date, here, CalculationMethod::Karachi).unwrap();
        let kinds: Vec<_> = found.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, PrayerKind::daily().to_vec());
        assert!(found.windows(2).all(|w| w[0].adhan < w[1].adhan));
        assert!(found.iter().all(|p| p.id.is_some()));
    }

    #[test]
    fn test_find_tolerates_jitter_but_not_neighbouring_cells() {
        let conn = setup_db();
        let date = d(2024, 1, 1);
        let here = Coordinates::new(33.6938, 73.0651);
        PrayerTimeRepo::replace_for_day(&conn, date, here, CalculationMethod::Karachi, &five(date, here))
            .unwrap();

        let jitter = Coordinates::new(33.7102, 73.0599);
        assert_eq!(
            PrayerTimeRepo::find_for_day(&conn, date, jitter, CalculationMethod::Karachi)
                .unwrap()
                .len(),
            5
        );

        let next_cell = Coordinates::new(33.8, 73.0651);
        assert!(PrayerTimeRepo::find_for_day(&conn, date, next_cell, CalculationMethod::Karachi)
            .unwrap()
            .is_empty());

        assert!(PrayerTimeRepo::find_for_day(&conn, date, here, CalculationMethod::Egyptian)
            .unwrap()
            .is_empty());
        assert!(PrayerTimeRepo::find_for_day(&conn, d(2024, 1, 2), here, CalculationMethod::Karachi)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_replace_does_not_accumulate_rows() {
        let conn = setup_db();
        let date = d(2024, 1, 5);
        let here = Coordinates::new(21.4225, 39.8262);
        for _ in 0..3 {
            PrayerTimeRepo::replace_for_day(&conn, date, here, CalculationMethod::Karachi, &five(date, here))
                .unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM prayer_times", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(PrayerTimeRepo::clear_all(&conn).unwrap(), 5);
    }

    #[test]
    fn test_task_insert_get_with_rule() {
        let conn = setup_db();
        let mut task = Task::new("Read", 30, TaskCategory::Study);
        task.scheduled_at = Some(at(d(2024, 1, 1), 9, 0));
        task.due_date = Some(d(2024, 1, 31));
        task.notes = Some("Chapter 3".into());
        task.recurrence = Some(RecurrenceRule::new(Frequency::Daily, 2));

        let id = TaskRepo::insert(&conn, &task).unwrap();
        let loaded = TaskRepo::get(&conn, id).unwrap().unwrap();
        task.id = Some(id);
        assert_eq!(loaded, task);
    }

    #[test]
    fn test_instance_with_rule_is_rejected() {
        let conn = setup_db();
        let mut task = Task::new("Bad", 10, TaskCategory::Work);
        task.parent_id = Some(1);
        task.recurrence = Some(RecurrenceRule::new(Frequency::Daily, 1));
        assert!(TaskRepo::insert(&conn, &task).is_err());
    }

    #[test]
    fn test_on_date_uses_day_range() {
        let conn = setup_db();
        for (h, date) in [(0, d(2024, 1, 1)), (23, d(2024, 1, 1)), (0, d(2024, 1, 2))] {
            let mut t = Task::new("t", 10, TaskCategory::Personal);
            t.scheduled_at = Some(at(date, h, 0));
            TaskRepo::insert(&conn, &t).unwrap();
        }
        assert_eq!(TaskRepo::on_date(&conn, d(2024, 1, 1)).unwrap().len(), 2);
        assert_eq!(TaskRepo::on_date(&conn, d(2024, 1, 2)).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_with_children_only_touches_series() {
        let conn = setup_db();
        let mut parent = Task::new("Walk", 30, TaskCategory::Health);
        parent.scheduled_at = Some(at(d(2024, 1, 1), 7, 0));
        parent.recurrence = Some(RecurrenceRule::new(Frequency::Daily, 1));
        let pid = TaskRepo::insert(&conn, &parent).unwrap();

        let mut child = Task::new("Walk", 30, TaskCategory::Health);
        child.scheduled_at = Some(at(d(2024, 1, 2), 7, 0));
        child.parent_id = Some(pid);
        TaskRepo::insert(&conn, &child).unwrap();

        let other = TaskRepo::insert(&conn, &Task::new("Other", 5, TaskCategory::Errand)).unwrap();

        assert_eq!(TaskRepo::delete_with_children(&conn, pid).unwrap(), 2);
        assert!(TaskRepo::get(&conn, pid).unwrap().is_none());
        assert!(TaskRepo::children_of(&conn, pid).unwrap().is_empty());
        assert!(TaskRepo::get(&conn, other).unwrap().is_some());
    }

    #[test]
    fn test_add_dismissal_is_idempotent() {
        let conn = setup_db();
        let mut parent = Task::new("Gym", 60, TaskCategory::Health);
        parent.scheduled_at = Some(at(d(2024, 1, 1), 18, 0));
        parent.recurrence = Some(RecurrenceRule::new(Frequency::Daily, 1));
        let pid = TaskRepo::insert(&conn, &parent).unwrap();

        TaskRepo::add_dismissal(&conn, pid, d(2024, 1, 3)).unwrap();
        TaskRepo::add_dismissal(&conn, pid, d(2024, 1, 3)).unwrap();
        let loaded = TaskRepo::get(&conn, pid).unwrap().unwrap();
        assert_eq!(loaded.dismissed_dates, vec![d(2024, 1, 3)]);
    }

    #[test]
    fn test_meta_round_trip() {
        let conn = setup_db();
        assert!(MetaRepo::get(&conn, "k").unwrap().is_none());
        MetaRepo::set(&conn, "k", "1").unwrap();
        MetaRepo::set(&conn, "k", "2").unwrap();
        assert_eq!(MetaRepo::get(&conn, "k").unwrap().as_deref(), Some("2"));
    }
}
