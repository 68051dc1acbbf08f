use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use log::{debug, warn};
use rusqlite::Connection;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::args::{
    CacheCommands, LocationCommands, MethodCommands, SettingsCommands, TaskCommands,
};
use crate::config::settings::Theme;
use crate::config::AppConfig;
use crate::db::repository::{MetaRepo, PrayerTimeRepo, TaskRepo};
use crate::models::{Frequency, PrayerTime, RecurrenceEnd, RecurrenceRule, Task, TaskCategory};
use crate::prayer_times::client::HttpClient;
use crate::prayer_times::file_cache::FileCache;
use crate::prayer_times::methods::{CalculationMethod, IshaRule};
use crate::prayer_times::service::{
    current_prayer, next_prayer, require_location, spawn_prefetch, Origin, PrayerDefaults,
    PrayerTimeService, PrefetchJob,
};
use crate::tasks::planner;
use crate::utils::format::{
    format_date, format_datetime, format_duration_secs, format_minutes, format_time,
};
use crate::utils::geo::{same_place, should_refresh, Coordinates};
use crate::utils::locale::Language;

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

const LAST_PREFETCH_KEY: &str = "last_prefetch";
const LAST_FETCH_KEY: &str = "last_fetch";
const OFFLINE_KEY: &str = "offline";

/// Long-lived collaborators built once in `main`.
pub struct Services<'a> {
    pub conn: &'a Connection,
    pub files: &'a FileCache,
    pub client: &'a HttpClient,
    pub db_path: PathBuf,
}

impl<'a> Services<'a> {
    fn prayer_service(&self, config: &AppConfig) -> PrayerTimeService<'a, &'a HttpClient> {
        PrayerTimeService::new(
            self.conn,
            self.files,
            self.client,
            PrayerDefaults::from_config(&config.prayer),
        )
    }

    /// Prayer times for annotating tasks. Missing location or fetch failures
    /// only cost the annotation.
    fn prayers_if_available(&self, config: &AppConfig, date: NaiveDate) -> Option<Vec<PrayerTime>> {
        let coords = config.location.coordinates()?;
        match self
            .prayer_service(config)
            .resolve(date, coords, config.effective_method())
        {
            Ok(r) => Some(r.times),
            Err(e) => {
                warn!("prayer times unavailable for {}: {}", date, e);
                None
            }
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn parse_date_or_today(s: Option<&str>) -> Result<NaiveDate> {
    s.map(parse_date).transpose().map(|d| d.unwrap_or_else(today))
}

fn parse_start(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(dt);
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map(|t| today().and_time(t))
        .map_err(|_| anyhow!("Invalid start '{}'. Use \"YYYY-MM-DD HH:MM\" or HH:MM", s))
}

fn parse_weekday(s: &str) -> Result<Weekday> {
    Weekday::from_str(s.trim()).map_err(|_| anyhow!("Unknown weekday '{}'", s))
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(services: &Services, config: &AppConfig, date: Option<&str>) -> Result<()> {
    let date = parse_date_or_today(date)?;
    let coords = require_location(&config.location)?;
    let method = config.effective_method();
    let lang = config.appearance.language;

    let service = services.prayer_service(config);
    let resolved = service
        .resolve(date, coords, method)
        .with_context(|| format!("Could not load prayer times for {}", date))?;
    record_resolution(services.conn, resolved.origin)?;

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times — {} ({})",
        config.location.display_name(),
        format_date(date)
    );
    if let Some(hijri) = resolved.times.first().and_then(|t| t.hijri.as_deref()) {
        println_colored!(DIM, "  {}", hijri);
    }
    println_colored!(DIM, "  Method: {}", method);
    println!();

    let now = Local::now().naive_local();
    let current = current_prayer(&resolved.times, now).map(|p| p.kind);
    for prayer in &resolved.times {
        let line = format!(
            "  {:<10}  {}  {}",
            lang.prayer_name(prayer.kind),
            format_time(prayer.adhan.time()),
            format_minutes(prayer.duration_minutes)
        );
        if Some(prayer.kind) == current {
            println_colored!(GREEN, "{}  ← now", line);
        } else if prayer.ends_at() < now {
            println_colored!(DIM, "{}", line);
        } else {
            println_colored!(BOLD, "{}", line);
        }
    }

    if date == today() {
        if let Some(next) = next_prayer(&resolved.times, now) {
            println!();
            println_colored!(
                AMBER,
                "  Next: {} in {}",
                lang.prayer_name(next.kind),
                format_duration_secs((next.adhan - now).num_seconds())
            );
        }
    }

    if resolved.is_offline() {
        println!();
        println_colored!(AMBER, "  {}", lang.offline_notice());
    }
    println!();

    if date == today() && !resolved.is_offline() {
        start_background_prefetch(services, config, coords, method)?;
    }
    Ok(())
}

fn record_resolution(conn: &Connection, origin: Origin) -> Result<()> {
    let offline = if origin == Origin::OfflineFallback { "1" } else { "0" };
    MetaRepo::set(conn, OFFLINE_KEY, offline)?;
    if origin == Origin::Network {
        MetaRepo::set(conn, LAST_FETCH_KEY, &format_datetime(Local::now().naive_local()))?;
    }
    Ok(())
}

/// Warm the following days once per day, after today's times are on screen.
fn start_background_prefetch(
    services: &Services,
    config: &AppConfig,
    coords: Coordinates,
    method: CalculationMethod,
) -> Result<()> {
    let today = today();
    let today_str = format_date(today);
    if MetaRepo::get(services.conn, LAST_PREFETCH_KEY)?.as_deref() == Some(today_str.as_str()) {
        return Ok(());
    }
    let days = config.prayer.prefetch_days.saturating_sub(1);
    if days == 0 {
        return Ok(());
    }

    let job = PrefetchJob {
        db_path: services.db_path.clone(),
        cache_dir: services.files.dir().to_path_buf(),
        network: config.network.clone(),
        defaults: PrayerDefaults::from_config(&config.prayer),
        start: today.succ_opt().unwrap_or(today),
        days,
        coords,
        method,
    };
    let handle = spawn_prefetch(job);
    MetaRepo::set(services.conn, LAST_PREFETCH_KEY, &today_str)?;

    // The process would take the thread down with it; wait quietly.
    if handle.join().is_err() {
        warn!("background prefetch thread panicked");
    }
    debug!("background prefetch finished");
    Ok(())
}

// ─── Prefetch ────────────────────────────────────────────────────────────────

pub fn handle_prefetch(services: &Services, config: &AppConfig, days: Option<u32>) -> Result<()> {
    let coords = require_location(&config.location)?;
    let method = config.effective_method();
    let days = days.unwrap_or(config.prayer.prefetch_days);

    println!("  Fetching {} day(s) of prayer times...", days);
    let report = services.prayer_service(config).prefetch(
        today(),
        days,
        coords,
        method,
        std::time::Duration::from_millis(config.network.request_delay_ms),
    );
    MetaRepo::set(services.conn, LAST_PREFETCH_KEY, &format_date(today()))?;

    println_colored!(
        GREEN,
        "  ✓ {} fetched, {} already cached",
        report.fetched,
        report.skipped
    );
    if report.failed > 0 {
        println_colored!(RED, "  ✗ {} day(s) could not be fetched", report.failed);
    }
    Ok(())
}

// ─── Location ────────────────────────────────────────────────────────────────

pub fn handle_location(
    services: &Services,
    config: &mut AppConfig,
    action: &LocationCommands,
) -> Result<()> {
    match action {
        LocationCommands::Show => {
            match config.location.coordinates() {
                Some(c) => {
                    println!("  {}", config.location.display_name());
                    println_colored!(DIM, "  {:.4}, {:.4}", c.latitude, c.longitude);
                    if let Some(country) = &config.location.country {
                        println_colored!(DIM, "  Country: {}", country);
                    }
                }
                None => println!("  No location set. Use: waqt location set <lat> <lng>"),
            }
            Ok(())
        }
        LocationCommands::Set {
            latitude,
            longitude,
            name,
            country,
        } => {
            if !(-90.0..=90.0).contains(latitude) || !(-180.0..=180.0).contains(longitude) {
                bail!("Coordinates out of range: {}, {}", latitude, longitude);
            }
            let new = Coordinates::new(*latitude, *longitude);
            let previous = config.update_location(new, name.clone(), country.clone());
            config.persist();

            println_colored!(GREEN, "  ✓ Location set to {}", config.location.display_name());
            if config.prayer.method.is_none() {
                println_colored!(DIM, "  Method: {} (from country)", config.effective_method());
            }

            if should_refresh(previous.as_ref(), &new) {
                if let Some(prev) = previous {
                    println_colored!(
                        DIM,
                        "  Moved {:.0} km — refreshing prayer times",
                        prev.distance_to(&new) / 1000.0
                    );
                }
                match services
                    .prayer_service(config)
                    .resolve(today(), new, config.effective_method())
                {
                    Ok(r) => {
                        record_resolution(services.conn, r.origin)?;
                        println_colored!(GREEN, "  ✓ Prayer times updated");
                    }
                    Err(e) => println_colored!(AMBER, "  Could not refresh prayer times: {}", e),
                }
            } else if previous.is_some_and(|prev| same_place(&prev, &new)) {
                println_colored!(DIM, "  Same area as before; stored prayer times still apply");
            }
            Ok(())
        }
    }
}

// ─── Method ──────────────────────────────────────────────────────────────────

pub fn handle_method(config: &mut AppConfig, action: &MethodCommands) -> Result<()> {
    match action {
        MethodCommands::List => {
            let current = config.effective_method();
            for method in CalculationMethod::all() {
                let params = method.params();
                let isha = match params.isha {
                    IshaRule::Angle(a) => format!("{}°", a),
                    IshaRule::MinutesAfterMaghrib(m) => format!("{} min", m),
                };
                let line = format!(
                    "  {:>2}  {:<22} fajr {}°  isha {}",
                    method.api_code(),
                    method.name(),
                    params.fajr_angle,
                    isha
                );
                if *method == current {
                    println_colored!(GREEN, "{}  ✓", line);
                } else {
                    println!("{}", line);
                }
            }
            Ok(())
        }
        MethodCommands::Set { method } => {
            let method = CalculationMethod::from_str(method)?;
            config.prayer.method = Some(method);
            config.persist();
            println_colored!(GREEN, "  ✓ Calculation method: {}", method);
            Ok(())
        }
        MethodCommands::Auto => {
            config.prayer.method = None;
            config.persist();
            println_colored!(
                GREEN,
                "  ✓ Calculation method follows location: {}",
                config.effective_method()
            );
            Ok(())
        }
    }
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

fn build_rule(
    repeat: &str,
    every: u32,
    on: &[String],
    until: Option<&str>,
    count: Option<u32>,
) -> Result<RecurrenceRule> {
    let frequency = Frequency::from_str(repeat)?;
    let weekdays = on
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_weekday(s))
        .collect::<Result<Vec<_>>>()?;
    if !weekdays.is_empty() && frequency != Frequency::Weekly {
        bail!("--on only applies to weekly repeats");
    }

    let mut rule = RecurrenceRule::new(frequency, every).on_weekdays(weekdays);
    if let Some(until) = until {
        rule = rule.ending(RecurrenceEnd::OnDate(parse_date(until)?));
    } else if let Some(count) = count {
        rule = rule.ending(RecurrenceEnd::AfterOccurrences(count));
    }
    Ok(rule)
}

/// "weekly", "every 2 days", "weekly on Mon, Thu, 5 times" ...
fn repeat_label(rule: &RecurrenceRule) -> String {
    let mut label = if rule.interval > 1 {
        let unit = match rule.frequency {
            Frequency::Daily => "days",
            Frequency::Weekly => "weeks",
            Frequency::Monthly => "months",
        };
        format!("every {} {}", rule.interval, unit)
    } else {
        rule.frequency.as_str().to_string()
    };
    if let Some(days) = rule.weekdays.as_deref().filter(|d| !d.is_empty()) {
        let days: Vec<String> = days.iter().map(|d| d.to_string()).collect();
        label.push_str(&format!(" on {}", days.join(", ")));
    }
    match &rule.end {
        Some(RecurrenceEnd::OnDate(last)) => label.push_str(&format!(" until {}", format_date(*last))),
        Some(RecurrenceEnd::AfterOccurrences(n)) => label.push_str(&format!(", {} times", n)),
        None => {}
    }
    label
}

fn print_task(task: &Task, prayers: Option<&[PrayerTime]>, lang: Language) {
    let time = task
        .scheduled_at
        .map(|t| format_time(t.time()))
        .unwrap_or_else(|| "--:--".to_string());
    let mark = if task.completed { "✓" } else { "·" };
    let series = match &task.recurrence {
        Some(rule) if task.is_recurring_parent() => format!(" ↻ {}", repeat_label(rule)),
        _ if task.parent_id.is_some() => " ↻".to_string(),
        _ => String::new(),
    };
    let line = format!(
        "  {} {:>4}  {}  {:<28} {:>7}  {}{}",
        mark,
        task.id.unwrap_or_default(),
        time,
        task.title,
        format_minutes(task.duration_minutes),
        task.category.as_str(),
        series
    );
    if task.completed {
        println_colored!(DIM, "{}", line);
    } else {
        println!("{}", line);
    }

    if let Some(prayers) = prayers {
        for p in planner::conflicts(task, prayers) {
            println_colored!(
                AMBER,
                "           overlaps {} at {}",
                lang.prayer_name(p.kind),
                format_time(p.adhan.time())
            );
        }
    }
}

pub fn handle_task(services: &Services, config: &AppConfig, action: &TaskCommands) -> Result<()> {
    let lang = config.appearance.language;
    match action {
        TaskCommands::Add {
            title,
            duration,
            category,
            at,
            due,
            notes,
            avoid_prayers,
            repeat,
            every,
            on,
            until,
            count,
        } => {
            let mut task = Task::new(title, *duration, TaskCategory::from_str(category)?);
            task.scheduled_at = at.as_deref().map(parse_start).transpose()?;
            task.due_date = due.as_deref().map(parse_date).transpose()?;
            task.notes = notes.clone();

            if let Some(repeat) = repeat {
                if task.scheduled_at.is_none() {
                    bail!("Recurring tasks need a start (--at)");
                }
                task.recurrence = Some(build_rule(repeat, *every, on, until.as_deref(), *count)?);
            }

            let prayers = task
                .scheduled_date()
                .and_then(|d| services.prayers_if_available(config, d));

            if *avoid_prayers {
                match (task.scheduled_at, prayers.as_deref()) {
                    (Some(start), Some(prayers)) => {
                        let slot = planner::first_free_slot(prayers, start, *duration);
                        if slot != start {
                            println_colored!(DIM, "  Moved to {} to keep clear of prayer", format_time(slot.time()));
                        }
                        task.scheduled_at = Some(slot);
                    }
                    (None, _) => bail!("--avoid-prayers needs a start (--at)"),
                    (_, None) => println_colored!(AMBER, "  Prayer times unavailable; start left as given"),
                }
            }

            let task = planner::create_task(services.conn, task)?;
            println_colored!(GREEN, "  ✓ Added task #{}", task.id.unwrap_or_default());
            print_task(&task, prayers.as_deref(), lang);
            Ok(())
        }
        TaskCommands::List { date } => {
            let date = parse_date_or_today(date.as_deref())?;
            let tasks = planner::tasks_for_day(services.conn, date)?;
            let prayers = services.prayers_if_available(config, date);

            println!();
            println_colored!(GOLD, "  Tasks — {}", format_date(date));
            println!();
            if tasks.is_empty() {
                println_colored!(DIM, "  Nothing scheduled.");
            }
            for task in &tasks {
                print_task(task, prayers.as_deref(), lang);
            }

            let inbox = TaskRepo::unscheduled(services.conn)?;
            if !inbox.is_empty() {
                println!();
                println_colored!(BOLD, "  Unscheduled");
                for task in &inbox {
                    print_task(task, None, lang);
                }
            }
            println!();
            Ok(())
        }
        TaskCommands::Done { id } => {
            let task = planner::toggle_complete(services.conn, *id, Local::now().naive_local())?;
            if let Some(at) = task.completed_at {
                println_colored!(GREEN, "  ✓ '{}' done ({})", task.title, format_datetime(at));
            } else {
                println_colored!(AMBER, "  '{}' marked as not done", task.title);
            }
            Ok(())
        }
        TaskCommands::Delete { id, series } => {
            if *series {
                let removed = planner::delete_series(services.conn, *id)?;
                println_colored!(RED, "  ✗ Deleted series ({} task(s))", removed);
            } else {
                let kept = TaskRepo::children_of(services.conn, *id)?.len();
                if !planner::delete_instance(services.conn, *id)? {
                    bail!("No task with id {}", id);
                }
                println_colored!(RED, "  ✗ Deleted task #{}", id);
                if kept > 0 {
                    println_colored!(DIM, "  {} generated instance(s) kept; use --series to remove them", kept);
                }
            }
            Ok(())
        }
    }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

pub fn handle_cache(services: &Services, action: &CacheCommands) -> Result<()> {
    match action {
        CacheCommands::Clear => {
            let rows = PrayerTimeRepo::clear_all(services.conn)?;
            let files = services.files.clear_all()?;
            MetaRepo::set(services.conn, LAST_PREFETCH_KEY, "")?;
            println_colored!(
                GREEN,
                "  ✓ Cleared {} stored prayer(s) and {} cached response(s)",
                rows,
                files
            );
            Ok(())
        }
    }
}

// ─── Settings ────────────────────────────────────────────────────────────────

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

pub fn handle_settings(
    services: &Services,
    config: &mut AppConfig,
    action: &SettingsCommands,
) -> Result<()> {
    match action {
        SettingsCommands::Show => {
            let f = &config.features;
            println!("  Location       {}", config.location.display_name());
            println!("  Method         {}", config.effective_method());
            println!(
                "  Buffers        {} min before, {} min after",
                config.prayer.buffer_before, config.prayer.buffer_after
            );
            println!("  Notifications  {}", on_off(f.notifications));
            println!("  Pro            {}", on_off(f.pro));
            println!(
                "  Nawafil        {}{}",
                on_off(f.nawafil),
                if f.nawafil && !f.pro { " (requires Pro)" } else { "" }
            );
            if f.nawafil_active() {
                let p = &f.nawafil_prefs;
                println_colored!(
                    DIM,
                    "                 tahajjud {}, duha {}, ishraq {}, awwabin {}",
                    on_off(p.tahajjud),
                    on_off(p.duha),
                    on_off(p.ishraq),
                    on_off(p.awwabin)
                );
            }
            println!("  Theme          {:?}", config.appearance.theme);
            println!("  Language       {}", config.appearance.language.as_str());

            let last_fetch = MetaRepo::get(services.conn, LAST_FETCH_KEY)?;
            println_colored!(
                DIM,
                "  Last fetch     {}",
                last_fetch.as_deref().unwrap_or("never")
            );
            if MetaRepo::get(services.conn, OFFLINE_KEY)?.as_deref() == Some("1") {
                println_colored!(AMBER, "  Last prayer times were served offline");
            }
            Ok(())
        }
        SettingsCommands::Set {
            notifications,
            pro,
            nawafil,
            theme,
            language,
            buffer_before,
            buffer_after,
        } => {
            if let Some(v) = notifications {
                config.features.notifications = *v;
            }
            if let Some(v) = pro {
                config.features.pro = *v;
            }
            if let Some(v) = nawafil {
                config.features.nawafil = *v;
            }
            if let Some(theme) = theme {
                config.appearance.theme = Theme::from_str(theme)?;
            }
            if let Some(language) = language {
                config.appearance.language = Language::from_str(language)?;
            }
            if let Some(v) = buffer_before {
                config.prayer.buffer_before = *v;
            }
            if let Some(v) = buffer_after {
                config.prayer.buffer_after = *v;
            }
            config.persist();
            println_colored!(GREEN, "  ✓ Settings saved");
            Ok(())
        }
    }
}
