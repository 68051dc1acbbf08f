use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "waqt", version, author, about = "Prayer times and a task planner that schedules around them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show prayer times for a day (today by default)
    Times {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Download prayer times for the coming days
    Prefetch {
        /// Number of days, starting today
        #[arg(long)]
        days: Option<u32>,
    },
    /// Show or update the current location
    Location {
        #[command(subcommand)]
        action: LocationCommands,
    },
    /// List or choose the calculation method
    Method {
        #[command(subcommand)]
        action: MethodCommands,
    },
    /// Task planning
    Task {
        #[command(subcommand)]
        action: TaskCommands,
    },
    /// Cached prayer data
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum LocationCommands {
    /// Show the stored location
    Show,
    /// Set the location; refetches prayer times when it moved more than 50 km
    Set {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
        /// Display name, e.g. "Islamabad"
        #[arg(long)]
        name: Option<String>,
        /// ISO country code, used to pick a default method
        #[arg(long)]
        country: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MethodCommands {
    /// List all calculation methods
    List,
    /// Use a method by name or API code
    Set {
        method: String,
    },
    /// Follow the location's country default
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task
    Add {
        title: String,
        /// Minutes
        #[arg(long, default_value = "30")]
        duration: u32,
        /// work, personal, worship, study, health, errand
        #[arg(long, default_value = "personal")]
        category: String,
        /// Start as "YYYY-MM-DD HH:MM" or "HH:MM" for today
        #[arg(long)]
        at: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Move the start to the first slot clear of prayer times
        #[arg(long)]
        avoid_prayers: bool,
        /// daily, weekly or monthly
        #[arg(long)]
        repeat: Option<String>,
        /// Repeat every N days/weeks/months
        #[arg(long, default_value = "1")]
        every: u32,
        /// Weekdays for weekly repeats, e.g. mon,thu
        #[arg(long, value_delimiter = ',')]
        on: Vec<String>,
        /// Last date of the series
        #[arg(long, conflicts_with = "count")]
        until: Option<String>,
        /// Total occurrences in the series
        #[arg(long)]
        count: Option<u32>,
    },
    /// List tasks for a day (today by default)
    List {
        #[arg(long)]
        date: Option<String>,
    },
    /// Toggle a task's completion
    Done {
        id: i64,
    },
    /// Delete a task, or a whole recurring series
    Delete {
        id: i64,
        /// Delete the series this task belongs to
        #[arg(long)]
        series: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove all cached prayer times
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        pro: Option<bool>,
        #[arg(long)]
        nawafil: Option<bool>,
        /// system, light or dark
        #[arg(long)]
        theme: Option<String>,
        /// en, ar or ur
        #[arg(long)]
        language: Option<String>,
        /// Minutes blocked before each adhan
        #[arg(long)]
        buffer_before: Option<u32>,
        /// Minutes blocked after each prayer
        #[arg(long)]
        buffer_after: Option<u32>,
    },
}
