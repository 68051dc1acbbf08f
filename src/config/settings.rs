use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::PrayerKind;
use crate::prayer_times::methods::CalculationMethod;
use crate::utils::geo::Coordinates;
use crate::utils::locale::Language;

fn default_buffer_before() -> u32 {
    5
}
fn default_buffer_after() -> u32 {
    10
}
fn default_prefetch_days() -> u32 {
    7
}
fn default_base_url() -> String {
    "https://api.aladhan.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Last known position. `None` until the user sets one.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    /// ISO 3166-1 alpha-2, used to pick a default calculation method.
    #[serde(default)]
    pub country: Option<String>,
}

impl LocationConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.name, self.coordinates()) {
            (Some(name), _) => name.clone(),
            (None, Some(c)) => format!("{:.4}°, {:.4}°", c.latitude, c.longitude),
            (None, None) => "unknown location".to_string(),
        }
    }
}

// ─── Prayer ──────────────────────────────────────────────────────────────────

/// How long each prayer blocks the planner, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerDurations {
    #[serde(default = "PrayerDurations::fajr")]
    pub fajr: u32,
    #[serde(default = "PrayerDurations::dhuhr")]
    pub dhuhr: u32,
    #[serde(default = "PrayerDurations::jumuah")]
    pub jumuah: u32,
    #[serde(default = "PrayerDurations::asr")]
    pub asr: u32,
    #[serde(default = "PrayerDurations::maghrib")]
    pub maghrib: u32,
    #[serde(default = "PrayerDurations::isha")]
    pub isha: u32,
}

impl PrayerDurations {
    fn fajr() -> u32 {
        20
    }
    fn dhuhr() -> u32 {
        20
    }
    fn jumuah() -> u32 {
        60
    }
    fn asr() -> u32 {
        20
    }
    fn maghrib() -> u32 {
        15
    }
    fn isha() -> u32 {
        25
    }

    pub fn for_kind(&self, kind: PrayerKind) -> u32 {
        match kind {
            PrayerKind::Fajr => self.fajr,
            PrayerKind::Dhuhr => self.dhuhr,
            PrayerKind::Jumuah => self.jumuah,
            PrayerKind::Asr => self.asr,
            PrayerKind::Maghrib => self.maghrib,
            PrayerKind::Isha => self.isha,
        }
    }
}

impl Default for PrayerDurations {
    fn default() -> Self {
        Self {
            fajr: Self::fajr(),
            dhuhr: Self::dhuhr(),
            jumuah: Self::jumuah(),
            asr: Self::asr(),
            maghrib: Self::maghrib(),
            isha: Self::isha(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerConfig {
    /// Explicit choice. When absent the method follows the location's country.
    #[serde(default)]
    pub method: Option<CalculationMethod>,
    #[serde(default = "default_buffer_before")]
    pub buffer_before: u32,
    #[serde(default = "default_buffer_after")]
    pub buffer_after: u32,
    #[serde(default = "default_prefetch_days")]
    pub prefetch_days: u32,
    #[serde(default)]
    pub durations: PrayerDurations,
}

impl Default for PrayerConfig {
    fn default() -> Self {
        Self {
            method: None,
            buffer_before: default_buffer_before(),
            buffer_after: default_buffer_after(),
            prefetch_days: default_prefetch_days(),
            durations: PrayerDurations::default(),
        }
    }
}

// ─── Network ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive prefetch requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

// ─── Feature flags ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NawafilPrefs {
    #[serde(default = "default_true")]
    pub tahajjud: bool,
    #[serde(default = "default_true")]
    pub duha: bool,
    #[serde(default)]
    pub ishraq: bool,
    #[serde(default)]
    pub awwabin: bool,
}

impl Default for NawafilPrefs {
    fn default() -> Self {
        Self {
            tahajjud: true,
            duha: true,
            ishraq: false,
            awwabin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub pro: bool,
    #[serde(default)]
    pub nawafil: bool,
    #[serde(default)]
    pub nawafil_prefs: NawafilPrefs,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            pro: false,
            nawafil: false,
            nawafil_prefs: NawafilPrefs::default(),
        }
    }
}

impl FeatureConfig {
    /// Nawafil are a Pro feature; the flag alone is not enough.
    pub fn nawafil_active(&self) -> bool {
        self.pro && self.nawafil
    }
}

// ─── Appearance ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("Unknown theme: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppearanceConfig {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub language: Language,
}

// ─── AppConfig ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub prayer: PrayerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub appearance: AppearanceConfig,
}

impl AppConfig {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "waqt").context("Could not determine project directories")
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("waqt.db"))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("cache"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let config: AppConfig = toml::from_str(&content).context("Parsing config.toml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Serializing config")?;
        std::fs::write(path, content).with_context(|| format!("Writing {:?}", path))?;
        Ok(())
    }

    /// Persist after a mutation. A failed write is logged and the in-memory
    /// settings stay authoritative for the rest of the run.
    pub fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("failed to save settings: {:#}", e);
        }
    }

    pub fn ensure_data_dir() -> Result<PathBuf> {
        let dir = Self::data_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Explicit method, else the country default, else Muslim World League.
    pub fn effective_method(&self) -> CalculationMethod {
        self.prayer.method.unwrap_or_else(|| {
            self.location
                .country
                .as_deref()
                .map(CalculationMethod::for_country)
                .unwrap_or_default()
        })
    }

    /// Record a new position. Returns the previous one, if any.
    pub fn update_location(
        &mut self,
        coords: Coordinates,
        name: Option<String>,
        country: Option<String>,
    ) -> Option<Coordinates> {
        let previous = self.location.coordinates();
        self.location.latitude = Some(coords.latitude);
        self.location.longitude = Some(coords.longitude);
        if name.is_some() {
            self.location.name = name;
        }
        if country.is_some() {
            self.location.country = country.map(|c| c.to_uppercase());
        }
        previous
    }
}
