pub mod settings;

pub use settings::{AppConfig, NetworkConfig, PrayerDurations};
