use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::prayer_times::methods::CalculationMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerKind {
    Fajr,
    Dhuhr,
    /// Friday congregational prayer, replaces Dhuhr on Fridays.
    Jumuah,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerKind {
    /// The five daily prayers in order. Jumuah is derived from Dhuhr.
    pub fn daily() -> [PrayerKind; 5] {
        [
            PrayerKind::Fajr,
            PrayerKind::Dhuhr,
            PrayerKind::Asr,
            PrayerKind::Maghrib,
            PrayerKind::Isha,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerKind::Fajr => "fajr",
            PrayerKind::Dhuhr => "dhuhr",
            PrayerKind::Jumuah => "jumuah",
            PrayerKind::Asr => "asr",
            PrayerKind::Maghrib => "maghrib",
            PrayerKind::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerKind::Fajr => "Fajr",
            PrayerKind::Dhuhr => "Dhuhr",
            PrayerKind::Jumuah => "Jumu'ah",
            PrayerKind::Asr => "Asr",
            PrayerKind::Maghrib => "Maghrib",
            PrayerKind::Isha => "Isha",
        }
    }
}

impl std::fmt::Display for PrayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerKind::Fajr),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerKind::Dhuhr),
            "jumuah" | "jummah" | "jumu'ah" => Ok(PrayerKind::Jumuah),
            "asr" => Ok(PrayerKind::Asr),
            "maghrib" => Ok(PrayerKind::Maghrib),
            "isha" => Ok(PrayerKind::Isha),
            _ => Err(anyhow::anyhow!("Unknown prayer kind: {}", s)),
        }
    }
}

/// One prayer occurrence for a date and (rounded) location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTime {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub kind: PrayerKind,
    pub adhan: NaiveDateTime,
    pub duration_minutes: u32,
    pub buffer_before: u32,
    pub buffer_after: u32,
    pub method: CalculationMethod,
    pub latitude: f64,
    pub longitude: f64,
    pub hijri: Option<String>,
}

impl PrayerTime {
    /// Time blocked by this prayer, buffers included.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.adhan - Duration::minutes(self.buffer_before as i64);
        let end = self.adhan
            + Duration::minutes(self.duration_minutes as i64 + self.buffer_after as i64);
        (start, end)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.adhan + Duration::minutes(self.duration_minutes as i64)
    }
}
