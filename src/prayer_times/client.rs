//! HTTP access to the remote prayer-times API.
//!
//! The orchestrator only sees the [`PrayerTimesSource`] trait so tests can
//! swap in an in-process source.

use chrono::{NaiveDate, NaiveTime};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

use super::error::{PrayerTimeError, Result};
use super::methods::CalculationMethod;
use crate::config::NetworkConfig;
use crate::models::PrayerKind;
use crate::utils::geo::Coordinates;

/// Something that can produce the raw API body for one day.
pub trait PrayerTimesSource {
    fn fetch_day(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<String>;
}

impl<T: PrayerTimesSource + ?Sized> PrayerTimesSource for &T {
    fn fetch_day(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<String> {
        (**self).fetch_day(date, coords, method)
    }
}

pub struct HttpClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("waqt/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PrayerTimesSource for HttpClient {
    fn fetch_day(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<String> {
        let url = format!("{}/timings/{}", self.base_url, date.format("%d-%m-%Y"));
        debug!("GET {} ({:.4}, {:.4}) method={}", url, coords.latitude, coords.longitude, method);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", coords.latitude.to_string()),
                ("longitude", coords.longitude.to_string()),
                ("method", method.api_code().to_string()),
            ])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(PrayerTimeError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

// ─── Response decoding ──────────────────────────────────────────────────────

/// The parts of one day's response the app keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct DayTimings {
    pub fajr: NaiveTime,
    pub dhuhr: NaiveTime,
    pub asr: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
    pub hijri: Option<String>,
}

impl DayTimings {
    /// Adhan time for a kind. Jumuah shares Dhuhr's time.
    pub fn time_of(&self, kind: PrayerKind) -> NaiveTime {
        match kind {
            PrayerKind::Fajr => self.fajr,
            PrayerKind::Dhuhr | PrayerKind::Jumuah => self.dhuhr,
            PrayerKind::Asr => self.asr,
            PrayerKind::Maghrib => self.maghrib,
            PrayerKind::Isha => self.isha,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: DayData,
}

#[derive(Debug, Deserialize)]
struct DayData {
    timings: Timings,
    #[serde(default)]
    date: Option<DateInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Timings {
    fajr: Option<String>,
    dhuhr: Option<String>,
    asr: Option<String>,
    maghrib: Option<String>,
    isha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateInfo {
    #[serde(default)]
    hijri: Option<HijriInfo>,
}

#[derive(Debug, Deserialize)]
struct HijriInfo {
    day: String,
    month: HijriMonth,
    year: String,
}

#[derive(Debug, Deserialize)]
struct HijriMonth {
    en: String,
}

/// Decode a raw API body (fresh or from the file cache).
pub fn decode_day(body: &[u8]) -> Result<DayTimings> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let t = envelope.data.timings;

    let hijri = envelope
        .data
        .date
        .and_then(|d| d.hijri)
        .map(|h| format!("{} {} {}", h.day.trim_start_matches('0'), h.month.en, h.year));

    Ok(DayTimings {
        fajr: parse_clock("Fajr", t.fajr)?,
        dhuhr: parse_clock("Dhuhr", t.dhuhr)?,
        asr: parse_clock("Asr", t.asr)?,
        maghrib: parse_clock("Maghrib", t.maghrib)?,
        isha: parse_clock("Isha", t.isha)?,
        hijri,
    })
}

/// Times come as "HH:MM", sometimes followed by a zone tag like " (+05)".
fn parse_clock(name: &str, value: Option<String>) -> Result<NaiveTime> {
    let value = value.ok_or_else(|| PrayerTimeError::Decode(format!("missing {} time", name)))?;
    let clock = value.split_whitespace().next().unwrap_or_default();
    NaiveTime::parse_from_str(clock, "%H:%M")
        .map_err(|e| PrayerTimeError::Decode(format!("bad {} time '{}': {}", name, value, e)))
}
