use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::PrayerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
    Ur,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
            Language::Ur => "ur",
        }
    }

    pub fn prayer_name(&self, kind: PrayerKind) -> &'static str {
        match self {
            Language::En => kind.display_name(),
            Language::Ar => match kind {
                PrayerKind::Fajr => "الفجر",
                PrayerKind::Dhuhr => "الظهر",
                PrayerKind::Jumuah => "الجمعة",
                PrayerKind::Asr => "العصر",
                PrayerKind::Maghrib => "المغرب",
                PrayerKind::Isha => "العشاء",
            },
            Language::Ur => match kind {
                PrayerKind::Fajr => "فجر",
                PrayerKind::Dhuhr => "ظہر",
                PrayerKind::Jumuah => "جمعہ",
                PrayerKind::Asr => "عصر",
                PrayerKind::Maghrib => "مغرب",
                PrayerKind::Isha => "عشاء",
            },
        }
    }

    pub fn offline_notice(&self) -> &'static str {
        match self {
            Language::En => "Offline — showing cached times",
            Language::Ar => "غير متصل — عرض الأوقات المحفوظة",
            Language::Ur => "آف لائن — محفوظ اوقات دکھائے جا رہے ہیں",
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "ar" | "arabic" => Ok(Language::Ar),
            "ur" | "urdu" => Ok(Language::Ur),
            _ => Err(anyhow::anyhow!("Unknown language: {}", s)),
        }
    }
}
