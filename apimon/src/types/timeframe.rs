//! 集計ウィンドウ
//!
//! `"30m"`, `"24h"`, `"7d"` のような期間文字列。`now - timeframe` より古い行は集計対象外。

use crate::common::error::MonitorError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 期間の単位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// 秒
    Seconds,
    /// 分
    Minutes,
    /// 時間
    Hours,
    /// 日
    Days,
    /// 週
    Weeks,
}

impl TimeUnit {
    fn suffix(&self) -> char {
        match self {
            Self::Seconds => 's',
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
            Self::Weeks => 'w',
        }
    }

    fn seconds(&self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
            Self::Weeks => 604_800,
        }
    }
}

/// 集計ウィンドウ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeframe {
    amount: u32,
    unit: TimeUnit,
}

/// 上限（1年）
const MAX_TIMEFRAME_SECS: i64 = 366 * 86_400;

impl Timeframe {
    /// 時間単位で作成
    pub fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Hours,
        }
    }

    /// 日単位で作成
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Days,
        }
    }

    /// 期間の長さ
    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.amount) * self.unit.seconds())
    }

    /// `now` を基準にしたウィンドウの開始時刻
    pub fn cutoff_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    /// 現在時刻を基準にしたウィンドウの開始時刻
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff_from(Utc::now())
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::hours(24)
    }
}

impl FromStr for Timeframe {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || MonitorError::InvalidTimeframe(s.to_string());

        let last = trimmed.chars().last().ok_or_else(invalid)?;
        let unit = match last.to_ascii_lowercase() {
            's' => TimeUnit::Seconds,
            'm' => TimeUnit::Minutes,
            'h' => TimeUnit::Hours,
            'd' => TimeUnit::Days,
            'w' => TimeUnit::Weeks,
            _ => return Err(invalid()),
        };
        let number = &trimmed[..trimmed.len() - last.len_utf8()];
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u32 = number.parse().map_err(|_| invalid())?;
        if amount == 0 || i64::from(amount) * unit.seconds() > MAX_TIMEFRAME_SECS {
            return Err(invalid());
        }

        Ok(Self { amount, unit })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
