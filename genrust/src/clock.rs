use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time, UTC, with microsecond resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch; negative before 1970.
    pub secs: i64,
    pub micros: u32,
}

impl Timestamp {
    pub const UNIX_EPOCH: Timestamp = Timestamp { secs: 0, micros: 0 };

    pub fn from_unix(secs: i64) -> Self {
        Timestamp { secs, micros: 0 }
    }

    /// # Panics
    ///
    /// Panics if `micros` is not below one second.
    pub fn with_micros(self, micros: u32) -> Self {
        assert!(micros < 1_000_000);
        Self { micros, ..self }
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp {
                secs: d.as_secs() as i64,
                micros: d.subsec_micros(),
            },
            Err(e) => {
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut micros = d.subsec_micros();
                if micros != 0 {
                    secs -= 1;
                    micros = 1_000_000 - micros;
                }
                Timestamp { secs, micros }
            }
        }
    }

    /// Parses a `SOURCE_DATE_EPOCH` value (decimal seconds since the epoch).
    pub fn from_source_date_epoch(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(Self::from_unix)
    }

    /// Picks the generation time: an explicit value first, then a
    /// `SOURCE_DATE_EPOCH` value, then `clock`.
    pub fn select(
        explicit: Option<i64>,
        source_date_epoch: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<Self, TimestampError> {
        if let Some(secs) = explicit {
            return Ok(Self::from_unix(secs));
        }
        if let Some(value) = source_date_epoch {
            return Self::from_source_date_epoch(value)
                .ok_or_else(|| TimestampError::BadSourceDateEpoch(value.to_string()));
        }
        Ok(clock.now())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TimestampError {
    BadSourceDateEpoch(String),
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampError::BadSourceDateEpoch(value) => {
                write!(f, "invalid SOURCE_DATE_EPOCH {value:?}")
            }
        }
    }
}

impl std::error::Error for TimestampError {}

// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month as u32, day as u32)
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (year, month, day) = civil_from_days(self.secs.div_euclid(86400));
        let tod = self.secs.rem_euclid(86400);
        write!(
            f,
            "{year:04}-{month:02}-{day:02} {h:02}:{m:02}:{s:02}",
            h = tod / 3600,
            m = tod / 60 % 60,
            s = tod % 60
        )?;
        if self.micros != 0 {
            write!(f, ".{us:06}", us = self.micros)?;
        }
        Ok(())
    }
}

/// Source of the generation timestamp embedded in generated files.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }
}

/// A clock stuck at one instant, for reproducible output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
