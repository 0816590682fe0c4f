//! Session clock pinned to the configured timezone.
//!
//! The timezone is resolved once, when the store is built. Timestamps are
//! persisted as microseconds since the Unix epoch and rendered back in the
//! same zone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    tz: Tz,
}

impl SessionClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Resolve an IANA timezone name such as `Europe/Moscow`.
    pub fn from_name(name: &str) -> StoreResult<Self> {
        let tz = name.parse::<Tz>().map_err(|e| {
            StoreError::Configuration(format!("DB_TIME_LOCATION {name:?}: {e}"))
        })?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current time in the session timezone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Render a stored microsecond timestamp in the session timezone.
    pub fn at_micros(&self, micros: i64) -> Option<DateTime<Tz>> {
        DateTime::from_timestamp_micros(micros).map(|utc| utc.with_timezone(&self.tz))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Offset, TimeZone};

    use super::*;

    #[test]
    fn resolves_known_zone() {
        let clock = SessionClock::from_name("Europe/Moscow").unwrap();
        assert_eq!(clock.timezone(), chrono_tz::Europe::Moscow);
        assert_eq!(clock.now().timezone(), chrono_tz::Europe::Moscow);
    }

    #[test]
    fn rejects_unknown_zone() {
        let err = SessionClock::from_name("Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, StoreError::Configuration(msg) if msg.contains("Mars/Olympus_Mons")));
    }

    #[test]
    fn micros_round_trip_keeps_instant_and_zone() {
        let clock = SessionClock::new(chrono_tz::Asia::Tokyo);
        let instant = chrono_tz::Asia::Tokyo
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .unwrap();

        let restored = clock.at_micros(instant.timestamp_micros()).unwrap();
        assert_eq!(restored, instant);
        assert_eq!(restored.offset().fix().local_minus_utc(), 9 * 3600);
    }
}
