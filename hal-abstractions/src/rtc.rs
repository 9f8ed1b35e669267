//! Real-time clock sink and broken-down calendar time

/// Day of the week, numbered from Sunday = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    /// Day 0
    Sunday = 0,
    /// Day 1
    Monday = 1,
    /// Day 2
    Tuesday = 2,
    /// Day 3
    Wednesday = 3,
    /// Day 4
    Thursday = 4,
    /// Day 5
    Friday = 5,
    /// Day 6
    Saturday = 6,
}

impl Weekday {
    /// Map a day number (any value, taken modulo 7) to a weekday
    pub const fn from_days_since_sunday(n: u32) -> Self {
        match n % 7 {
            0 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            _ => Self::Saturday,
        }
    }

    /// ISO 8601 day number (Monday = 1 ... Sunday = 7)
    pub const fn iso_number(self) -> u8 {
        match self {
            Self::Sunday => 7,
            other => other as u8,
        }
    }
}

/// Broken-down UTC calendar time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    /// Full year, e.g. 2024
    pub year: u16,
    /// Month of the year (1-12)
    pub month: u8,
    /// Day of the month (1-31)
    pub day: u8,
    /// Day of the week
    pub weekday: Weekday,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
}

impl core::fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Authoritative wall-clock store (typically a hardware RTC)
pub trait ClockSink {
    /// Clock write error type
    type Error: core::fmt::Debug;

    /// Commit `time` as the current wall-clock time
    fn set_calendar_time(&mut self, time: CalendarTime) -> Result<(), Self::Error>;
}
