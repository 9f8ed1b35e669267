//! Internal STM32 RTC as the clock sink
//!
//! The RTC lives in a global critical-section mutex so the defmt timestamp
//! can read it from any priority.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use clocksync_core::time::calendar_to_unix;
use clocksync_hal::{CalendarTime, ClockSink, Weekday};
use critical_section::Mutex;
use defmt::{info, Format};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc};

/// Set once the RTC has been written with server time
static TIME_SYNCED: AtomicBool = AtomicBool::new(false);

/// Global internal RTC instance
static RTC: Mutex<RefCell<Option<Rtc>>> = Mutex::new(RefCell::new(None));

/// RTC operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RtcError {
    /// RTC not initialized, or not yet synchronized when reading
    NotInitialized,
    /// The calendar time is outside what the RTC can hold
    InvalidDateTime,
    /// RTC hardware error
    HardwareError,
}

/// Install the RTC
///
/// Must be called once during system initialization before any time operations.
pub fn initialize_rtc(rtc: Rtc) {
    critical_section::with(|cs| {
        RTC.borrow(cs).replace(Some(rtc));
    });
    info!("Internal RTC installed");
}

/// Whether at least one synchronized time reached the RTC
pub fn is_time_synced() -> bool {
    TIME_SYNCED.load(Ordering::Acquire)
}

/// Read the RTC as Unix seconds
///
/// Fails with [`RtcError::NotInitialized`] until the first synchronization.
pub fn read_unix_secs() -> Result<u64, RtcError> {
    if !is_time_synced() {
        return Err(RtcError::NotInitialized);
    }

    critical_section::with(|cs| {
        let mut rtc = RTC.borrow(cs).borrow_mut();
        let rtc = rtc.as_mut().ok_or(RtcError::NotInitialized)?;
        let datetime = rtc.now().map_err(|_| RtcError::HardwareError)?;
        Ok(calendar_to_unix(&from_datetime(&datetime)))
    })
}

/// [`ClockSink`] writing into the global RTC
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcClock;

impl ClockSink for RtcClock {
    type Error = RtcError;

    fn set_calendar_time(&mut self, time: CalendarTime) -> Result<(), RtcError> {
        let datetime = to_datetime(&time)?;

        critical_section::with(|cs| {
            let mut rtc = RTC.borrow(cs).borrow_mut();
            let rtc = rtc.as_mut().ok_or(RtcError::NotInitialized)?;
            // Only flag the clock as synced once the write went through
            rtc.set_datetime(datetime)
                .map_err(|_| RtcError::HardwareError)?;
            TIME_SYNCED.store(true, Ordering::Release);
            Ok(())
        })?;

        info!("RTC set to {}", defmt::Display2Format(&time));
        Ok(())
    }
}

fn to_datetime(time: &CalendarTime) -> Result<DateTime, RtcError> {
    DateTime::from(
        time.year,
        time.month,
        time.day,
        to_day_of_week(time.weekday),
        time.hour,
        time.minute,
        time.second,
        0,
    )
    .map_err(|_| RtcError::InvalidDateTime)
}

fn from_datetime(datetime: &DateTime) -> CalendarTime {
    CalendarTime {
        year: datetime.year(),
        month: datetime.month(),
        day: datetime.day(),
        weekday: from_day_of_week(datetime.day_of_week()),
        hour: datetime.hour(),
        minute: datetime.minute(),
        second: datetime.second(),
    }
}

fn to_day_of_week(weekday: Weekday) -> DayOfWeek {
    match weekday {
        Weekday::Monday => DayOfWeek::Monday,
        Weekday::Tuesday => DayOfWeek::Tuesday,
        Weekday::Wednesday => DayOfWeek::Wednesday,
        Weekday::Thursday => DayOfWeek::Thursday,
        Weekday::Friday => DayOfWeek::Friday,
        Weekday::Saturday => DayOfWeek::Saturday,
        Weekday::Sunday => DayOfWeek::Sunday,
    }
}

fn from_day_of_week(day: DayOfWeek) -> Weekday {
    match day {
        DayOfWeek::Monday => Weekday::Monday,
        DayOfWeek::Tuesday => Weekday::Tuesday,
        DayOfWeek::Wednesday => Weekday::Wednesday,
        DayOfWeek::Thursday => Weekday::Thursday,
        DayOfWeek::Friday => Weekday::Friday,
        DayOfWeek::Saturday => Weekday::Saturday,
        DayOfWeek::Sunday => Weekday::Sunday,
    }
}
