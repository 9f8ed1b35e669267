//! One-shot alarms and the monotonic time base

/// Monotonic instant with millisecond ticks
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Duration with millisecond ticks
pub type Duration = fugit::MillisDurationU64;

/// One-shot alarm scheduling
///
/// Expiry is reported back to the scheduler's owner together with the handle
/// that was returned here, so a late expiry can be told apart from the alarm
/// that is currently armed.
pub trait TimerService {
    /// Identifies one scheduled alarm
    type Handle: Copy + Eq + core::fmt::Debug;

    /// Arm an alarm that expires once after `delay`
    fn schedule_once(&mut self, delay: Duration) -> Self::Handle;

    /// Disarm an alarm
    ///
    /// Cancelling an alarm that already fired or was already cancelled is a
    /// no-op.
    fn cancel(&mut self, handle: Self::Handle);
}
