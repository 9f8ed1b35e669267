//! Network side of the time synchronization
//!
//! - **`config`**: MAC address and stack seed
//! - **`manager`**: DHCP bring-up
//! - **`platform`**: the session's collaborators on embassy-net and the RTIC monotonic
//! - **`driver`**: event loop feeding DNS answers, datagrams, watchdog expiries
//!   and the hourly tick into the session
//!
//! The embassy-net `Stack` is !Send, so the whole loop runs inside the
//! network task.

pub mod config;
pub mod driver;
pub mod manager;
pub mod platform;

pub use config::NetworkConfig;
