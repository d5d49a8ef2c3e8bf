//! The application side of the [StatusNotifierItem] tray protocol.
//!
//! A [`StatusNotifierItem`] exposes an icon, status and tooltip to whatever tray (StatusNotifierHost)
//! runs on the session bus, and reports back what the user does with it.
//!
//! [StatusNotifierItem]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/

pub mod names;
pub mod proxy;
pub mod registration;

mod config;
pub use config::*;

mod driver;

mod error;
pub use error::*;

mod icon;
pub use icon::*;

mod interface;
pub use interface::*;

mod item;
pub use item::*;

mod state;
pub use state::*;

pub use registration::RegistrationState;
