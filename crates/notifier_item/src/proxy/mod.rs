//! Proxies for DBus services, so we can call them.
//!
//! The watcher proxy follows the interface XML from
//! [Waybar](https://github.com/Alexays/Waybar/tree/master/protocol), written in the shape that
//! [zbus-xmlgen](https://docs.rs/crate/zbus_xmlgen/latest) produces for
//! `dbus_status_notifier_watcher.xml`.
//!
//! For more information, see ["Writing a client proxy" in the zbus
//! tutorial](https://dbus2.github.io/zbus/).

mod dbus_status_notifier_watcher;
pub use dbus_status_notifier_watcher::*;
