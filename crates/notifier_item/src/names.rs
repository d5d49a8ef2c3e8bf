//! Well-known names and paths of the StatusNotifierItem protocol.
//!
//! Note that we use `org.kde.*` rather than the `org.freedesktop.*` names mentioned in the
//! [specification], since the former are what every watcher and host actually listens on.
//!
//! [specification]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/

use std::sync::atomic::{AtomicU32, Ordering};

/// Bus name of the StatusNotifierWatcher.
pub const WATCHER_BUS: &str = "org.kde.StatusNotifierWatcher";
/// Object path of the StatusNotifierWatcher.
pub const WATCHER_OBJECT: &str = "/StatusNotifierWatcher";
/// Interface name of the StatusNotifierWatcher.
pub const WATCHER_INTERFACE: &str = "org.kde.StatusNotifierWatcher";

/// Object path that items are exported at.
pub const ITEM_OBJECT: &str = "/StatusNotifierItem";
/// Interface name of a StatusNotifierItem.
pub const ITEM_INTERFACE: &str = "org.kde.StatusNotifierItem";

/// Value of the `Menu` property when no menu is exported.
pub const NO_MENU_OBJECT: &str = "/NO_DBUSMENU";

/// Default namespace for the well-known names items claim.
pub const DEFAULT_NAMESPACE: &str = "org.kde";

static ITEM_NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a fresh well-known name for an item, of the form
/// `{namespace}.StatusNotifierItem-{pid}-{n}`.
///
/// `n` comes from a process-wide counter, so two calls never return the same name.
pub fn next_item_name(namespace: &str) -> String {
    let n = ITEM_NAME_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    item_name(namespace, std::process::id(), n)
}

fn item_name(namespace: &str, pid: u32, n: u32) -> String {
    format!("{}.StatusNotifierItem-{}-{}", namespace, pid, n)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_ne;

    #[test]
    fn test_item_name_format() {
        insta::assert_snapshot!(item_name(DEFAULT_NAMESPACE, 4077, 1), @"org.kde.StatusNotifierItem-4077-1");
    }

    #[test]
    fn test_next_item_name_is_unique() {
        let first = next_item_name(DEFAULT_NAMESPACE);
        let second = next_item_name(DEFAULT_NAMESPACE);
        assert_ne!(first, second);

        let prefix = format!("org.kde.StatusNotifierItem-{}-", std::process::id());
        assert!(first.starts_with(&prefix));
        assert!(second.starts_with(&prefix));
    }
}
