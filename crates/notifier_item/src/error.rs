use thiserror::Error;

/// Reasons registering a [`StatusNotifierItem`][crate::StatusNotifierItem] can fail.
///
/// [`NoWatcher`][Error::NoWatcher] and [`NoHost`][Error::NoHost] are non-fatal: the item stays
/// [`Registering`][crate::RegistrationState::Registering] and completes registration on its own
/// once the missing peer shows up. Every other variant is fatal and leaves the item
/// [`Failed`][crate::RegistrationState::Failed] until [`register`][crate::StatusNotifierItem::register]
/// is called again.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to establish DBus connection")]
    NoConnection(#[source] zbus::Error),
    #[error("No Watcher found")]
    NoWatcher,
    #[error("No Host registered on the Watcher")]
    NoHost,
    #[error("Failed to acquire name {0} for item")]
    NoName(String),
    #[error("Failed to talk to the Watcher")]
    Watcher(#[source] zbus::Error),
    #[error("Failed to export item object: {0}")]
    Export(String),
    #[error("Watcher refused to register the item")]
    Rejected(#[source] zbus::Error),
}

impl Error {
    /// Whether this failure ended the registration attempt.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NoWatcher | Error::NoHost)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(!Error::NoWatcher.is_fatal());
        assert!(!Error::NoHost.is_fatal());
        assert!(Error::NoName("org.kde.StatusNotifierItem-1-1".to_string()).is_fatal());
        assert!(Error::Export("object already exists".to_string()).is_fatal());
        assert!(Error::NoConnection(zbus::Error::Failure("gone".to_string())).is_fatal());
    }
}
