use crate::names;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use smart_default::SmartDefault;

/// Marker file present inside a Flatpak sandbox.
const SANDBOX_MARKER: &str = "/.flatpak-info";

/// Whether an item claims a well-known name of its own on the bus, or identifies itself to the
/// watcher by its connection's unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BusIdentityPolicy {
    /// Claim a name, unless running sandboxed, where the sandbox would refuse it anyway.
    #[default]
    Auto,
    /// Always use the connection's unique name.
    Never,
    /// Always claim a name.
    Always,
}

impl BusIdentityPolicy {
    /// Resolve the policy. `sandboxed` is only consulted for [`BusIdentityPolicy::Auto`].
    pub fn claims_name(self, sandboxed: impl FnOnce() -> bool) -> bool {
        match self {
            BusIdentityPolicy::Always => true,
            BusIdentityPolicy::Never => false,
            BusIdentityPolicy::Auto => !sandboxed(),
        }
    }
}

/// Settings for how an item goes onto the bus.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize)]
#[serde(default)]
pub struct ItemConfig {
    pub bus_identity_policy: BusIdentityPolicy,

    /// Prefix of the names claimed under [`BusIdentityPolicy::Always`] / [`BusIdentityPolicy::Auto`].
    #[default(names::DEFAULT_NAMESPACE.to_string())]
    pub name_namespace: String,

    /// Address of the bus to connect to. The session bus is used if this is not set.
    pub bus_address: Option<String>,
}

/// Whether this process runs inside a sandbox. Checked once, then cached.
pub fn is_sandboxed() -> bool {
    static SANDBOXED: OnceCell<bool> = OnceCell::new();
    *SANDBOXED.get_or_init(|| {
        let sandboxed = std::path::Path::new(SANDBOX_MARKER).exists();
        log::debug!("running sandboxed: {}", sandboxed);
        sandboxed
    })
}
