//! The registration handshake, as a state machine.
//!
//! Registering an item takes a series of asynchronous steps against peers we don't control:
//! connect to the bus, wait for the StatusNotifierWatcher to exist, wait for at least one
//! StatusNotifierHost to be registered on it, optionally claim a well-known name, export the item
//! object, and finally call `RegisterStatusNotifierItem` on the watcher.
//!
//! [`Machine`] only decides what happens next. It is fed [`Input`]s (the outcome of the previous
//! step, or something a peer did) and answers with the [`Effect`]s to carry out; performing those
//! against the bus is the job of the driver. Keeping the two apart means every transition,
//! including resuming after a non-fatal failure and tearing down mid-handshake, can be exercised
//! without a bus.

use crate::*;

/// How far along an item is in getting onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum RegistrationState {
    /// [`register`][crate::StatusNotifierItem::register] hasn't been called yet.
    #[default]
    NotRegistered,
    /// The handshake is in progress, possibly waiting for a watcher or host to show up.
    Registering,
    /// The watcher knows about the item.
    Registered,
    /// The handshake failed fatally. Calling `register` again starts over.
    Failed,
}

/// The name an item registers with the watcher under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusIdentity {
    /// A well-known name claimed for the item.
    Name(String),
    /// The unique name of the item's connection.
    Connection,
}

/// Something that happened, fed into [`Machine::handle`].
#[derive(Debug)]
pub enum Input {
    Register,
    Connected,
    ConnectFailed(zbus::Error),
    WatcherAppeared,
    WatcherVanished,
    WatchFailed(zbus::Error),
    /// The watcher proxy is ready and `IsStatusNotifierHostRegistered` was read (unreadable counts
    /// as `false`).
    WatcherReady {
        host_registered: bool,
    },
    WatcherFailed(zbus::Error),
    HostRegistered,
    NameAcquired,
    NameRefused,
    NameLost,
    ObjectExported,
    ExportFailed(String),
    Announced,
    AnnounceFailed(zbus::Error),
    Release,
}

/// Something to do, returned by [`Machine::handle`]. Effects must be performed in order.
#[derive(Debug)]
pub enum Effect {
    /// Open the item's bus connection; answer with [`Input::Connected`] or [`Input::ConnectFailed`].
    Connect,
    /// Watch the watcher's name; answer with [`Input::WatcherAppeared`] / [`Input::WatcherVanished`]
    /// on every change until stopped.
    WatchWatcher,
    StopWatchingWatcher,
    /// Build the watcher proxy; answer with [`Input::WatcherReady`] or [`Input::WatcherFailed`].
    ConnectWatcher,
    /// Wait for `StatusNotifierHostRegistered`; answer with [`Input::HostRegistered`].
    AwaitHost,
    StopAwaitingHost,
    /// Abort the one-shot step currently in flight, if any.
    CancelPending,
    /// Request a well-known name; answer with [`Input::NameAcquired`] or [`Input::NameRefused`],
    /// then [`Input::NameLost`] if it is taken away later.
    ClaimName(String),
    ReleaseName(String),
    DropWatcher,
    /// Export the item object; answer with [`Input::ObjectExported`] or [`Input::ExportFailed`].
    ExportObject,
    UnexportObject,
    /// Call `RegisterStatusNotifierItem`; answer with [`Input::Announced`] or [`Input::AnnounceFailed`].
    Announce(BusIdentity),
    Disconnect,
    SetState(RegistrationState),
    /// Tell the owner that something went wrong.
    Report(Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    AwaitingWatcher,
    ConnectingWatcher,
    AwaitingHost,
    ClaimingName(String),
    Exporting(BusIdentity),
    Announcing(BusIdentity),
    Registered,
    Released,
}

impl Phase {
    /// Phases waiting on a one-shot step that [`Effect::CancelPending`] aborts.
    fn has_pending_step(&self) -> bool {
        matches!(self, Phase::Connecting | Phase::ConnectingWatcher | Phase::Announcing(_))
    }
}

/// Resources acquired so far, each released exactly once by [`Machine::teardown`].
#[derive(Debug, Default)]
struct Held {
    connection: bool,
    watch: bool,
    watcher: bool,
    host_wait: bool,
    name: Option<String>,
    object: bool,
}

/// The registration state machine of a single item.
#[derive(Debug)]
pub struct Machine {
    policy: BusIdentityPolicy,
    namespace: String,
    sandboxed: fn() -> bool,
    state: RegistrationState,
    phase: Phase,
    held: Held,
    attempt: u64,
}

impl Machine {
    pub fn new(policy: BusIdentityPolicy, namespace: impl Into<String>) -> Self {
        Self {
            policy,
            namespace: namespace.into(),
            sandboxed: is_sandboxed,
            state: RegistrationState::NotRegistered,
            phase: Phase::Idle,
            held: Held::default(),
            attempt: 0,
        }
    }

    /// Replace the sandbox check used by [`BusIdentityPolicy::Auto`].
    pub fn with_sandbox_check(mut self, sandboxed: fn() -> bool) -> Self {
        self.sandboxed = sandboxed;
        self
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Counter of registration attempts. Completions of steps started during an earlier attempt
    /// must be dropped instead of fed to [`handle`][Self::handle].
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_released(&self) -> bool {
        self.phase == Phase::Released
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        use Input::*;

        if self.phase == Phase::Released {
            log::debug!("ignoring {:?} on released item", input);
            return Vec::new();
        }

        match (input, self.phase.clone()) {
            (Register, _) => self.register(),
            (Release, _) => self.release(),

            (Connected, Phase::Connecting) => {
                self.phase = Phase::AwaitingWatcher;
                self.held.watch = true;
                vec![Effect::WatchWatcher]
            }
            (ConnectFailed(e), Phase::Connecting) => self.fail(Error::NoConnection(e)),

            // the watch stays armed, so we pick up where we left off once a watcher shows up
            (WatcherVanished, Phase::AwaitingWatcher) => vec![Effect::Report(Error::NoWatcher)],
            (WatcherAppeared, Phase::AwaitingWatcher) => {
                self.held.watch = false;
                self.phase = Phase::ConnectingWatcher;
                vec![Effect::StopWatchingWatcher, Effect::ConnectWatcher]
            }
            (WatchFailed(e), Phase::AwaitingWatcher) => self.fail(Error::NoConnection(e)),

            (WatcherReady { host_registered }, Phase::ConnectingWatcher) => {
                self.held.watcher = true;
                if host_registered {
                    self.resolve_identity()
                } else {
                    self.phase = Phase::AwaitingHost;
                    self.held.host_wait = true;
                    vec![Effect::Report(Error::NoHost), Effect::AwaitHost]
                }
            }
            (WatcherFailed(e), Phase::ConnectingWatcher | Phase::AwaitingHost) => self.fail(Error::Watcher(e)),
            (HostRegistered, Phase::AwaitingHost) => {
                self.held.host_wait = false;
                let mut effects = vec![Effect::StopAwaitingHost];
                effects.extend(self.resolve_identity());
                effects
            }

            (NameAcquired, Phase::ClaimingName(name)) => {
                self.phase = Phase::Exporting(BusIdentity::Name(name));
                vec![Effect::ExportObject]
            }
            (NameRefused, Phase::ClaimingName(name)) => self.fail(Error::NoName(name)),
            (NameLost, phase) if phase != Phase::Idle && self.held.name.is_some() => {
                let name = self.held.name.clone().unwrap_or_default();
                self.fail(Error::NoName(name))
            }

            (ObjectExported, Phase::Exporting(identity)) => {
                self.held.object = true;
                self.phase = Phase::Announcing(identity.clone());
                vec![Effect::Announce(identity)]
            }
            (ExportFailed(reason), Phase::Exporting(_)) => self.fail(Error::Export(reason)),

            (Announced, Phase::Announcing(_)) => {
                self.phase = Phase::Registered;
                self.held.watcher = false;
                self.state = RegistrationState::Registered;
                vec![Effect::DropWatcher, Effect::SetState(RegistrationState::Registered)]
            }
            (AnnounceFailed(e), Phase::Announcing(_)) => self.fail(Error::Rejected(e)),

            (input, phase) => {
                log::debug!("ignoring {:?} in phase {:?}", input, phase);
                Vec::new()
            }
        }
    }

    fn register(&mut self) -> Vec<Effect> {
        match self.state {
            RegistrationState::Registering | RegistrationState::Registered => Vec::new(),
            RegistrationState::NotRegistered | RegistrationState::Failed => {
                self.attempt += 1;
                self.state = RegistrationState::Registering;
                self.phase = Phase::Connecting;
                self.held.connection = true;
                vec![Effect::SetState(RegistrationState::Registering), Effect::Connect]
            }
        }
    }

    fn resolve_identity(&mut self) -> Vec<Effect> {
        if self.policy.claims_name(self.sandboxed) {
            let name = names::next_item_name(&self.namespace);
            self.held.name = Some(name.clone());
            self.phase = Phase::ClaimingName(name.clone());
            vec![Effect::ClaimName(name)]
        } else {
            self.phase = Phase::Exporting(BusIdentity::Connection);
            vec![Effect::ExportObject]
        }
    }

    fn fail(&mut self, error: Error) -> Vec<Effect> {
        let mut effects = self.teardown();
        self.phase = Phase::Idle;
        self.state = RegistrationState::Failed;
        effects.push(Effect::SetState(RegistrationState::Failed));
        effects.push(Effect::Report(error));
        effects
    }

    fn release(&mut self) -> Vec<Effect> {
        let mut effects = self.teardown();
        self.phase = Phase::Released;
        if self.state != RegistrationState::NotRegistered {
            self.state = RegistrationState::NotRegistered;
            effects.push(Effect::SetState(RegistrationState::NotRegistered));
        }
        effects
    }

    /// Release everything held, in reverse order of acquisition.
    fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase.has_pending_step() {
            effects.push(Effect::CancelPending);
        }
        if std::mem::take(&mut self.held.watch) {
            effects.push(Effect::StopWatchingWatcher);
        }
        if std::mem::take(&mut self.held.host_wait) {
            effects.push(Effect::StopAwaitingHost);
        }
        if let Some(name) = self.held.name.take() {
            effects.push(Effect::ReleaseName(name));
        }
        if std::mem::take(&mut self.held.watcher) {
            effects.push(Effect::DropWatcher);
        }
        if std::mem::take(&mut self.held.object) {
            effects.push(Effect::UnexportObject);
        }
        if std::mem::take(&mut self.held.connection) {
            effects.push(Effect::Disconnect);
        }
        effects
    }
}
