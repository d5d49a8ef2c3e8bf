use crate::*;

use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;
use tokio::sync::{broadcast, mpsc, watch};
use zbus::zvariant::OwnedObjectPath;

use crate::{
    driver::{Command, Context},
    interface::EventSink,
};

/// Receiving half of an item's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// A StatusNotifierItem (SNI): an entry in the system tray, exposed over DBus for the
/// StatusNotifierHost (tray) to display.
///
/// Configure the item through its setters, then call [`register`][Self::register] to put it on the
/// bus. Setters keep working afterwards; hosts are told about changes through the interface's
/// `New*` signals. What the user does with the item arrives as [`Event`]s on the receiver that was
/// handed out together with the item.
///
/// Dropping the item [`release`][Self::release]s it.
pub struct StatusNotifierItem {
    state: Arc<Mutex<ItemState>>,
    config: ItemConfig,
    connection: Option<zbus::Connection>,
    registration: Arc<watch::Sender<RegistrationState>>,
    changes: broadcast::Sender<Property>,
    events: mpsc::UnboundedSender<Event>,
    session: Mutex<Option<Session>>,
}

/// The actor and event sink of one `register` ... `release` span.
struct Session {
    commands: mpsc::UnboundedSender<Command>,
    events: EventSink,
}

impl Session {
    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            log::debug!("item actor is gone, dropping {:?}", e.0);
        }
    }
}

impl StatusNotifierItem {
    pub fn new(id: impl Into<String>, category: Category) -> (Self, EventReceiver) {
        Self::builder(id, category).build()
    }

    /// Create an item whose main icon is the freedesktop icon `icon_name`.
    pub fn from_icon_name(id: impl Into<String>, category: Category, icon_name: &str) -> (Self, EventReceiver) {
        Self::builder(id, category).icon(IconSlot::Main, icon_name).build()
    }

    /// Create an item whose main icon is `bitmap`.
    pub fn from_bitmap(id: impl Into<String>, category: Category, bitmap: RgbaImage) -> (Self, EventReceiver) {
        Self::builder(id, category).icon(IconSlot::Main, bitmap).build()
    }

    pub fn builder(id: impl Into<String>, category: Category) -> ItemBuilder {
        ItemBuilder { state: ItemState::new(id, category), config: ItemConfig::default(), connection: None }
    }

    fn lock(&self) -> MutexGuard<'_, ItemState> {
        self.state.lock().unwrap() // unwrap: mutex poisoning is okay
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap() // unwrap: mutex poisoning is okay
    }

    // ------------------------------------------------------------------------
    // Registration

    /// Start putting the item on the bus. Does nothing if that's underway or done already.
    ///
    /// Registration completes in the background; follow it through [`state`][Self::state] or
    /// [`watch_state`][Self::watch_state]. Problems along the way are reported as
    /// [`Event::RegistrationFailed`]. If no watcher or no host is around yet, the item waits for
    /// them and completes registration once they show up.
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime.
    pub fn register(&self) {
        if matches!(self.state(), RegistrationState::Registering | RegistrationState::Registered) {
            return;
        }
        let mut session = self.session();
        let session = session.get_or_insert_with(|| self.start_session());
        self.registration.send_replace(RegistrationState::Registering);
        session.send(Command::Register);
    }

    fn start_session(&self) -> Session {
        let (commands, rx) = mpsc::unbounded_channel();
        let events = EventSink::new(self.events.clone());
        let ctx = Context {
            state: self.state.clone(),
            events: events.clone(),
            registration: self.registration.clone(),
            config: self.config.clone(),
            connection: self.connection.clone(),
        };
        driver::spawn(ctx, rx);
        Session { commands, events }
    }

    /// Take the item off the bus and free everything it holds there. No more events are delivered
    /// for the current session afterwards, even for calls already underway.
    ///
    /// Safe to call in any state and any number of times. The item can be registered again later.
    pub fn release(&self) {
        let Some(session) = self.session().take() else {
            return;
        };
        log::debug!("releasing item {}", self.id());
        session.events.close();
        session.send(Command::Release);
        self.registration.send_replace(RegistrationState::NotRegistered);
    }

    pub fn state(&self) -> RegistrationState {
        *self.registration.borrow()
    }

    /// Follow [`state`][Self::state] as it changes.
    pub fn watch_state(&self) -> watch::Receiver<RegistrationState> {
        self.registration.subscribe()
    }

    /// Whether registering claims a well-known name for the item, rather than using the unique
    /// name of its connection.
    pub fn registers_name_on_bus(&self) -> bool {
        self.config.bus_identity_policy.claims_name(is_sandboxed)
    }

    /// Get notified whenever one of the item's properties is set.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Property> {
        self.changes.subscribe()
    }

    fn apply(&self, f: impl FnOnce(&mut ItemState) -> Change) {
        let change = f(&mut self.lock());
        // no subscribers is fine
        let _ = self.changes.send(change.property);
        if let Some(signal) = change.signal {
            self.emit(signal);
        }
    }

    fn emit(&self, signal: ItemSignal) {
        if self.state() != RegistrationState::Registered {
            return;
        }
        if let Some(session) = &*self.session() {
            session.send(Command::Emit(signal));
        }
    }

    // ------------------------------------------------------------------------
    // Getters

    pub fn id(&self) -> String {
        self.lock().id().to_owned()
    }

    pub fn category(&self) -> Category {
        self.lock().category()
    }

    pub fn title(&self) -> Option<String> {
        self.lock().title().map(str::to_owned)
    }

    pub fn status(&self) -> Status {
        self.lock().status()
    }

    pub fn icon(&self, slot: IconSlot) -> IconValue {
        self.lock().icon(slot).clone()
    }

    pub fn has_bitmap(&self, slot: IconSlot) -> bool {
        self.lock().icon(slot).is_bitmap()
    }

    pub fn icon_name(&self, slot: IconSlot) -> Option<String> {
        self.lock().icon_name(slot).map(str::to_owned)
    }

    pub fn bitmap(&self, slot: IconSlot) -> Option<Arc<RgbaImage>> {
        self.lock().bitmap(slot).cloned()
    }

    pub fn attention_movie_name(&self) -> Option<String> {
        self.lock().attention_movie_name().map(str::to_owned)
    }

    pub fn tooltip_title(&self) -> Option<String> {
        self.lock().tooltip_title().map(str::to_owned)
    }

    pub fn tooltip_body(&self) -> Option<String> {
        self.lock().tooltip_body().map(str::to_owned)
    }

    pub fn window_id(&self) -> u32 {
        self.lock().window_id()
    }

    pub fn item_is_menu(&self) -> bool {
        self.lock().item_is_menu()
    }

    pub fn menu(&self) -> Option<OwnedObjectPath> {
        self.lock().menu().cloned()
    }

    // ------------------------------------------------------------------------
    // Setters

    pub fn set_title(&self, title: Option<&str>) {
        self.apply(|s| s.set_title(title.map(str::to_owned)));
    }

    pub fn set_status(&self, status: Status) {
        self.apply(|s| s.set_status(status));
    }

    /// Set what `slot` shows: an icon name, a bitmap, or [`IconValue::Unset`] for nothing. This
    /// replaces whatever the slot held before.
    pub fn set_icon(&self, slot: IconSlot, icon: impl Into<IconValue>) {
        let icon = icon.into();
        self.apply(|s| s.set_icon(slot, icon));
    }

    pub fn set_icon_name(&self, slot: IconSlot, icon_name: &str) {
        self.set_icon(slot, icon_name);
    }

    pub fn set_bitmap(&self, slot: IconSlot, bitmap: RgbaImage) {
        self.set_icon(slot, bitmap);
    }

    /// Name of an animation to play while the status is [`Status::NeedsAttention`].
    pub fn set_attention_movie_name(&self, name: Option<&str>) {
        self.apply(|s| s.set_attention_movie_name(name.map(str::to_owned)));
    }

    pub fn set_tooltip_title(&self, title: Option<&str>) {
        self.apply(|s| s.set_tooltip_title(title.map(str::to_owned)));
    }

    pub fn set_tooltip_body(&self, body: Option<&str>) {
        self.apply(|s| s.set_tooltip_body(body.map(str::to_owned)));
    }

    pub fn set_tooltip_icon(&self, icon: impl Into<IconValue>) {
        self.set_icon(IconSlot::Tooltip, icon);
    }

    /// Set the whole tooltip at once. Hosts are told about it once, not per field.
    pub fn set_tooltip(&self, icon: impl Into<IconValue>, title: Option<&str>, body: Option<&str>) {
        self.begin_tooltip_batch();
        self.set_tooltip_icon(icon);
        self.set_tooltip_title(title);
        self.set_tooltip_body(body);
        self.end_tooltip_batch();
    }

    /// Hold back tooltip change signals until the matching
    /// [`end_tooltip_batch`][Self::end_tooltip_batch], which then sends a single one. Batches nest.
    pub fn begin_tooltip_batch(&self) {
        self.lock().begin_tooltip_batch();
    }

    /// # Panics
    ///
    /// If there is no batch to end.
    pub fn end_tooltip_batch(&self) {
        let signal = self.lock().end_tooltip_batch();
        if let Some(signal) = signal {
            self.emit(signal);
        }
    }

    /// The X11 window id of the application's main window, or 0 for none.
    pub fn set_window_id(&self, window_id: u32) {
        self.apply(|s| s.set_window_id(window_id));
    }

    /// Whether the item only supports showing its menu, so hosts should show it on activation.
    pub fn set_item_is_menu(&self, item_is_menu: bool) {
        self.apply(|s| s.set_item_is_menu(item_is_menu));
    }

    /// Object path of a com.canonical.dbusmenu exported on the item's connection.
    pub fn set_menu(&self, menu: Option<OwnedObjectPath>) {
        self.apply(|s| s.set_menu(menu));
    }
}

impl Drop for StatusNotifierItem {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StatusNotifierItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusNotifierItem")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Configures a [`StatusNotifierItem`] before it is created.
#[derive(Debug)]
pub struct ItemBuilder {
    state: ItemState,
    config: ItemConfig,
    connection: Option<zbus::Connection>,
}

impl ItemBuilder {
    pub fn config(mut self, config: ItemConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bus_identity_policy(mut self, policy: BusIdentityPolicy) -> Self {
        self.config.bus_identity_policy = policy;
        self
    }

    pub fn name_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.name_namespace = namespace.into();
        self
    }

    pub fn bus_address(mut self, address: impl Into<String>) -> Self {
        self.config.bus_address = Some(address.into());
        self
    }

    /// Register on `con` instead of opening a dedicated connection.
    pub fn connection(mut self, con: zbus::Connection) -> Self {
        self.connection = Some(con);
        self
    }

    pub fn icon(mut self, slot: IconSlot, icon: impl Into<IconValue>) -> Self {
        self.state.set_icon(slot, icon.into());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.state.set_title(Some(title.to_owned()));
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.state.set_status(status);
        self
    }

    pub fn build(self) -> (StatusNotifierItem, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(64);
        let item = StatusNotifierItem {
            state: Arc::new(Mutex::new(self.state)),
            config: self.config,
            connection: self.connection,
            registration: Arc::new(watch::Sender::new(RegistrationState::NotRegistered)),
            changes,
            events,
            session: Mutex::new(None),
        };
        (item, rx)
    }
}
