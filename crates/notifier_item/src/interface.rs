use crate::{state, Error, IconSlot, IconValue, ItemSignal, ItemState};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::sync::mpsc;
use zbus::{interface, zvariant::OwnedObjectPath, SignalContext};

/// Scroll direction reported by [`Event::Scroll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Parse the orientation a host sends with `Scroll`. Anything but "vertical" (in any case) is
    /// horizontal.
    pub fn from_wire(orientation: &str) -> Self {
        if orientation.eq_ignore_ascii_case("vertical") {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        }
    }
}

/// Things the owner of a [`StatusNotifierItem`][crate::StatusNotifierItem] gets told about.
#[derive(Debug)]
pub enum Event {
    /// The user asked for the item's context menu, at screen coordinates `x`, `y`.
    ContextMenu { x: i32, y: i32 },
    /// The user activated the item, usually with a primary click.
    Activate { x: i32, y: i32 },
    /// The user activated the item in a less important way, usually with a middle click.
    SecondaryActivate { x: i32, y: i32 },
    /// The user scrolled over the item.
    Scroll { delta: i32, orientation: Orientation },
    /// Registration hit a problem. See [`Error::is_fatal`] for whether it gave up.
    RegistrationFailed(Error),
}

/// The sending half of an item's event channel, valid for one registration session.
///
/// Once [`close`][Self::close]d nothing more is delivered, even if a bus call or handshake step
/// that was already underway completes afterwards.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
    released: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx, released: Arc::new(AtomicBool::new(false)) }
    }

    pub fn send(&self, event: Event) {
        if self.is_closed() {
            log::debug!("item released, dropping {:?}", event);
            return;
        }
        if let Err(e) = self.tx.send(event) {
            log::debug!("nobody is listening for item events, dropping {:?}", e.0);
        }
    }

    pub fn close(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// The object exported at `/StatusNotifierItem`.
///
/// Reads go straight to the shared [`ItemState`], so they always reflect the latest setter call.
/// Method calls are forwarded to the owner as [`Event`]s and always answered with an empty reply.
pub(crate) struct ItemInterface {
    state: Arc<Mutex<ItemState>>,
    events: EventSink,
}

impl ItemInterface {
    pub fn new(state: Arc<Mutex<ItemState>>, events: EventSink) -> Self {
        Self { state, events }
    }

    fn state(&self) -> MutexGuard<'_, ItemState> {
        self.state.lock().unwrap() // unwrap: mutex poisoning is okay
    }

    /// Pixmaps get encoded after the lock is released, since bitmaps can be big.
    fn pixmaps(&self, slot: IconSlot) -> Vec<(i32, i32, Vec<u8>)> {
        let icon = self.state().icon(slot).clone();
        state::wire_pixmaps(&icon)
    }
}

#[interface(name = "org.kde.StatusNotifierItem")]
impl ItemInterface {
    /// ContextMenu method
    fn context_menu(&self, x: i32, y: i32) {
        self.events.send(Event::ContextMenu { x, y });
    }

    /// Activate method
    fn activate(&self, x: i32, y: i32) {
        self.events.send(Event::Activate { x, y });
    }

    /// SecondaryActivate method
    fn secondary_activate(&self, x: i32, y: i32) {
        self.events.send(Event::SecondaryActivate { x, y });
    }

    /// Scroll method
    fn scroll(&self, delta: i32, orientation: &str) {
        self.events.send(Event::Scroll { delta, orientation: Orientation::from_wire(orientation) });
    }

    #[zbus(property)]
    fn id(&self) -> String {
        self.state().id().to_owned()
    }

    #[zbus(property)]
    fn category(&self) -> String {
        self.state().category().to_string()
    }

    #[zbus(property)]
    fn status(&self) -> String {
        self.state().status().to_string()
    }

    #[zbus(property)]
    fn title(&self) -> String {
        self.state().wire_title()
    }

    /// WindowId property. Window ids are unsigned, but the property is an `i`.
    #[zbus(property)]
    fn window_id(&self) -> i32 {
        self.state().window_id() as i32
    }

    #[zbus(property)]
    fn icon_name(&self) -> String {
        self.state().wire_icon_name(IconSlot::Main)
    }

    #[zbus(property)]
    fn icon_pixmap(&self) -> Vec<(i32, i32, Vec<u8>)> {
        self.pixmaps(IconSlot::Main)
    }

    #[zbus(property)]
    fn overlay_icon_name(&self) -> String {
        self.state().wire_icon_name(IconSlot::Overlay)
    }

    #[zbus(property)]
    fn overlay_icon_pixmap(&self) -> Vec<(i32, i32, Vec<u8>)> {
        self.pixmaps(IconSlot::Overlay)
    }

    #[zbus(property)]
    fn attention_icon_name(&self) -> String {
        self.state().wire_icon_name(IconSlot::Attention)
    }

    #[zbus(property)]
    fn attention_icon_pixmap(&self) -> Vec<(i32, i32, Vec<u8>)> {
        self.pixmaps(IconSlot::Attention)
    }

    #[zbus(property)]
    fn attention_movie_name(&self) -> String {
        self.state().wire_attention_movie_name()
    }

    /// ToolTip property: icon name, icon pixmaps, title, body.
    #[zbus(property)]
    fn tool_tip(&self) -> (String, Vec<(i32, i32, Vec<u8>)>, String, String) {
        let (icon, title, body) = {
            let state = self.state();
            (
                state.icon(IconSlot::Tooltip).clone(),
                state.tooltip_title().unwrap_or_default().to_owned(),
                state.tooltip_body().unwrap_or_default().to_owned(),
            )
        };
        let icon_name = match &icon {
            IconValue::Name(name) => name.clone(),
            IconValue::Bitmap(_) | IconValue::Unset => String::new(),
        };
        (icon_name, state::wire_pixmaps(&icon), title, body)
    }

    #[zbus(property)]
    fn item_is_menu(&self) -> bool {
        self.state().item_is_menu()
    }

    #[zbus(property)]
    fn menu(&self) -> OwnedObjectPath {
        self.state().wire_menu()
    }

    /// NewTitle signal
    #[zbus(signal)]
    async fn new_title(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

    /// NewIcon signal
    #[zbus(signal)]
    async fn new_icon(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

    /// NewAttentionIcon signal
    #[zbus(signal)]
    async fn new_attention_icon(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

    /// NewOverlayIcon signal
    #[zbus(signal)]
    async fn new_overlay_icon(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

    /// NewToolTip signal
    #[zbus(signal)]
    async fn new_tool_tip(ctxt: &SignalContext<'_>) -> zbus::Result<()>;

    /// NewStatus signal
    #[zbus(signal)]
    async fn new_status(ctxt: &SignalContext<'_>, status: &str) -> zbus::Result<()>;
}

/// Emit `signal` from the item object `ctxt` points at.
pub(crate) async fn emit(ctxt: &SignalContext<'_>, signal: ItemSignal) -> zbus::Result<()> {
    match signal {
        ItemSignal::NewTitle => ItemInterface::new_title(ctxt).await,
        ItemSignal::NewIcon => ItemInterface::new_icon(ctxt).await,
        ItemSignal::NewAttentionIcon => ItemInterface::new_attention_icon(ctxt).await,
        ItemSignal::NewOverlayIcon => ItemInterface::new_overlay_icon(ctxt).await,
        ItemSignal::NewToolTip => ItemInterface::new_tool_tip(ctxt).await,
        ItemSignal::NewStatus(status) => ItemInterface::new_status(ctxt, &status.to_string()).await,
    }
}
