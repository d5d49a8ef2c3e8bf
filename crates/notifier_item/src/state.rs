use crate::*;

use std::sync::Arc;

use image::RgbaImage;
use zbus::zvariant::OwnedObjectPath;

/// Recognised values of [`org.freedesktop.StatusNotifierItem.Category`].
///
/// [`org.freedesktop.StatusNotifierItem.Category`]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/#org.freedesktop.statusnotifieritem.category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
pub enum Category {
    /// The item describes the status of a generic application, for instance the current state of
    /// a media player.
    #[default]
    ApplicationStatus,
    /// The item describes the status of communication oriented applications, like an instant
    /// messenger or an email client.
    Communications,
    /// The item describes services of the system not seen as a stand alone application by the
    /// user, such as an indicator for the activity of a disk indexing service.
    SystemServices,
    /// The item describes the state and control of a particular hardware, such as an indicator of
    /// the battery charge or sound card volume control.
    Hardware,
}

/// Recognised values of [`org.freedesktop.StatusNotifierItem.Status`].
///
/// [`org.freedesktop.StatusNotifierItem.Status`]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/#org.freedesktop.statusnotifieritem.status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
pub enum Status {
    /// The item doesn't convey important information to the user, it can be considered an "idle"
    /// status and is likely that visualizations will chose to hide it.
    #[default]
    Passive,
    /// The item is active, is more important that the item will be shown in some way to the user.
    Active,
    /// The item carries really important information for the user, such as battery charge running
    /// out and is wants to incentive the direct user intervention. Visualizations should emphasize
    /// in some way the items with NeedsAttention status.
    NeedsAttention,
}

/// The four icons an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum IconSlot {
    /// The icon identifying the item.
    Main,
    /// Extra state information, usually drawn on top of the main icon.
    Overlay,
    /// Shown instead of the main icon while the status is [`Status::NeedsAttention`].
    Attention,
    /// Shown in the tooltip.
    Tooltip,
}

impl IconSlot {
    fn index(self) -> usize {
        match self {
            IconSlot::Main => 0,
            IconSlot::Overlay => 1,
            IconSlot::Attention => 2,
            IconSlot::Tooltip => 3,
        }
    }
}

/// What an icon slot holds. An icon is either identified by its freedesktop icon name or by the
/// icon data itself, never both.
#[derive(Debug, Clone, Default)]
pub enum IconValue {
    #[default]
    Unset,
    /// A freedesktop-compliant icon name, or an absolute path to an image.
    Name(String),
    /// Decoded image data.
    Bitmap(Arc<RgbaImage>),
}

impl IconValue {
    pub fn is_bitmap(&self) -> bool {
        matches!(self, IconValue::Bitmap(_))
    }
}

impl From<&str> for IconValue {
    fn from(name: &str) -> Self {
        IconValue::Name(name.to_owned())
    }
}

impl From<String> for IconValue {
    fn from(name: String) -> Self {
        IconValue::Name(name)
    }
}

impl From<RgbaImage> for IconValue {
    fn from(bitmap: RgbaImage) -> Self {
        IconValue::Bitmap(Arc::new(bitmap))
    }
}

/// Locally observable item properties, reported whenever a setter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Title,
    Status,
    Icon(IconSlot),
    AttentionMovieName,
    TooltipTitle,
    TooltipBody,
    WindowId,
    ItemIsMenu,
    Menu,
}

/// Signals of the `org.kde.StatusNotifierItem` interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSignal {
    NewTitle,
    NewIcon,
    NewAttentionIcon,
    NewOverlayIcon,
    NewToolTip,
    NewStatus(Status),
}

/// The outcome of a setter: what changed locally, and what (if anything) hosts should be told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub property: Property,
    pub signal: Option<ItemSignal>,
}

/// All the data an item exposes.
#[derive(Debug, Clone)]
pub struct ItemState {
    id: String,
    category: Category,
    title: Option<String>,
    status: Status,
    icons: [IconValue; 4],
    attention_movie_name: Option<String>,
    tooltip_title: Option<String>,
    tooltip_body: Option<String>,
    window_id: u32,
    item_is_menu: bool,
    menu: Option<OwnedObjectPath>,
    tooltip_batch_depth: u32,
}

impl ItemState {
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            category,
            title: None,
            status: Status::default(),
            icons: Default::default(),
            attention_movie_name: None,
            tooltip_title: None,
            tooltip_body: None,
            window_id: 0,
            item_is_menu: false,
            menu: None,
            tooltip_batch_depth: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn icon(&self, slot: IconSlot) -> &IconValue {
        &self.icons[slot.index()]
    }

    /// The icon name of a slot, or `None` if it holds a bitmap or nothing.
    pub fn icon_name(&self, slot: IconSlot) -> Option<&str> {
        match self.icon(slot) {
            IconValue::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The bitmap of a slot, or `None` if it holds an icon name or nothing.
    pub fn bitmap(&self, slot: IconSlot) -> Option<&Arc<RgbaImage>> {
        match self.icon(slot) {
            IconValue::Bitmap(bitmap) => Some(bitmap),
            _ => None,
        }
    }

    pub fn attention_movie_name(&self) -> Option<&str> {
        self.attention_movie_name.as_deref()
    }

    pub fn tooltip_title(&self) -> Option<&str> {
        self.tooltip_title.as_deref()
    }

    pub fn tooltip_body(&self) -> Option<&str> {
        self.tooltip_body.as_deref()
    }

    pub fn window_id(&self) -> u32 {
        self.window_id
    }

    pub fn item_is_menu(&self) -> bool {
        self.item_is_menu
    }

    pub fn menu(&self) -> Option<&OwnedObjectPath> {
        self.menu.as_ref()
    }

    pub fn tooltip_batch_depth(&self) -> u32 {
        self.tooltip_batch_depth
    }

    // ------------------------------------------------------------------------

    pub fn set_title(&mut self, title: Option<String>) -> Change {
        self.title = title;
        Change { property: Property::Title, signal: Some(ItemSignal::NewTitle) }
    }

    pub fn set_status(&mut self, status: Status) -> Change {
        self.status = status;
        Change { property: Property::Status, signal: Some(ItemSignal::NewStatus(status)) }
    }

    /// Replace whatever `slot` holds.
    pub fn set_icon(&mut self, slot: IconSlot, icon: IconValue) -> Change {
        self.icons[slot.index()] = icon;
        let signal = match slot {
            IconSlot::Main => Some(ItemSignal::NewIcon),
            IconSlot::Overlay => Some(ItemSignal::NewOverlayIcon),
            IconSlot::Attention => Some(ItemSignal::NewAttentionIcon),
            IconSlot::Tooltip => self.tooltip_signal(),
        };
        Change { property: Property::Icon(slot), signal }
    }

    pub fn set_attention_movie_name(&mut self, name: Option<String>) -> Change {
        self.attention_movie_name = name;
        Change { property: Property::AttentionMovieName, signal: None }
    }

    pub fn set_tooltip_title(&mut self, title: Option<String>) -> Change {
        self.tooltip_title = title;
        Change { property: Property::TooltipTitle, signal: self.tooltip_signal() }
    }

    pub fn set_tooltip_body(&mut self, body: Option<String>) -> Change {
        self.tooltip_body = body;
        Change { property: Property::TooltipBody, signal: self.tooltip_signal() }
    }

    pub fn set_window_id(&mut self, window_id: u32) -> Change {
        self.window_id = window_id;
        Change { property: Property::WindowId, signal: None }
    }

    pub fn set_item_is_menu(&mut self, item_is_menu: bool) -> Change {
        self.item_is_menu = item_is_menu;
        Change { property: Property::ItemIsMenu, signal: None }
    }

    pub fn set_menu(&mut self, menu: Option<OwnedObjectPath>) -> Change {
        self.menu = menu;
        Change { property: Property::Menu, signal: None }
    }

    /// Stop tooltip changes from producing `NewToolTip` until the matching
    /// [`end_tooltip_batch`][Self::end_tooltip_batch]. Batches nest.
    pub fn begin_tooltip_batch(&mut self) {
        self.tooltip_batch_depth += 1;
    }

    /// Close a batch. Closing the outermost one yields the single `NewToolTip` for the whole batch.
    ///
    /// # Panics
    ///
    /// If no batch is open.
    pub fn end_tooltip_batch(&mut self) -> Option<ItemSignal> {
        assert!(self.tooltip_batch_depth > 0, "end_tooltip_batch called without a matching begin_tooltip_batch");
        self.tooltip_batch_depth -= 1;
        self.tooltip_signal()
    }

    fn tooltip_signal(&self) -> Option<ItemSignal> {
        if self.tooltip_batch_depth == 0 {
            Some(ItemSignal::NewToolTip)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------------
    // Values as they go over the wire.

    pub fn wire_title(&self) -> String {
        self.title.clone().unwrap_or_default()
    }

    pub fn wire_icon_name(&self, slot: IconSlot) -> String {
        self.icon_name(slot).unwrap_or_default().to_owned()
    }

    pub fn wire_attention_movie_name(&self) -> String {
        self.attention_movie_name.clone().unwrap_or_default()
    }

    pub fn wire_menu(&self) -> OwnedObjectPath {
        match &self.menu {
            Some(path) => path.clone(),
            None => zbus::zvariant::ObjectPath::from_static_str_unchecked(names::NO_MENU_OBJECT).into(),
        }
    }
}

/// The `*Pixmap` value of an icon slot: one entry if it holds a bitmap, empty otherwise.
pub(crate) fn wire_pixmaps(icon: &IconValue) -> Vec<(i32, i32, Vec<u8>)> {
    match encode_slot(icon) {
        Ok(pixmap) => vec![pixmap.into()],
        Err(IconError::NotABitmap) => Vec::new(),
        Err(e) => {
            log::warn!("failed to encode icon: {}", e);
            Vec::new()
        }
    }
}
