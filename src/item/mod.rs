//! Tray items.
//!
//! An [`Item`] is a strategy object: every attribute a tray icon shows is
//! derived on demand through a query, and an [`ItemEvent`] announces that a
//! query may now answer differently. Variants override only the queries
//! they care about; everything else keeps a neutral default.

pub mod clock;
pub mod sni;
mod static_item;
mod wrapper;

pub use clock::ClockItem;
pub use sni::{Pixmap, SniItem, SniState, SniStatus};
pub use static_item::StaticItem;
pub use wrapper::ItemWrapper;

use std::cell::Cell;
use std::ops::BitOr;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{Result, TrayError};
use crate::icon_theme::IconTheme;
use crate::image::Image;
use crate::menu::Menu;
use crate::signal::{HandlerId, Signals};

/// Change notifications fired by items. None carries a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemEvent {
    IsVisibleChanged,
    IsBlinkingChanged,
    NameChanged,
    IconChanged,
    ZoomChanged,
    HasArrowChanged,
    MenuLeftChanged,
    MenuRightChanged,
    DragSourceChanged,
    /// Terminal notification, fired once by [`Item::destroy`].
    Destroyed,
}

impl ItemEvent {
    /// Every event except [`ItemEvent::Destroyed`].
    pub const CHANGES: [ItemEvent; 9] = [
        ItemEvent::IsVisibleChanged,
        ItemEvent::IsBlinkingChanged,
        ItemEvent::NameChanged,
        ItemEvent::IconChanged,
        ItemEvent::ZoomChanged,
        ItemEvent::HasArrowChanged,
        ItemEvent::MenuLeftChanged,
        ItemEvent::MenuRightChanged,
        ItemEvent::DragSourceChanged,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ItemEvent::IsVisibleChanged => "is-visible-changed",
            ItemEvent::IsBlinkingChanged => "is-blinking-changed",
            ItemEvent::NameChanged => "name-changed",
            ItemEvent::IconChanged => "icon-changed",
            ItemEvent::ZoomChanged => "zoom-changed",
            ItemEvent::HasArrowChanged => "has-arrow-changed",
            ItemEvent::MenuLeftChanged => "menu-left-changed",
            ItemEvent::MenuRightChanged => "menu-right-changed",
            ItemEvent::DragSourceChanged => "drag-source-changed",
            ItemEvent::Destroyed => "destroyed",
        }
    }
}

/// A drag target type offered by an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragTarget {
    pub target: String,
    pub flags: u32,
    pub info: u32,
}

impl DragTarget {
    pub fn new(target: impl Into<String>, info: u32) -> Self {
        Self {
            target: target.into(),
            flags: 0,
            info,
        }
    }
}

/// Bitmask of drag actions an item allows as a drag source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DragActions(u32);

impl DragActions {
    pub const NONE: Self = Self(0);
    pub const DEFAULT: Self = Self(1 << 0);
    pub const COPY: Self = Self(1 << 1);
    pub const MOVE: Self = Self(1 << 2);
    pub const LINK: Self = Self(1 << 3);
    pub const PRIVATE: Self = Self(1 << 4);
    pub const ASK: Self = Self(1 << 5);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DragActions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The action chosen for a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Copy,
    Move,
    Link,
}

/// State of an ongoing drag, as seen by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragContext {
    pub actions: DragActions,
    pub action: DragAction,
}

/// Sink the drag source writes its payload into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionData {
    pub target: String,
    data: Vec<u8>,
}

impl SelectionData {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            data: Vec::new(),
        }
    }

    pub fn set(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    pub fn set_uris(&mut self, uris: &[String]) {
        let mut joined = uris.join("\r\n");
        joined.push_str("\r\n");
        self.data = joined.into_bytes();
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// State every item carries: its event channels and its icon theme
/// subscription.
pub struct ItemBase {
    signals: Rc<Signals<ItemEvent>>,
    theme: Rc<IconTheme>,
    theme_handler: Cell<Option<HandlerId>>,
}

impl std::fmt::Debug for ItemBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemBase")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ItemBase {
    /// Subscribe to `theme`; a theme change becomes `icon-changed`.
    pub fn new(theme: &Rc<IconTheme>) -> Self {
        let signals = Rc::new(Signals::new());
        let weak = Rc::downgrade(&signals);
        let handler = theme.connect_changed(move || {
            if let Some(signals) = weak.upgrade() {
                signals.emit(ItemEvent::IconChanged);
            }
        });
        Self {
            signals,
            theme: Rc::clone(theme),
            theme_handler: Cell::new(Some(handler)),
        }
    }

    pub fn signals(&self) -> &Signals<ItemEvent> {
        &self.signals
    }

    pub(crate) fn downgrade(&self) -> Weak<Signals<ItemEvent>> {
        Rc::downgrade(&self.signals)
    }

    pub fn theme(&self) -> &Rc<IconTheme> {
        &self.theme
    }

    pub fn is_destroyed(&self) -> bool {
        self.theme_handler.get().is_none()
    }

    /// Fire `event`. Change events after destruction are dropped.
    pub fn emit(&self, event: ItemEvent) {
        if self.is_destroyed() {
            trace!(event = event.name(), "ignoring event from destroyed item");
            return;
        }
        self.signals.emit(event);
    }

    /// Unsubscribe from the theme and fire `destroyed`.
    pub fn destroy(&self) -> Result<()> {
        let handler = self
            .theme_handler
            .take()
            .ok_or(TrayError::AlreadyDestroyed)?;
        self.theme.disconnect(handler);
        self.signals.emit(ItemEvent::Destroyed);
        Ok(())
    }
}

impl Drop for ItemBase {
    fn drop(&mut self) {
        if let Some(handler) = self.theme_handler.take() {
            self.theme.disconnect(handler);
        }
    }
}

/// Capability surface of a tray entity.
///
/// Every query has a neutral default. Implementors provide [`Item::base`]
/// and override what they need.
pub trait Item {
    fn base(&self) -> &ItemBase;

    /// Event channels of this item.
    fn signals(&self) -> &Signals<ItemEvent> {
        self.base().signals()
    }

    fn emit(&self, event: ItemEvent) {
        self.base().emit(event);
    }

    fn is_destroyed(&self) -> bool {
        self.base().is_destroyed()
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn is_blinking(&self) -> bool {
        false
    }

    fn get_name(&self) -> String {
        String::new()
    }

    /// The image to show at `size`.
    ///
    /// Tries [`Item::get_icon_path`], then each of [`Item::get_icon_names`]
    /// through the icon theme, then [`Item::get_icon_pixbuf`]. Decode and
    /// lookup failures fall through silently.
    fn get_icon(&self, size: u32) -> Option<Image> {
        resolve_icon(self, size)
    }

    /// Theme icon names, tried in order.
    fn get_icon_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Image used when neither the path nor the names yield one.
    fn get_icon_pixbuf(&self) -> Option<Image> {
        None
    }

    /// File the icon is loaded from first.
    fn get_icon_path(&self) -> Option<PathBuf> {
        None
    }

    /// Emblem shown in the upper left corner.
    fn get_emblem(&self) -> Option<Image> {
        None
    }

    fn get_zoom(&self) -> f64 {
        1.0
    }

    fn has_arrow(&self) -> bool {
        false
    }

    /// Menu shown on left click when [`Item::click`] returns `false`.
    fn get_menu_left(&self) -> Option<Menu> {
        None
    }

    fn get_menu_right(&self) -> Option<Menu> {
        None
    }

    fn mouse_wheel_up(&self, _time: u32) -> bool {
        false
    }

    fn mouse_wheel_down(&self, _time: u32) -> bool {
        false
    }

    /// The pointer rests on the icon during a drag. Return `true` to be
    /// called again after a second.
    fn spring_open(&self, _time: u32) -> bool {
        false
    }

    /// Left click. Return `true` if an action was performed.
    fn click(&self, _time: u32) -> bool {
        false
    }

    fn uris_dropped(&self, _uris: &[String], _action: DragAction) {}

    /// Whether the icon accepts dropped URIs.
    fn is_drop_target(&self) -> bool {
        true
    }

    fn get_drag_source_targets(&self) -> Vec<DragTarget> {
        Vec::new()
    }

    fn get_drag_source_actions(&self) -> DragActions {
        DragActions::NONE
    }

    fn drag_data_get(
        &self,
        _context: &DragContext,
        _data: &mut SelectionData,
        _info: u32,
        _time: u32,
    ) {
    }

    /// Unsubscribe from the icon theme and fire `destroyed`. A second call
    /// returns [`TrayError::AlreadyDestroyed`].
    fn destroy(&self) -> Result<()> {
        self.base().destroy()
    }
}

/// The default icon fallback chain shared by every item.
pub fn resolve_icon<I: Item + ?Sized>(item: &I, size: u32) -> Option<Image> {
    let theme = item.base().theme();

    if let Some(path) = item.get_icon_path() {
        match theme.decode(&path) {
            Ok(image) => return Some(image),
            Err(e) => debug!(error = %e, "icon path unusable, trying names"),
        }
    }

    for name in item.get_icon_names() {
        let Some(path) = theme.lookup(&name, size) else {
            trace!(name, size, "icon name not in theme");
            continue;
        };
        match theme.decode(&path) {
            Ok(image) => return Some(image),
            Err(e) => debug!(name, error = %e, "themed icon unusable"),
        }
    }

    item.get_icon_pixbuf()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::icon_theme::tests::table_theme;
    use std::cell::RefCell;

    /// Records every event an item fires.
    pub(crate) fn record(item: &dyn Item) -> Rc<RefCell<Vec<ItemEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for event in ItemEvent::CHANGES
            .into_iter()
            .chain([ItemEvent::Destroyed])
        {
            let log = Rc::clone(&log);
            item.signals().connect(event, move || log.borrow_mut().push(event));
        }
        log
    }

    struct Bare {
        base: ItemBase,
    }

    impl Item for Bare {
        fn base(&self) -> &ItemBase {
            &self.base
        }
    }

    #[test]
    fn defaults_are_neutral() {
        let theme = table_theme(&[]);
        let item = Bare {
            base: ItemBase::new(&theme),
        };
        assert!(item.is_visible());
        assert!(!item.is_blinking());
        assert_eq!(item.get_name(), "");
        assert_eq!(item.get_zoom(), 1.0);
        assert!(!item.has_arrow());
        assert!(item.get_menu_left().is_none());
        assert!(!item.click(0));
        assert!(!item.spring_open(0));
        assert!(item.get_drag_source_targets().is_empty());
        assert!(item.get_drag_source_actions().is_empty());
        assert!(item.get_icon(22).is_none());
    }

    #[test]
    fn icon_falls_through_broken_path_and_unknown_names() {
        let theme = table_theme(&[("second", "/icons/second.png")]);
        let item = StaticItem::new(&theme);
        item.set_icon_path(Some("/icons/broken.bad".into()));
        item.set_icon_names(vec!["first".into(), "second".into()]);
        item.set_icon_pixbuf(Some(Image::from_rgba(1, 1, vec![9, 9, 9, 9]).unwrap()));

        let icon = item.get_icon(22).unwrap();
        let expected = theme.decode(std::path::Path::new("/icons/second.png")).unwrap();
        assert_eq!(icon, expected);
    }

    #[test]
    fn icon_uses_pixbuf_when_nothing_resolves() {
        let theme = table_theme(&[("broken", "/icons/broken.bad")]);
        let item = StaticItem::new(&theme);
        let pixbuf = Image::from_rgba(1, 1, vec![9, 9, 9, 9]).unwrap();
        item.set_icon_names(vec!["broken".into(), "missing".into()]);
        item.set_icon_pixbuf(Some(pixbuf.clone()));
        assert_eq!(item.get_icon(22), Some(pixbuf));
    }

    #[test]
    fn theme_change_becomes_icon_changed_until_destroyed() {
        let theme = table_theme(&[]);
        let item = Bare {
            base: ItemBase::new(&theme),
        };
        let log = record(&item);
        assert_eq!(theme.subscriber_count(), 1);

        theme.changed();
        item.destroy().unwrap();
        theme.changed();

        assert_eq!(*log.borrow(), vec![ItemEvent::IconChanged, ItemEvent::Destroyed]);
        assert_eq!(theme.subscriber_count(), 0);
    }

    #[test]
    fn second_destroy_is_rejected() {
        let theme = table_theme(&[]);
        let item = Bare {
            base: ItemBase::new(&theme),
        };
        let log = record(&item);
        item.destroy().unwrap();
        assert!(matches!(item.destroy(), Err(TrayError::AlreadyDestroyed)));
        assert_eq!(*log.borrow(), vec![ItemEvent::Destroyed]);
    }

    #[test]
    fn dropping_an_item_releases_the_theme_subscription() {
        let theme = table_theme(&[]);
        drop(Bare {
            base: ItemBase::new(&theme),
        });
        assert_eq!(theme.subscriber_count(), 0);
    }

    #[test]
    fn selection_data_joins_uris() {
        let mut data = SelectionData::new("text/uri-list");
        data.set_uris(&["file:///a".into(), "file:///b".into()]);
        assert_eq!(data.data(), b"file:///a\r\nfile:///b\r\n");
    }
}
