use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use system_tray::client::ActivateRequest;
use system_tray::item::{IconPixmap, Status, StatusNotifierItem};
use system_tray::menu::TrayMenu;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Item, ItemBase, ItemEvent};
use crate::icon_theme::{find_icon_in_path, IconTheme, ICON_SIZE};
use crate::image::{self, Image};
use crate::menu::{self, Menu, MenuItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SniStatus {
    #[default]
    Active,
    Passive,
    NeedsAttention,
}

/// One ARGB32 pixmap as sent by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pub argb: Vec<u8>,
}

impl Pixmap {
    /// Whether the declared size is within bounds and `argb` covers it.
    pub fn is_valid(&self) -> bool {
        image::byte_len(self.width, self.height).is_some_and(|len| self.argb.len() >= len)
    }
}

/// The parts of a StatusNotifierItem the tray shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SniState {
    pub id: String,
    pub title: Option<String>,
    pub status: SniStatus,
    pub icon_name: Option<String>,
    pub attention_icon_name: Option<String>,
    pub overlay_icon_name: Option<String>,
    pub icon_theme_path: Option<PathBuf>,
    pub icon_pixmaps: Vec<Pixmap>,
    pub item_is_menu: bool,
}

impl From<&StatusNotifierItem> for SniState {
    fn from(item: &StatusNotifierItem) -> Self {
        let status = match item.status {
            Status::Passive => SniStatus::Passive,
            Status::NeedsAttention => SniStatus::NeedsAttention,
            _ => SniStatus::Active,
        };
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            status,
            icon_name: non_empty(&item.icon_name),
            attention_icon_name: non_empty(&item.attention_icon_name),
            overlay_icon_name: non_empty(&item.overlay_icon_name),
            icon_theme_path: non_empty(&item.icon_theme_path).map(PathBuf::from),
            icon_pixmaps: item
                .icon_pixmap
                .as_deref()
                .map(convert_pixmaps)
                .unwrap_or_default(),
            item_is_menu: item.item_is_menu,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn convert_pixmaps(pixmaps: &[IconPixmap]) -> Vec<Pixmap> {
    pixmaps
        .iter()
        .filter_map(|p| {
            Some(Pixmap {
                width: u32::try_from(p.width).ok()?,
                height: u32::try_from(p.height).ok()?,
                argb: p.pixels.clone(),
            })
        })
        .filter(Pixmap::is_valid)
        .collect()
}

/// An item published by an application over the StatusNotifierItem
/// protocol.
pub struct SniItem {
    base: ItemBase,
    address: String,
    state: RefCell<SniState>,
    menu: RefCell<Option<Vec<MenuItem>>>,
    activate_tx: Option<mpsc::Sender<ActivateRequest>>,
}

impl std::fmt::Debug for SniItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniItem")
            .field("address", &self.address)
            .field("state", &self.state.borrow())
            .finish()
    }
}

impl SniItem {
    pub fn new(
        theme: &Rc<IconTheme>,
        address: impl Into<String>,
        state: SniState,
        activate_tx: Option<mpsc::Sender<ActivateRequest>>,
    ) -> Self {
        Self {
            base: ItemBase::new(theme),
            address: address.into(),
            state: RefCell::new(state),
            menu: RefCell::new(None),
            activate_tx,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Take a fresh snapshot and fire the events for what changed.
    pub fn replace(&self, state: SniState) {
        let old = self.state.replace(state);
        let new = self.state.borrow().clone();

        let mut events = Vec::new();
        if old.title != new.title || old.id != new.id {
            events.push(ItemEvent::NameChanged);
        }
        if (old.status == SniStatus::Passive) != (new.status == SniStatus::Passive) {
            events.push(ItemEvent::IsVisibleChanged);
        }
        if (old.status == SniStatus::NeedsAttention) != (new.status == SniStatus::NeedsAttention) {
            events.push(ItemEvent::IsBlinkingChanged);
        }
        if old.icon_name != new.icon_name
            || old.attention_icon_name != new.attention_icon_name
            || old.overlay_icon_name != new.overlay_icon_name
            || old.icon_theme_path != new.icon_theme_path
            || old.icon_pixmaps != new.icon_pixmaps
            || old.status != new.status
        {
            events.push(ItemEvent::IconChanged);
        }
        if old.item_is_menu != new.item_is_menu {
            events.push(ItemEvent::MenuLeftChanged);
        }

        debug!(address = %self.address, ?events, "sni item updated");
        for event in events {
            self.emit(event);
        }
    }

    pub fn set_title(&self, title: Option<String>) {
        if self.state.borrow().title == title {
            return;
        }
        self.state.borrow_mut().title = title;
        self.emit(ItemEvent::NameChanged);
    }

    pub fn set_menu(&self, menu: &TrayMenu) {
        self.set_menu_items(menu::convert_menu(menu));
    }

    pub fn set_menu_items(&self, items: Vec<MenuItem>) {
        *self.menu.borrow_mut() = Some(items);
        self.emit(ItemEvent::MenuRightChanged);
        if self.state.borrow().item_is_menu {
            self.emit(ItemEvent::MenuLeftChanged);
        }
    }

    fn send(&self, request: ActivateRequest) -> bool {
        let Some(tx) = &self.activate_tx else {
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => true,
            Err(e) => {
                warn!(address = %self.address, error = %e, "activation request dropped");
                false
            }
        }
    }

    fn build_menu(&self) -> Option<Menu> {
        let items = self.menu.borrow().clone()?;
        if items.is_empty() {
            return None;
        }
        let address = self.address.clone();
        let tx = self.activate_tx.clone();
        Some(Menu::new(items).on_activate(move |id| {
            let Some(tx) = &tx else { return };
            let request = ActivateRequest::MenuItem {
                address: address.clone(),
                menu_path: "/MenuBar".to_string(),
                submenu_id: id,
            };
            if let Err(e) = tx.try_send(request) {
                warn!(%address, error = %e, "menu activation dropped");
            }
        }))
    }
}

impl Item for SniItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn is_visible(&self) -> bool {
        self.state.borrow().status != SniStatus::Passive
    }

    fn is_blinking(&self) -> bool {
        self.state.borrow().status == SniStatus::NeedsAttention
    }

    fn get_name(&self) -> String {
        let state = self.state.borrow();
        state
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| state.id.clone())
    }

    fn get_icon_names(&self) -> Vec<String> {
        let state = self.state.borrow();
        let attention = state
            .attention_icon_name
            .clone()
            .filter(|_| state.status == SniStatus::NeedsAttention);
        attention.into_iter().chain(state.icon_name.clone()).collect()
    }

    /// The icon name resolved inside the application's own theme path.
    fn get_icon_path(&self) -> Option<PathBuf> {
        let state = self.state.borrow();
        let theme_path = state.icon_theme_path.as_ref()?;
        let name = state.icon_name.as_ref()?;
        find_icon_in_path(theme_path, name, ICON_SIZE)
    }

    /// The pixmap closest to the tray icon size.
    fn get_icon_pixbuf(&self) -> Option<Image> {
        let state = self.state.borrow();
        let pixmap = state
            .icon_pixmaps
            .iter()
            .filter(|p| p.is_valid())
            .min_by_key(|p| p.width.abs_diff(ICON_SIZE))?;
        Image::from_argb32(pixmap.width, pixmap.height, &pixmap.argb)
    }

    fn get_emblem(&self) -> Option<Image> {
        let name = self.state.borrow().overlay_icon_name.clone()?;
        let theme = self.base.theme();
        let path = theme.lookup(&name, ICON_SIZE / 2)?;
        theme.decode(&path).ok()
    }

    fn get_menu_left(&self) -> Option<Menu> {
        if self.state.borrow().item_is_menu {
            self.build_menu()
        } else {
            None
        }
    }

    fn get_menu_right(&self) -> Option<Menu> {
        self.build_menu()
    }

    /// Menu-only items have no primary action; their left menu opens instead.
    fn click(&self, _time: u32) -> bool {
        if self.state.borrow().item_is_menu {
            return false;
        }
        self.send(ActivateRequest::Default {
            address: self.address.clone(),
            x: 0,
            y: 0,
        })
    }

    fn is_drop_target(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon_theme::tests::table_theme;
    use crate::item::tests::record;

    fn state() -> SniState {
        SniState {
            id: "discord".into(),
            title: Some("Discord".into()),
            icon_name: Some("discord".into()),
            attention_icon_name: Some("discord-unread".into()),
            ..SniState::default()
        }
    }

    #[test]
    fn replace_fires_only_affected_events() {
        let theme = table_theme(&[]);
        let item = SniItem::new(&theme, ":1.42", state(), None);
        let log = record(&item);

        item.replace(state());
        assert!(log.borrow().is_empty());

        item.replace(SniState {
            status: SniStatus::NeedsAttention,
            ..state()
        });
        assert_eq!(
            *log.borrow(),
            vec![ItemEvent::IsBlinkingChanged, ItemEvent::IconChanged]
        );
        assert_eq!(item.get_icon_names(), vec!["discord-unread", "discord"]);

        log.borrow_mut().clear();
        item.replace(SniState {
            status: SniStatus::Passive,
            ..state()
        });
        assert_eq!(
            *log.borrow(),
            vec![
                ItemEvent::IsVisibleChanged,
                ItemEvent::IsBlinkingChanged,
                ItemEvent::IconChanged
            ]
        );
        assert!(!item.is_visible());
    }

    #[test]
    fn name_falls_back_to_id() {
        let theme = table_theme(&[]);
        let item = SniItem::new(&theme, ":1.42", state(), None);
        assert_eq!(item.get_name(), "Discord");
        item.set_title(None);
        assert_eq!(item.get_name(), "discord");
    }

    #[test]
    fn pixbuf_picks_size_closest_to_tray() {
        let theme = table_theme(&[]);
        let pixmap = |size: u32| Pixmap {
            width: size,
            height: size,
            argb: vec![0xff; (size * size * 4) as usize],
        };
        let item = SniItem::new(
            &theme,
            ":1.7",
            SniState {
                icon_pixmaps: vec![pixmap(64), pixmap(24), pixmap(16)],
                ..SniState::default()
            },
            None,
        );
        assert_eq!(item.get_icon_pixbuf().unwrap().width(), 24);
        assert_eq!(item.get_icon(22).unwrap().width(), 24);
    }

    #[test]
    fn oversized_or_short_pixmaps_are_skipped() {
        let wire = |width: i32, height: i32, len: usize| IconPixmap {
            width,
            height,
            pixels: vec![0xff; len],
        };
        let converted = convert_pixmaps(&[
            wire(2_000_000, 2_000_000, 16),
            wire(16, 16, 4),
            wire(-1, 16, 64),
            wire(2, 2, 16),
        ]);
        assert_eq!(converted.len(), 1);
        assert_eq!((converted[0].width, converted[0].height), (2, 2));

        let theme = table_theme(&[]);
        let item = SniItem::new(
            &theme,
            ":1.8",
            SniState {
                icon_pixmaps: vec![
                    Pixmap {
                        width: 22,
                        height: 22,
                        argb: vec![0xff; 4],
                    },
                    Pixmap {
                        width: 2_000_000,
                        height: 2_000_000,
                        argb: vec![0xff; 16],
                    },
                ],
                ..SniState::default()
            },
            None,
        );
        assert!(item.get_icon_pixbuf().is_none());
    }

    #[test]
    fn click_sends_activation_and_menu_sends_item_id() {
        let theme = table_theme(&[]);
        let (tx, mut rx) = mpsc::channel(4);
        let item = SniItem::new(&theme, ":1.9", state(), Some(tx));
        let log = record(&item);

        assert!(item.click(0));
        assert!(matches!(
            rx.try_recv(),
            Ok(ActivateRequest::Default { address, .. }) if address == ":1.9"
        ));

        assert!(item.get_menu_right().is_none());
        item.set_menu_items(vec![MenuItem::action(3, "Open")]);
        assert_eq!(*log.borrow(), vec![ItemEvent::MenuRightChanged]);

        item.get_menu_right().unwrap().activate(3);
        assert!(matches!(
            rx.try_recv(),
            Ok(ActivateRequest::MenuItem { submenu_id: 3, .. })
        ));
    }
}
