//! Tray icons: the visual node bound to an item.
//!
//! An [`Icon`] listens to its item's change events and refreshes the cached
//! [`IconView`] the renderer draws. Destroying the icon's node destroys the
//! item, so an icon cleans itself up when its box or tray goes away.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use iced::widget::image::Handle;
use tracing::{debug, trace};

use crate::config::IconConfig;
use crate::image::Image;
use crate::item::{DragAction, Item, ItemEvent};
use crate::menu::Menu;
use crate::signal::HandlerId;
use crate::widget::{Node, NodeKind};

/// What the renderer needs to draw an icon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IconView {
    pub tooltip: String,
    pub image: Option<Image>,
    pub emblem: Option<Image>,
    /// Built once per icon change so the renderer keeps its textures.
    pub image_handle: Option<Handle>,
    pub emblem_handle: Option<Handle>,
    /// Effective pixel size: icon size times zoom.
    pub size: u32,
    pub blinking: bool,
    pub arrow: bool,
    pub drop_target: bool,
    pub drag_source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Default)]
struct MenuCache {
    left: Option<Option<Menu>>,
    right: Option<Option<Menu>>,
}

struct IconInner {
    item: Rc<dyn Item>,
    node: Node,
    view: Rc<RefCell<IconView>>,
    icon_config: Rc<IconConfig>,
    item_handlers: RefCell<Vec<HandlerId>>,
    menus: RefCell<MenuCache>,
}

/// Shared handle to a tray icon.
#[derive(Clone)]
pub struct Icon(Rc<IconInner>);

impl std::fmt::Debug for Icon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Icon")
            .field("view", &*self.0.view.borrow())
            .field("visible", &self.0.node.is_visible())
            .finish()
    }
}

impl PartialEq for Icon {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Icon {
    pub fn new(item: Rc<dyn Item>, icon_config: &Rc<IconConfig>) -> Self {
        let view = Rc::new(RefCell::new(IconView::default()));
        let node = Node::new(NodeKind::Icon(Rc::clone(&view)));
        let icon = Icon(Rc::new(IconInner {
            item,
            node,
            view,
            icon_config: Rc::clone(icon_config),
            item_handlers: RefCell::new(Vec::new()),
            menus: RefCell::new(MenuCache::default()),
        }));

        icon.bind();
        icon.update_visibility();
        icon.update_icon();
        icon.update_tooltip();
        icon.update_decorations();
        icon.update_is_drop_target();
        icon.update_drag_source();
        icon
    }

    fn bind(&self) {
        let item = &self.0.item;
        let mut handlers = Vec::new();
        for event in ItemEvent::CHANGES.into_iter().chain([ItemEvent::Destroyed]) {
            let weak = Rc::downgrade(&self.0);
            handlers.push(item.signals().connect(event, move || {
                if let Some(inner) = weak.upgrade() {
                    Icon(inner).item_event(event);
                }
            }));
        }
        *self.0.item_handlers.borrow_mut() = handlers;

        let weak: Weak<IconInner> = Rc::downgrade(&self.0);
        self.0.node.connect_destroy(move || {
            if let Some(inner) = weak.upgrade() {
                Icon(inner).node_destroyed();
            }
        });
    }

    fn item_event(&self, event: ItemEvent) {
        trace!(event = event.name(), "icon refresh");
        match event {
            ItemEvent::IsVisibleChanged => self.update_visibility(),
            ItemEvent::NameChanged => self.update_tooltip(),
            ItemEvent::IconChanged | ItemEvent::ZoomChanged => self.update_icon(),
            ItemEvent::IsBlinkingChanged | ItemEvent::HasArrowChanged => {
                self.update_decorations()
            }
            ItemEvent::MenuLeftChanged | ItemEvent::MenuRightChanged => self.forget_menu(),
            ItemEvent::DragSourceChanged => self.update_drag_source(),
            // The item went away on its own; take the node with it.
            ItemEvent::Destroyed => self.0.node.destroy(),
        }
    }

    fn node_destroyed(&self) {
        for handler in self.0.item_handlers.take() {
            self.0.item.signals().disconnect(handler);
        }
        if self.0.item.is_destroyed() {
            return;
        }
        if let Err(e) = self.0.item.destroy() {
            debug!(error = %e, "item destroyed twice");
        }
    }

    pub fn item(&self) -> &Rc<dyn Item> {
        &self.0.item
    }

    pub fn node(&self) -> &Node {
        &self.0.node
    }

    pub fn view(&self) -> Ref<'_, IconView> {
        self.0.view.borrow()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.node.is_destroyed()
    }

    /// Destroy the node, and with it the item.
    pub fn destroy(&self) {
        self.0.node.destroy();
    }

    pub fn show_all(&self) {
        self.0.node.show_all();
        self.update_visibility();
    }

    pub fn update_visibility(&self) {
        if self.0.item.is_visible() {
            self.0.node.show();
        } else {
            self.0.node.hide();
        }
    }

    pub fn update_icon(&self) {
        let zoom = self.0.item.get_zoom().max(0.0);
        let size = ((self.0.icon_config.size() as f64 * zoom).round() as u32).max(1);
        let image = self.0.item.get_icon(size);
        let emblem = self.0.item.get_emblem();

        let mut view = self.0.view.borrow_mut();
        view.size = size;
        view.image_handle = image.as_ref().map(Image::to_handle);
        view.emblem_handle = emblem.as_ref().map(Image::to_handle);
        view.image = image;
        view.emblem = emblem;
    }

    pub fn update_tooltip(&self) {
        let name = self.0.item.get_name();
        self.0.view.borrow_mut().tooltip = name;
    }

    pub fn update_decorations(&self) {
        let blinking = self.0.item.is_blinking();
        let arrow = self.0.item.has_arrow();
        let mut view = self.0.view.borrow_mut();
        view.blinking = blinking;
        view.arrow = arrow;
    }

    pub fn update_is_drop_target(&self) {
        let drop_target = self.0.item.is_drop_target();
        self.0.view.borrow_mut().drop_target = drop_target;
    }

    pub fn update_drag_source(&self) {
        let drag_source = !self.0.item.get_drag_source_targets().is_empty()
            && !self.0.item.get_drag_source_actions().is_empty();
        self.0.view.borrow_mut().drag_source = drag_source;
    }

    /// Drop the cached menus; they are rebuilt from the item on next use.
    pub fn forget_menu(&self) {
        *self.0.menus.borrow_mut() = MenuCache::default();
    }

    pub fn menu_left(&self) -> Option<Menu> {
        if let Some(cached) = &self.0.menus.borrow().left {
            return cached.clone();
        }
        let menu = self.0.item.get_menu_left();
        self.0.menus.borrow_mut().left = Some(menu.clone());
        menu
    }

    pub fn menu_right(&self) -> Option<Menu> {
        if let Some(cached) = &self.0.menus.borrow().right {
            return cached.clone();
        }
        let menu = self.0.item.get_menu_right();
        self.0.menus.borrow_mut().right = Some(menu.clone());
        menu
    }

    /// A button was released on the icon. Returns the menu to pop up, if
    /// any.
    pub fn activate(&self, button: MouseButton, time: u32) -> Option<Menu> {
        match button {
            MouseButton::Left => {
                if self.0.item.click(time) {
                    None
                } else {
                    self.menu_left()
                }
            }
            MouseButton::Right => self.menu_right(),
            MouseButton::Middle => None,
        }
    }

    pub fn scroll(&self, direction: ScrollDirection, time: u32) -> bool {
        match direction {
            ScrollDirection::Up => self.0.item.mouse_wheel_up(time),
            ScrollDirection::Down => self.0.item.mouse_wheel_down(time),
        }
    }

    /// Returns `true` if it should be called again after a second.
    pub fn spring_open(&self, time: u32) -> bool {
        self.0.item.spring_open(time)
    }

    /// Hand dropped URIs to the item. Ignored unless it is a drop target.
    pub fn drop_uris(&self, uris: &[String], action: DragAction) -> bool {
        if !self.0.item.is_drop_target() {
            return false;
        }
        self.0.item.uris_dropped(uris, action);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon_theme::tests::table_theme;
    use crate::item::{ItemWrapper, StaticItem};
    use crate::menu::MenuItem;
    use std::cell::Cell;

    fn icon_for(item: Rc<StaticItem>) -> (Icon, Rc<StaticItem>) {
        let config = IconConfig::new(false, 22);
        let icon = Icon::new(item.clone() as Rc<dyn Item>, &config);
        (icon, item)
    }

    #[test]
    fn view_follows_item_changes() {
        let theme = table_theme(&[("mail", "/icons/mail.png")]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme).with_name("Mail")));
        assert_eq!(icon.view().tooltip, "Mail");
        assert!(icon.node().is_visible());
        assert!(icon.view().image.is_none());

        item.set_name("Inbox (3)");
        item.set_visible(false);
        item.set_icon_names(vec!["mail".into()]);
        item.set_zoom(2.0);
        item.set_blinking(true);

        let view = icon.view();
        assert_eq!(view.tooltip, "Inbox (3)");
        assert!(view.image.is_some());
        assert_eq!(view.size, 44);
        assert!(view.blinking);
        drop(view);
        assert!(!icon.node().is_visible());
    }

    #[test]
    fn image_handles_change_only_with_the_icon() {
        let theme = table_theme(&[("mail", "/icons/mail.png"), ("mail-new", "/icons/new.png")]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme).with_icon_names(&["mail"])));
        let first = icon.view().image_handle.as_ref().map(Handle::id);
        assert!(first.is_some());
        assert!(icon.view().emblem_handle.is_none());

        item.set_name("Mail");
        item.set_blinking(true);
        assert_eq!(icon.view().image_handle.as_ref().map(Handle::id), first);

        item.set_icon_names(vec!["mail-new".into()]);
        let second = icon.view().image_handle.as_ref().map(Handle::id);
        assert!(second.is_some());
        assert_ne!(second, first);
    }

    #[test]
    fn menus_are_cached_until_forgotten() {
        let theme = table_theme(&[]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme)));
        item.set_menu_right(Some(Menu::new(vec![MenuItem::action(1, "One")])));
        assert_eq!(icon.menu_right().unwrap().items().len(), 1);

        // The change event already dropped the cache.
        item.set_menu_right(Some(Menu::new(vec![
            MenuItem::action(1, "One"),
            MenuItem::action(2, "Two"),
        ])));
        assert_eq!(icon.menu_right().unwrap().items().len(), 2);
    }

    #[test]
    fn left_click_prefers_action_over_menu() {
        let theme = table_theme(&[]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme)));
        item.set_menu_left(Some(Menu::new(vec![MenuItem::action(1, "Open")])));
        assert!(icon.activate(MouseButton::Left, 0).is_some());

        let clicked = Rc::new(Cell::new(false));
        let flag = Rc::clone(&clicked);
        item.set_on_click(move |_| {
            flag.set(true);
            true
        });
        assert!(icon.activate(MouseButton::Left, 0).is_none());
        assert!(clicked.get());
    }

    #[test]
    fn drops_reach_only_drop_targets() {
        let theme = table_theme(&[]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme)));
        let uris = vec!["file:///tmp/a.txt".to_string()];
        assert!(!icon.drop_uris(&uris, DragAction::Copy));

        let dropped = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&dropped);
        item.set_on_drop(move |uris, _| sink.borrow_mut().extend_from_slice(uris));
        icon.update_is_drop_target();
        assert!(icon.view().drop_target);
        assert!(icon.drop_uris(&uris, DragAction::Move));
        assert_eq!(*dropped.borrow(), uris);
    }

    #[test]
    fn scroll_and_middle_click_go_to_the_item() {
        let theme = table_theme(&[]);
        let (icon, _item) = icon_for(Rc::new(StaticItem::new(&theme)));
        assert!(!icon.scroll(ScrollDirection::Up, 0));
        assert!(!icon.spring_open(0));
        assert!(icon.activate(MouseButton::Middle, 0).is_none());
    }

    #[test]
    fn destroying_the_node_destroys_the_item_once() {
        let theme = table_theme(&[]);
        let inner = StaticItem::new(&theme);
        let wrapper = Rc::new(ItemWrapper::new(&theme, Box::new(inner)));
        let config = IconConfig::new(false, 22);
        let icon = Icon::new(wrapper.clone() as Rc<dyn Item>, &config);

        let destroyed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&destroyed);
        wrapper
            .signals()
            .connect(ItemEvent::Destroyed, move || counter.set(counter.get() + 1));

        icon.destroy();
        icon.destroy();
        assert_eq!(destroyed.get(), 1);
        assert!(wrapper.item().is_destroyed());
        assert_eq!(theme.subscriber_count(), 0);
    }

    #[test]
    fn item_destroyed_elsewhere_takes_the_node_down() {
        let theme = table_theme(&[]);
        let (icon, item) = icon_for(Rc::new(StaticItem::new(&theme)));
        let parent = Node::container(crate::widget::Orientation::Horizontal);
        parent.pack_start(icon.node());

        item.destroy().unwrap();
        assert!(icon.is_destroyed());
        assert!(parent.children().is_empty());
    }
}
