use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use super::{
    DragAction, DragActions, DragContext, DragTarget, Item, ItemBase, ItemEvent, SelectionData,
};
use crate::icon_theme::IconTheme;
use crate::image::Image;
use crate::menu::Menu;

type ClickFn = Rc<dyn Fn(u32) -> bool>;
type DropFn = Rc<dyn Fn(&[String], DragAction)>;

/// An item whose attributes are plain values, set by whoever produced it
/// (a config entry, a launcher, the tray's own menu icon).
///
/// Each setter fires the matching change event when the value changes.
pub struct StaticItem {
    base: ItemBase,
    visible: Cell<bool>,
    blinking: Cell<bool>,
    name: RefCell<String>,
    icon_names: RefCell<Vec<String>>,
    icon_path: RefCell<Option<PathBuf>>,
    icon_pixbuf: RefCell<Option<Image>>,
    emblem: RefCell<Option<Image>>,
    zoom: Cell<f64>,
    arrow: Cell<bool>,
    menu_left: RefCell<Option<Menu>>,
    menu_right: RefCell<Option<Menu>>,
    drag_targets: RefCell<Vec<DragTarget>>,
    drag_actions: Cell<DragActions>,
    drag_payload: RefCell<Vec<u8>>,
    on_click: RefCell<Option<ClickFn>>,
    on_drop: RefCell<Option<DropFn>>,
}

impl std::fmt::Debug for StaticItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticItem")
            .field("name", &self.name.borrow())
            .field("visible", &self.visible.get())
            .field("icon_names", &self.icon_names.borrow())
            .finish()
    }
}

impl StaticItem {
    pub fn new(theme: &Rc<IconTheme>) -> Self {
        Self {
            base: ItemBase::new(theme),
            visible: Cell::new(true),
            blinking: Cell::new(false),
            name: RefCell::new(String::new()),
            icon_names: RefCell::new(Vec::new()),
            icon_path: RefCell::new(None),
            icon_pixbuf: RefCell::new(None),
            emblem: RefCell::new(None),
            zoom: Cell::new(1.0),
            arrow: Cell::new(false),
            menu_left: RefCell::new(None),
            menu_right: RefCell::new(None),
            drag_targets: RefCell::new(Vec::new()),
            drag_actions: Cell::new(DragActions::NONE),
            drag_payload: RefCell::new(Vec::new()),
            on_click: RefCell::new(None),
            on_drop: RefCell::new(None),
        }
    }

    pub fn with_name(self, name: &str) -> Self {
        self.set_name(name);
        self
    }

    pub fn with_icon_names(self, names: &[&str]) -> Self {
        self.set_icon_names(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn set_visible(&self, visible: bool) {
        if self.visible.replace(visible) != visible {
            self.emit(ItemEvent::IsVisibleChanged);
        }
    }

    pub fn set_blinking(&self, blinking: bool) {
        if self.blinking.replace(blinking) != blinking {
            self.emit(ItemEvent::IsBlinkingChanged);
        }
    }

    pub fn set_name(&self, name: &str) {
        if *self.name.borrow() == name {
            return;
        }
        *self.name.borrow_mut() = name.to_owned();
        self.emit(ItemEvent::NameChanged);
    }

    pub fn set_icon_names(&self, names: Vec<String>) {
        if *self.icon_names.borrow() == names {
            return;
        }
        *self.icon_names.borrow_mut() = names;
        self.emit(ItemEvent::IconChanged);
    }

    pub fn set_icon_path(&self, path: Option<PathBuf>) {
        if *self.icon_path.borrow() == path {
            return;
        }
        *self.icon_path.borrow_mut() = path;
        self.emit(ItemEvent::IconChanged);
    }

    pub fn set_icon_pixbuf(&self, pixbuf: Option<Image>) {
        *self.icon_pixbuf.borrow_mut() = pixbuf;
        self.emit(ItemEvent::IconChanged);
    }

    /// The emblem is drawn as part of the icon.
    pub fn set_emblem(&self, emblem: Option<Image>) {
        *self.emblem.borrow_mut() = emblem;
        self.emit(ItemEvent::IconChanged);
    }

    pub fn set_zoom(&self, zoom: f64) {
        if self.zoom.replace(zoom) != zoom {
            self.emit(ItemEvent::ZoomChanged);
        }
    }

    pub fn set_has_arrow(&self, arrow: bool) {
        if self.arrow.replace(arrow) != arrow {
            self.emit(ItemEvent::HasArrowChanged);
        }
    }

    pub fn set_menu_left(&self, menu: Option<Menu>) {
        *self.menu_left.borrow_mut() = menu;
        self.emit(ItemEvent::MenuLeftChanged);
    }

    pub fn set_menu_right(&self, menu: Option<Menu>) {
        *self.menu_right.borrow_mut() = menu;
        self.emit(ItemEvent::MenuRightChanged);
    }

    /// Offer `payload` for each of `targets` when dragged.
    pub fn set_drag_source(&self, targets: Vec<DragTarget>, actions: DragActions, payload: Vec<u8>) {
        *self.drag_targets.borrow_mut() = targets;
        self.drag_actions.set(actions);
        *self.drag_payload.borrow_mut() = payload;
        self.emit(ItemEvent::DragSourceChanged);
    }

    pub fn set_on_click<F>(&self, f: F)
    where
        F: Fn(u32) -> bool + 'static,
    {
        *self.on_click.borrow_mut() = Some(Rc::new(f));
    }

    pub fn set_on_drop<F>(&self, f: F)
    where
        F: Fn(&[String], DragAction) + 'static,
    {
        *self.on_drop.borrow_mut() = Some(Rc::new(f));
    }
}

impl Item for StaticItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn is_blinking(&self) -> bool {
        self.blinking.get()
    }

    fn get_name(&self) -> String {
        self.name.borrow().clone()
    }

    fn get_icon_names(&self) -> Vec<String> {
        self.icon_names.borrow().clone()
    }

    fn get_icon_pixbuf(&self) -> Option<Image> {
        self.icon_pixbuf.borrow().clone()
    }

    fn get_icon_path(&self) -> Option<PathBuf> {
        self.icon_path.borrow().clone()
    }

    fn get_emblem(&self) -> Option<Image> {
        self.emblem.borrow().clone()
    }

    fn get_zoom(&self) -> f64 {
        self.zoom.get()
    }

    fn has_arrow(&self) -> bool {
        self.arrow.get()
    }

    fn get_menu_left(&self) -> Option<Menu> {
        self.menu_left.borrow().clone()
    }

    fn get_menu_right(&self) -> Option<Menu> {
        self.menu_right.borrow().clone()
    }

    // Callbacks run outside the borrow so they may replace themselves.
    fn click(&self, time: u32) -> bool {
        let on_click = self.on_click.borrow().clone();
        on_click.is_some_and(|f| f(time))
    }

    fn uris_dropped(&self, uris: &[String], action: DragAction) {
        let on_drop = self.on_drop.borrow().clone();
        if let Some(f) = on_drop {
            f(uris, action);
        }
    }

    fn is_drop_target(&self) -> bool {
        self.on_drop.borrow().is_some()
    }

    fn get_drag_source_targets(&self) -> Vec<DragTarget> {
        self.drag_targets.borrow().clone()
    }

    fn get_drag_source_actions(&self) -> DragActions {
        self.drag_actions.get()
    }

    fn drag_data_get(
        &self,
        _context: &DragContext,
        data: &mut SelectionData,
        _info: u32,
        _time: u32,
    ) {
        data.set(self.drag_payload.borrow().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon_theme::tests::table_theme;
    use crate::item::tests::record;

    #[test]
    fn setters_fire_only_on_change() {
        let theme = table_theme(&[]);
        let item = StaticItem::new(&theme);
        let log = record(&item);

        item.set_visible(true);
        item.set_visible(false);
        item.set_name("mail");
        item.set_name("mail");
        item.set_zoom(1.0);
        item.set_zoom(2.0);
        item.set_has_arrow(true);
        item.set_blinking(true);

        assert_eq!(
            *log.borrow(),
            vec![
                ItemEvent::IsVisibleChanged,
                ItemEvent::NameChanged,
                ItemEvent::ZoomChanged,
                ItemEvent::HasArrowChanged,
                ItemEvent::IsBlinkingChanged,
            ]
        );
        assert!(!item.is_visible());
        assert_eq!(item.get_name(), "mail");
    }

    #[test]
    fn click_and_drop_run_callbacks() {
        let theme = table_theme(&[]);
        let item = StaticItem::new(&theme);
        assert!(!item.click(1));
        assert!(!item.is_drop_target());

        let dropped = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&dropped);
        item.set_on_click(|time| time > 0);
        item.set_on_drop(move |uris, action| sink.borrow_mut().push((uris.to_vec(), action)));

        assert!(item.click(5));
        assert!(item.is_drop_target());
        item.uris_dropped(&["file:///tmp/a".into()], DragAction::Copy);
        assert_eq!(
            *dropped.borrow(),
            vec![(vec!["file:///tmp/a".to_string()], DragAction::Copy)]
        );
    }

    #[test]
    fn callbacks_can_replace_themselves() {
        let theme = table_theme(&[]);
        let item = Rc::new(StaticItem::new(&theme));

        let weak = Rc::downgrade(&item);
        item.set_on_click(move |_| {
            if let Some(item) = weak.upgrade() {
                item.set_on_click(|_| false);
            }
            true
        });
        assert!(item.click(1));
        assert!(!item.click(2));

        let dropped = Rc::new(Cell::new(0));
        let weak = Rc::downgrade(&item);
        let counter = Rc::clone(&dropped);
        item.set_on_drop(move |_, _| {
            counter.set(counter.get() + 1);
            if let Some(item) = weak.upgrade() {
                item.set_on_drop(|_, _| {});
            }
        });
        item.uris_dropped(&["file:///tmp/a".into()], DragAction::Move);
        item.uris_dropped(&["file:///tmp/b".into()], DragAction::Move);
        assert_eq!(dropped.get(), 1);
        assert!(item.is_drop_target());
    }

    #[test]
    fn drag_source_yields_payload() {
        let theme = table_theme(&[]);
        let item = StaticItem::new(&theme);
        let log = record(&item);
        item.set_drag_source(
            vec![DragTarget::new("text/uri-list", 0)],
            DragActions::COPY | DragActions::LINK,
            b"file:///tmp/a\r\n".to_vec(),
        );

        let context = DragContext {
            actions: item.get_drag_source_actions(),
            action: DragAction::Copy,
        };
        let mut data = SelectionData::new("text/uri-list");
        item.drag_data_get(&context, &mut data, 0, 0);

        assert_eq!(data.data(), b"file:///tmp/a\r\n");
        assert!(context.actions.contains(DragActions::LINK));
        assert_eq!(*log.borrow(), vec![ItemEvent::DragSourceChanged]);
    }
}
