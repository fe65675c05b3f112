//! The tray: named boxes of icons around a central area, plus a menu icon
//! whose side follows the configuration.
//!
//! Visual layout (horizontal case):
//!
//! ```text
//! main_box
//! ├── box_left   [separator_left] [menu icon when menus = left]
//! ├── box        [LEFT boxes and their separators ...  ... RIGHT boxes]
//! └── box_right  [menu icon when menus = right] [separator_right]
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::config::{ConfigurableId, Configurable, IconConfig, Side, TrayConfig};
use crate::error::{Result, TrayError};
use crate::icon::Icon;
use crate::item::Item;
use crate::signal::{HandlerId, Signals};
use crate::widget::{Node, Orientation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// The tray's visual tree was destroyed.
    Quit,
}

struct TrayBox {
    id: String,
    node: Node,
    separator: Option<Node>,
    side: Side,
    /// Icons in insertion order.
    icons: Vec<(String, Icon)>,
}

struct TrayInner {
    icon_config: Rc<IconConfig>,
    tray_config: Rc<TrayConfig>,
    configurable_id: Cell<Option<ConfigurableId>>,
    size_handler: Cell<Option<HandlerId>>,

    container: RefCell<Option<Node>>,
    boxes: RefCell<Vec<TrayBox>>,
    /// icon id -> id of the box holding it
    icon_index: RefCell<HashMap<String, String>>,

    main_box: Node,
    box_left: Node,
    icon_area: Node,
    box_right: Node,
    separator_left: Node,
    separator_right: Node,
    menu_icon: Icon,

    signals: Signals<TrayEvent>,
}

/// Shared handle to a tray.
#[derive(Clone)]
pub struct Tray(Rc<TrayInner>);

impl std::fmt::Debug for Tray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tray")
            .field("boxes", &self.box_ids())
            .field("icons", &self.0.icon_index.borrow().len())
            .finish()
    }
}

impl Tray {
    /// Build the tray's visual tree, register with `tray_config` and place
    /// the menu icon showing `menu_item`.
    pub fn new(
        icon_config: &Rc<IconConfig>,
        tray_config: &Rc<TrayConfig>,
        menu_item: Rc<dyn Item>,
    ) -> Self {
        let orientation = Orientation::from_vertical(icon_config.vertical());
        let main_box = Node::container(orientation);
        let box_left = Node::container(orientation);
        let icon_area = Node::container(orientation);
        let box_right = Node::container(orientation);

        main_box.pack_start(&box_left);
        main_box.pack_start(&icon_area);
        main_box.pack_start(&box_right);
        for node in [&main_box, &box_left, &icon_area, &box_right] {
            node.show();
        }

        let inner = Rc::new(TrayInner {
            icon_config: Rc::clone(icon_config),
            tray_config: Rc::clone(tray_config),
            configurable_id: Cell::new(None),
            size_handler: Cell::new(None),
            container: RefCell::new(None),
            boxes: RefCell::new(Vec::new()),
            icon_index: RefCell::new(HashMap::new()),
            main_box,
            box_left,
            icon_area,
            box_right,
            separator_left: Node::separator(orientation.cross()),
            separator_right: Node::separator(orientation.cross()),
            menu_icon: Icon::new(menu_item, icon_config),
            signals: Signals::new(),
        });

        let configurable: Weak<dyn Configurable> = Rc::downgrade(&inner) as Weak<dyn Configurable>;
        inner
            .configurable_id
            .set(Some(tray_config.add_configurable(configurable)));

        let weak = Rc::downgrade(&inner);
        inner
            .size_handler
            .set(Some(icon_config.connect_size_changed(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.update_icon_size();
                }
            })));

        inner.update_option_separators();
        inner.update_option_menus();

        let weak = Rc::downgrade(&inner);
        inner.main_box.connect_destroy(move || {
            if let Some(inner) = weak.upgrade() {
                inner.main_box_destroyed();
            }
        });

        info!(name = %tray_config.name(), ?orientation, "tray created");
        Tray(inner)
    }

    pub fn icon_config(&self) -> &Rc<IconConfig> {
        &self.0.icon_config
    }

    pub fn tray_config(&self) -> &Rc<TrayConfig> {
        &self.0.tray_config
    }

    pub fn menu_icon(&self) -> &Icon {
        &self.0.menu_icon
    }

    /// Top-level node attached to the container.
    pub fn main_box(&self) -> &Node {
        &self.0.main_box
    }

    pub fn container(&self) -> Option<Node> {
        self.0.container.borrow().clone()
    }

    /// Add an empty box icons can be added to, with an optional separator
    /// before (left side) or after (right side) it.
    pub fn add_box(&self, box_id: &str, separator: bool, side: Side) -> Result<()> {
        if self.has_box(box_id) {
            return Err(TrayError::DuplicateBox(box_id.to_owned()));
        }

        let orientation = Orientation::from_vertical(self.0.icon_config.vertical());
        let node = Node::container(orientation);
        node.show();

        let separator = separator.then(|| {
            let separator = Node::separator(orientation.cross());
            separator.show();
            match side {
                Side::Left => self.0.icon_area.pack_start(&separator),
                Side::Right => self.0.icon_area.pack_end(&separator),
            }
            separator
        });

        match side {
            Side::Left => self.0.icon_area.pack_start(&node),
            Side::Right => self.0.icon_area.pack_end(&node),
        }

        debug!(box_id, ?side, separator = separator.is_some(), "box added");
        self.0.boxes.borrow_mut().push(TrayBox {
            id: box_id.to_owned(),
            node,
            separator,
            side,
            icons: Vec::new(),
        });
        Ok(())
    }

    /// Remove a box together with its separator and icons.
    pub fn remove_box(&self, box_id: &str) -> Result<()> {
        let removed = {
            let mut boxes = self.0.boxes.borrow_mut();
            let index = boxes
                .iter()
                .position(|b| b.id == box_id)
                .ok_or_else(|| TrayError::UnknownBox(box_id.to_owned()))?;
            boxes.remove(index)
        };
        {
            let mut icon_index = self.0.icon_index.borrow_mut();
            for (icon_id, _) in &removed.icons {
                icon_index.remove(icon_id);
            }
        }

        debug!(box_id, icons = removed.icons.len(), "box removed");
        removed.node.destroy();
        if let Some(separator) = &removed.separator {
            separator.destroy();
        }
        Ok(())
    }

    pub fn has_box(&self, box_id: &str) -> bool {
        self.0.boxes.borrow().iter().any(|b| b.id == box_id)
    }

    /// Box ids in creation order.
    pub fn box_ids(&self) -> Vec<String> {
        self.0.boxes.borrow().iter().map(|b| b.id.clone()).collect()
    }

    pub fn box_side(&self, box_id: &str) -> Option<Side> {
        self.0
            .boxes
            .borrow()
            .iter()
            .find(|b| b.id == box_id)
            .map(|b| b.side)
    }

    pub fn box_node(&self, box_id: &str) -> Option<Node> {
        self.0
            .boxes
            .borrow()
            .iter()
            .find(|b| b.id == box_id)
            .map(|b| b.node.clone())
    }

    /// Remove every icon in a box.
    pub fn clear_box(&self, box_id: &str) -> Result<()> {
        let icon_ids: Vec<String> = self
            .0
            .boxes
            .borrow()
            .iter()
            .find(|b| b.id == box_id)
            .ok_or_else(|| TrayError::UnknownBox(box_id.to_owned()))?
            .icons
            .iter()
            .map(|(id, _)| id.clone())
            .collect();

        for icon_id in icon_ids {
            self.remove_icon(&icon_id);
        }
        Ok(())
    }

    /// Show `item` in box `box_id` under `icon_id`. An icon id may live in
    /// one box at a time.
    pub fn add_icon(&self, box_id: &str, icon_id: &str, item: Rc<dyn Item>) -> Result<Icon> {
        if item.is_destroyed() {
            return Err(TrayError::AlreadyDestroyed);
        }
        if let Some(owner) = self.0.icon_index.borrow().get(icon_id) {
            return Err(TrayError::DuplicateIcon {
                icon_id: icon_id.to_owned(),
                box_id: owner.clone(),
            });
        }
        let box_node = self
            .box_node(box_id)
            .ok_or_else(|| TrayError::UnknownBox(box_id.to_owned()))?;

        let icon = Icon::new(item, &self.0.icon_config);
        box_node.pack_start(icon.node());

        let weak = Rc::downgrade(&self.0);
        let id = icon_id.to_owned();
        icon.node().connect_destroy(move || {
            if let Some(inner) = weak.upgrade() {
                inner.forget_icon(&id);
            }
        });

        if let Some(tray_box) = self.0.boxes.borrow_mut().iter_mut().find(|b| b.id == box_id) {
            tray_box.icons.push((icon_id.to_owned(), icon.clone()));
        }
        self.0
            .icon_index
            .borrow_mut()
            .insert(icon_id.to_owned(), box_id.to_owned());

        debug!(box_id, icon_id, "icon added");
        Ok(icon)
    }

    /// Destroy and forget an icon. Unknown ids are ignored.
    pub fn remove_icon(&self, icon_id: &str) {
        let Some(icon) = self.0.forget_icon(icon_id) else {
            return;
        };
        debug!(icon_id, "icon removed");
        icon.destroy();
    }

    pub fn get_icon(&self, icon_id: &str) -> Option<Rc<dyn Item>> {
        self.get_tray_icon(icon_id).map(|icon| Rc::clone(icon.item()))
    }

    pub fn get_tray_icon(&self, icon_id: &str) -> Option<Icon> {
        let box_id = self.0.icon_index.borrow().get(icon_id)?.clone();
        self.0
            .boxes
            .borrow()
            .iter()
            .find(|b| b.id == box_id)?
            .icons
            .iter()
            .find(|(id, _)| id == icon_id)
            .map(|(_, icon)| icon.clone())
    }

    /// Icon ids, box by box in creation order, then in insertion order.
    ///
    /// The traversal walks a snapshot taken when it is created.
    pub fn icon_ids(&self) -> impl Iterator<Item = String> + use<> {
        let ids: Vec<String> = self
            .0
            .boxes
            .borrow()
            .iter()
            .flat_map(|b| b.icons.iter().map(|(id, _)| id.clone()))
            .collect();
        ids.into_iter()
    }

    /// Items in the same order as [`Tray::icon_ids`].
    pub fn icons(&self) -> impl Iterator<Item = Rc<dyn Item>> + use<> {
        let items: Vec<Rc<dyn Item>> = self
            .0
            .boxes
            .borrow()
            .iter()
            .flat_map(|b| b.icons.iter().map(|(_, icon)| Rc::clone(icon.item())))
            .collect();
        items.into_iter()
    }

    /// Icons with their ids, in the same order as [`Tray::icon_ids`].
    pub fn tray_icons(&self) -> impl Iterator<Item = (String, Icon)> + use<> {
        let icons: Vec<(String, Icon)> = self
            .0
            .boxes
            .borrow()
            .iter()
            .flat_map(|b| b.icons.iter().cloned())
            .collect();
        icons.into_iter()
    }

    /// Move the tray into `container`, leaving the previous one.
    pub fn set_container(&self, container: Option<&Node>) {
        let mut current = self.0.container.borrow_mut();
        if current.as_ref() == container {
            return;
        }
        if let Some(old) = current.take() {
            old.remove(&self.0.main_box);
        }
        if let Some(new) = container {
            new.add(&self.0.main_box);
        }
        *current = container.cloned();
    }

    /// Destroy the container holding the tray, or the tray's own tree if it
    /// has none.
    pub fn destroy(&self) {
        let container = self.0.container.borrow().clone();
        match container {
            Some(container) => container.destroy(),
            None => self.0.main_box.destroy(),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.main_box.is_destroyed()
    }

    /// Drop the menu icon's cached menu. Call this when something affecting
    /// the main menu changed.
    pub fn forget_menus(&self) {
        self.0.menu_icon.forget_menu();
    }

    /// Run `handler` once the tray's visual tree is destroyed.
    pub fn connect_quit<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + 'static,
    {
        self.0.signals.connect(TrayEvent::Quit, handler)
    }

    pub fn update_option_separators(&self) {
        self.0.update_option_separators();
    }

    pub fn update_option_menus(&self) {
        self.0.update_option_menus();
    }
}

impl TrayInner {
    fn forget_icon(&self, icon_id: &str) -> Option<Icon> {
        let box_id = self.icon_index.borrow_mut().remove(icon_id)?;
        let mut boxes = self.boxes.borrow_mut();
        let tray_box = boxes.iter_mut().find(|b| b.id == box_id)?;
        let index = tray_box.icons.iter().position(|(id, _)| id == icon_id)?;
        Some(tray_box.icons.remove(index).1)
    }

    fn update_icon_size(&self) {
        let icons: Vec<Icon> = self
            .boxes
            .borrow()
            .iter()
            .flat_map(|b| b.icons.iter().map(|(_, icon)| icon.clone()))
            .collect();
        debug!(size = self.icon_config.size(), icons = icons.len(), "icon size changed");
        for icon in icons.iter().chain([&self.menu_icon]) {
            icon.update_icon();
        }
    }

    fn main_box_destroyed(&self) {
        if let Some(id) = self.configurable_id.take() {
            self.tray_config.remove_configurable(id);
        }
        if let Some(id) = self.size_handler.take() {
            self.icon_config.disconnect(id);
        }
        self.container.borrow_mut().take();
        info!("tray destroyed");
        self.signals.emit(TrayEvent::Quit);
    }
}

impl Configurable for TrayInner {
    fn update_option_separators(&self) {
        let separators = self.tray_config.separators();

        if separators.has(Side::Left) {
            if !self.box_left.contains(&self.separator_left) {
                self.box_left.pack_start(&self.separator_left);
                self.separator_left.show();
            }
        } else if self.box_left.contains(&self.separator_left) {
            self.box_left.remove(&self.separator_left);
        }

        if separators.has(Side::Right) {
            if !self.box_right.contains(&self.separator_right) {
                self.box_right.pack_end(&self.separator_right);
                self.separator_right.show();
            }
        } else if self.box_right.contains(&self.separator_right) {
            self.box_right.remove(&self.separator_right);
        }
    }

    fn update_option_menus(&self) {
        let (old_box, new_box) = match self.tray_config.menus() {
            Side::Left => (&self.box_right, &self.box_left),
            Side::Right => (&self.box_left, &self.box_right),
        };
        let menu_icon = &self.menu_icon;
        let node = menu_icon.node();

        if old_box.contains(node) {
            old_box.remove(node);
        }
        if !new_box.contains(node) {
            new_box.pack_end(node);
            menu_icon.update_visibility();
            menu_icon.update_icon();
            menu_icon.update_tooltip();
            menu_icon.update_is_drop_target();
            menu_icon.show_all();
        }
    }
}
