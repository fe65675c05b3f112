use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use super::{
    DragAction, DragActions, DragContext, DragTarget, Item, ItemBase, ItemEvent, SelectionData,
};
use crate::error::Result;
use crate::icon_theme::IconTheme;
use crate::image::Image;
use crate::menu::Menu;
use crate::signal::HandlerId;

/// Decorator presenting another item's full contract under its own
/// identity.
///
/// Every query delegates to the wrapped item, and each of its nine change
/// events is re-emitted by the wrapper. The wrapped item is owned for the
/// wrapper's whole lifetime and destroyed together with it.
pub struct ItemWrapper {
    base: ItemBase,
    item: Box<dyn Item>,
    handlers: Vec<HandlerId>,
}

impl std::fmt::Debug for ItemWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemWrapper")
            .field("base", &self.base)
            .field("item", &self.item.get_name())
            .finish()
    }
}

impl ItemWrapper {
    pub fn new(theme: &Rc<IconTheme>, item: Box<dyn Item>) -> Self {
        let base = ItemBase::new(theme);
        let handlers = ItemEvent::CHANGES
            .into_iter()
            .map(|event| {
                let own = base.downgrade();
                item.signals().connect(event, move || {
                    if let Some(own) = own.upgrade() {
                        own.emit(event);
                    }
                })
            })
            .collect();

        Self {
            base,
            item,
            handlers,
        }
    }

    /// The wrapped item, for identity checks.
    pub fn item(&self) -> &dyn Item {
        self.item.as_ref()
    }

    /// Whether this wrapper wraps exactly `item`.
    pub fn wraps(&self, item: &dyn Item) -> bool {
        std::ptr::addr_eq(self.item.as_ref(), item)
    }
}

impl Item for ItemWrapper {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn is_visible(&self) -> bool {
        self.item.is_visible()
    }

    fn is_blinking(&self) -> bool {
        self.item.is_blinking()
    }

    fn get_name(&self) -> String {
        self.item.get_name()
    }

    fn get_icon(&self, size: u32) -> Option<Image> {
        self.item.get_icon(size)
    }

    fn get_icon_names(&self) -> Vec<String> {
        self.item.get_icon_names()
    }

    fn get_icon_pixbuf(&self) -> Option<Image> {
        self.item.get_icon_pixbuf()
    }

    fn get_icon_path(&self) -> Option<PathBuf> {
        self.item.get_icon_path()
    }

    fn get_emblem(&self) -> Option<Image> {
        self.item.get_emblem()
    }

    fn get_zoom(&self) -> f64 {
        self.item.get_zoom()
    }

    fn has_arrow(&self) -> bool {
        self.item.has_arrow()
    }

    fn get_menu_left(&self) -> Option<Menu> {
        self.item.get_menu_left()
    }

    fn get_menu_right(&self) -> Option<Menu> {
        self.item.get_menu_right()
    }

    fn mouse_wheel_up(&self, time: u32) -> bool {
        self.item.mouse_wheel_up(time)
    }

    fn mouse_wheel_down(&self, time: u32) -> bool {
        self.item.mouse_wheel_down(time)
    }

    fn spring_open(&self, time: u32) -> bool {
        self.item.spring_open(time)
    }

    fn click(&self, time: u32) -> bool {
        self.item.click(time)
    }

    fn uris_dropped(&self, uris: &[String], action: DragAction) {
        self.item.uris_dropped(uris, action);
    }

    fn is_drop_target(&self) -> bool {
        self.item.is_drop_target()
    }

    fn get_drag_source_targets(&self) -> Vec<DragTarget> {
        self.item.get_drag_source_targets()
    }

    fn get_drag_source_actions(&self) -> DragActions {
        self.item.get_drag_source_actions()
    }

    fn drag_data_get(
        &self,
        context: &DragContext,
        data: &mut SelectionData,
        info: u32,
        time: u32,
    ) {
        self.item.drag_data_get(context, data, info, time);
    }

    /// Destroy the wrapped item, then the wrapper itself.
    fn destroy(&self) -> Result<()> {
        if self.base.is_destroyed() {
            return Err(crate::error::TrayError::AlreadyDestroyed);
        }
        if let Err(e) = self.item.destroy() {
            debug!(error = %e, "wrapped item was destroyed on its own");
        }
        for handler in &self.handlers {
            self.item.signals().disconnect(*handler);
        }
        self.base.destroy()
    }
}
