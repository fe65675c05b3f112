//! Menu handles returned by items, plus conversion from SNI menus and
//! rendering for popup windows.

use std::fmt;
use std::rc::Rc;

use iced::widget::{button, column, container, row, text, Space};
use iced::{Border, Element, Length};
use system_tray::menu::{MenuItem as SniMenuItem, MenuType, ToggleState, ToggleType, TrayMenu};

use crate::theme::AppTheme;

/// Simplified menu entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    /// Menu item ID (used for activation)
    pub id: i32,
    /// Display label
    pub label: String,
    /// Whether the item is enabled/clickable
    pub enabled: bool,
    /// Whether this is a separator line
    pub is_separator: bool,
    /// Whether this item can be checked
    pub is_checkable: bool,
    /// Whether this item is currently checked
    pub is_checked: bool,
    /// Nested submenu items
    pub submenu: Vec<MenuItem>,
}

impl MenuItem {
    pub fn action(id: i32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            enabled: true,
            is_separator: false,
            is_checkable: false,
            is_checked: false,
            submenu: Vec::new(),
        }
    }

    pub fn separator() -> Self {
        Self {
            is_separator: true,
            enabled: false,
            ..Self::action(-1, "")
        }
    }
}

type ActivateFn = Rc<dyn Fn(i32)>;

/// A menu an item pops up on click.
///
/// Cloning shares the activation callback.
#[derive(Clone, Default)]
pub struct Menu {
    items: Vec<MenuItem>,
    on_activate: Option<ActivateFn>,
}

impl fmt::Debug for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Menu")
            .field("items", &self.items)
            .field("activatable", &self.on_activate.is_some())
            .finish()
    }
}

impl PartialEq for Menu {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Menu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self {
            items,
            on_activate: None,
        }
    }

    /// Run `f` with the item id whenever an entry is chosen.
    pub fn on_activate<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) + 'static,
    {
        self.on_activate = Some(Rc::new(f));
        self
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn activate(&self, id: i32) {
        if let Some(f) = &self.on_activate {
            f(id);
        }
    }
}

/// Convert an SNI TrayMenu to a list of simplified menu items.
pub fn convert_menu(menu: &TrayMenu) -> Vec<MenuItem> {
    menu.submenus.iter().map(convert_menu_item).collect()
}

/// Convert a single SNI menu item to our simplified format.
fn convert_menu_item(item: &SniMenuItem) -> MenuItem {
    let is_separator = matches!(item.menu_type, MenuType::Separator);
    let is_checked = matches!(item.toggle_state, ToggleState::On);
    let is_checkable = !matches!(item.toggle_type, ToggleType::CannotBeToggled);

    // Clean label: remove underscore access key markers (like _File -> File)
    let label = item.label.clone().unwrap_or_default().replace('_', "");

    MenuItem {
        id: item.id,
        label,
        enabled: item.enabled,
        is_separator,
        is_checkable,
        is_checked,
        submenu: item.submenu.iter().map(convert_menu_item).collect(),
    }
}

/// Render a menu for a popup window, colored by `theme`.
pub fn render_menu<'a, M>(
    items: &'a [MenuItem],
    theme: AppTheme,
    on_item_click: impl Fn(i32) -> M + 'a + Clone,
) -> Element<'a, M>
where
    M: Clone + 'a,
{
    let menu_items: Vec<Element<'_, M>> = items
        .iter()
        .filter(|item| !item.label.is_empty() || item.is_separator)
        .map(|item| render_menu_item(item, theme, on_item_click.clone()))
        .collect();

    if menu_items.is_empty() {
        return Space::new(0, 0).into();
    }

    let surface = theme.surface();
    let border = theme.border();
    container(column(menu_items).spacing(0).width(Length::Fill))
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(4)
        .style(move |_theme| container::Style {
            background: Some(surface.into()),
            border: Border {
                color: border,
                width: 1.0,
                radius: 6.0.into(),
            },
            ..Default::default()
        })
        .into()
}

fn render_menu_item<'a, M>(
    item: &'a MenuItem,
    theme: AppTheme,
    on_click: impl Fn(i32) -> M + 'a,
) -> Element<'a, M>
where
    M: Clone + 'a,
{
    if item.is_separator {
        let border = theme.border();
        return container(Space::new(Length::Fill, 1))
            .style(move |_theme| container::Style {
                background: Some(border.into()),
                ..Default::default()
            })
            .width(Length::Fill)
            .padding([4, 0])
            .into();
    }

    let check_mark: Element<'_, M> = if item.is_checkable {
        text(if item.is_checked { "✓" } else { "  " }).size(12).into()
    } else {
        Space::new(0, 0).into()
    };

    let content = row![check_mark, text(&item.label).size(theme.font_size)]
        .spacing(4)
        .align_y(iced::Alignment::Center);

    let enabled = item.enabled;
    let mut btn = button(content)
        .width(Length::Fill)
        .padding([6, 12])
        .style(move |_theme, status| menu_item_style(theme, status, enabled));

    if enabled {
        btn = btn.on_press(on_click(item.id));
    }

    btn.into()
}

fn menu_item_style(theme: AppTheme, status: button::Status, enabled: bool) -> button::Style {
    let background = match status {
        button::Status::Hovered | button::Status::Pressed if enabled => Some(theme.hover().into()),
        _ => None,
    };

    button::Style {
        background,
        text_color: if enabled { theme.text() } else { theme.muted() },
        border: Border::default(),
        shadow: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn activation_reaches_callback_and_clones_share_it() {
        let chosen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&chosen);
        let menu = Menu::new(vec![MenuItem::action(7, "Quit"), MenuItem::separator()])
            .on_activate(move |id| sink.set(Some(id)));

        menu.clone().activate(7);
        assert_eq!(chosen.get(), Some(7));
        assert_eq!(menu.items().len(), 2);
        assert!(menu.items()[1].is_separator);
    }
}
