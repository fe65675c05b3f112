//! Renders a tray's visual tree with iced.

use std::collections::HashMap;

use iced::alignment::{Horizontal, Vertical};
use iced::mouse::ScrollDelta;
use iced::widget::{
    button, container, horizontal_rule, image, mouse_area, text, tooltip, vertical_rule, Column,
    Row, Stack,
};
use iced::{Border, Element, Length};

use crate::icon::{Icon, IconView, MouseButton, ScrollDirection};
use crate::theme::AppTheme;
use crate::tray::Tray;
use crate::widget::{Node, NodeKind, Orientation};

/// Which icon of a tray a message is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IconTarget {
    /// The tray's own menu icon.
    Menu,
    Icon(String),
}

/// Icon nodes mapped to the target their messages carry.
pub type Targets = HashMap<Node, IconTarget>;

impl IconTarget {
    /// Every icon node of `tray`, including the menu icon.
    pub fn all(tray: &Tray) -> Targets {
        tray.tray_icons()
            .map(|(id, icon)| (icon.node().clone(), IconTarget::Icon(id)))
            .chain([(tray.menu_icon().node().clone(), IconTarget::Menu)])
            .collect()
    }

    pub fn resolve(&self, tray: &Tray) -> Option<Icon> {
        match self {
            IconTarget::Menu => Some(tray.menu_icon().clone()),
            IconTarget::Icon(id) => tray.get_tray_icon(id),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TrayMessage {
    Pressed(IconTarget, MouseButton),
    Scrolled(IconTarget, ScrollDirection),
}

/// Render the tray. `open` is the icon whose menu is showing, if any.
pub fn view_tray<'a>(
    tray: &Tray,
    theme: AppTheme,
    open: Option<&IconTarget>,
) -> Element<'a, TrayMessage> {
    let targets = IconTarget::all(tray);
    view_node(&targets, tray.main_box(), theme, open).unwrap_or_else(|| text("").into())
}

fn view_node<'a>(
    targets: &Targets,
    node: &Node,
    theme: AppTheme,
    open: Option<&IconTarget>,
) -> Option<Element<'a, TrayMessage>> {
    if !node.is_visible() {
        return None;
    }
    match node.kind() {
        NodeKind::Root => {
            let children = node
                .children()
                .iter()
                .filter_map(|child| view_node(targets, child, theme, open))
                .collect::<Vec<_>>();
            Some(Row::from_vec(children).into())
        }
        NodeKind::Box(orientation) => {
            let children = node
                .children()
                .iter()
                .filter_map(|child| view_node(targets, child, theme, open))
                .collect::<Vec<_>>();
            Some(match orientation {
                Orientation::Horizontal => Row::from_vec(children)
                    .spacing(theme.icon_spacing)
                    .align_y(iced::Alignment::Center)
                    .into(),
                Orientation::Vertical => Column::from_vec(children)
                    .spacing(theme.icon_spacing)
                    .align_x(iced::Alignment::Center)
                    .into(),
            })
        }
        NodeKind::Separator(orientation) => {
            let color = theme.border();
            let style = move |_theme: &iced::Theme| iced::widget::rule::Style {
                color,
                width: 1,
                radius: 0.0.into(),
                fill_mode: iced::widget::rule::FillMode::Full,
            };
            Some(match orientation {
                Orientation::Vertical => vertical_rule(1).style(style).into(),
                Orientation::Horizontal => horizontal_rule(1).style(style).into(),
            })
        }
        NodeKind::Icon(view) => {
            let target = targets.get(node)?.clone();
            let is_open = open == Some(&target);
            Some(view_icon(target, &view.borrow(), theme, is_open))
        }
    }
}

fn view_icon<'a>(
    target: IconTarget,
    view: &IconView,
    theme: AppTheme,
    is_open: bool,
) -> Element<'a, TrayMessage> {
    let size = view.size as f32;

    let picture: Element<'a, TrayMessage> = match &view.image_handle {
        Some(handle) => image(handle.clone()).width(size).height(size).into(),
        // Fallback placeholder
        None => container(text("?").size(theme.font_size))
            .width(size)
            .height(size)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into(),
    };

    let picture: Element<'a, TrayMessage> = match &view.emblem_handle {
        Some(emblem) => container(
            Stack::new().push(picture).push(
                container(image(emblem.clone()).width(size / 2.0).height(size / 2.0))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .align_x(Horizontal::Right)
                    .align_y(Vertical::Bottom),
            ),
        )
        .width(size)
        .height(size)
        .into(),
        None => picture,
    };

    let content: Element<'a, TrayMessage> = if view.arrow {
        Row::new()
            .push(picture)
            .push(text("▾").size(theme.font_size * 0.75))
            .align_y(iced::Alignment::Center)
            .into()
    } else {
        picture
    };

    let blinking = view.blinking;
    let btn = button(content)
        .padding(4)
        .style(move |_theme, status| {
            let background = if is_open {
                Some(theme.active().into())
            } else {
                match status {
                    button::Status::Hovered => Some(theme.hover().into()),
                    _ => None,
                }
            };
            button::Style {
                background,
                border: Border {
                    radius: 4.0.into(),
                    width: if blinking { 1.0 } else { 0.0 },
                    color: theme.accent(),
                },
                text_color: theme.text(),
                shadow: Default::default(),
            }
        })
        .on_press(TrayMessage::Pressed(target.clone(), MouseButton::Left));

    let right = target.clone();
    let middle = target.clone();
    let scrolled = target;
    let area = mouse_area(btn)
        .on_right_press(TrayMessage::Pressed(right, MouseButton::Right))
        .on_middle_press(TrayMessage::Pressed(middle, MouseButton::Middle))
        .on_scroll(move |delta| {
            let y = match delta {
                ScrollDelta::Lines { y, .. } | ScrollDelta::Pixels { y, .. } => y,
            };
            let direction = if y > 0.0 {
                ScrollDirection::Up
            } else {
                ScrollDirection::Down
            };
            TrayMessage::Scrolled(scrolled.clone(), direction)
        });

    if view.tooltip.is_empty() {
        return area.into();
    }

    let surface = theme.surface();
    let border = theme.border();
    tooltip(
        area,
        container(text(view.tooltip.clone()).size(theme.font_size)).padding([2, 6]),
        tooltip::Position::Bottom,
    )
    .style(move |_theme| container::Style {
        background: Some(surface.into()),
        border: Border {
            color: border,
            width: 1.0,
            radius: 4.0.into(),
        },
        ..Default::default()
    })
    .into()
}
