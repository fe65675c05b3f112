use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::Local;
use iced::event::{self, Event};
use iced::keyboard::{self, key::Named};
use iced::widget::container;
use iced::window::Id;
use iced::{time, Border, Element, Font, Length, Subscription, Task};
use iced_layershell::actions::{IcedNewMenuSettings, MenuDirection};
use iced_layershell::build_pattern::{daemon, MainSettings};
use iced_layershell::reexport::{Anchor, Layer};
use iced_layershell::settings::LayerShellSettings;
use iced_layershell::to_layer_message;
use system_tray::client::ActivateRequest;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trayline::config::{config_subscription, BoxOptions, Config, ConfigMessage};
use trayline::host::{self, HostMessage};
use trayline::item::{ClockItem, SniItem, StaticItem};
use trayline::menu::{self, Menu, MenuItem};
use trayline::theme::AppTheme;
use trayline::view::{self, IconTarget, TrayMessage};
use trayline::{IconConfig, IconTheme, Node, Side, Tray, TrayConfig};

const SNI_BOX: &str = "sni";
const CLOCK_BOX: &str = "clock";
const CLOCK_ICON: &str = "clock";

const MENU_RELOAD: i32 = 1;
const MENU_QUIT: i32 = 2;

pub fn main() -> Result<(), iced_layershell::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trayline=info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting trayline");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            Config::default()
        }
    };

    let thickness = config.icons.size + 14;
    let (anchor, size) = if config.icons.vertical {
        (Anchor::Top | Anchor::Bottom | Anchor::Right, Some((thickness, 0)))
    } else {
        (Anchor::Top | Anchor::Left | Anchor::Right, Some((0, thickness)))
    };

    daemon(
        TrayApp::namespace,
        TrayApp::update,
        TrayApp::view,
        TrayApp::remove_id,
    )
    .subscription(TrayApp::subscription)
    .theme(TrayApp::theme)
    .settings(MainSettings {
        layer_settings: LayerShellSettings {
            anchor,
            layer: Layer::Top,
            exclusive_zone: thickness as i32,
            size,
            margin: (4, 4, 4, 4),
            ..LayerShellSettings::default()
        },
        default_font: Font::with_name("IBM Plex Mono"),
        antialiasing: true,
        ..MainSettings::default()
    })
    .run_with(move || TrayApp::new(config))
}

/// Actions picked from the tray's own menu.
#[derive(Default)]
struct MenuActions {
    reload: Cell<bool>,
    quit: Cell<bool>,
}

struct TrayApp {
    config: Config,
    app_theme: AppTheme,
    icon_theme: Rc<IconTheme>,
    tray_config: Rc<TrayConfig>,
    icon_config: Rc<IconConfig>,
    tray: Tray,
    clock: Rc<ClockItem>,
    sni_items: HashMap<String, Rc<SniItem>>,
    activate_tx: Option<mpsc::Sender<ActivateRequest>>,
    /// Popup window -> the icon it belongs to and the menu it shows
    popups: HashMap<Id, (IconTarget, Menu)>,
    actions: Rc<MenuActions>,
    quit: Rc<Cell<bool>>,
}

#[to_layer_message(multi)]
#[derive(Debug, Clone)]
enum Message {
    Tick(chrono::DateTime<Local>),
    Tray(TrayMessage),
    Host(HostMessage),
    Config(ConfigMessage),
    /// Close a popup window
    ClosePopup(Id),
    /// Menu item was clicked in popup
    PopupMenuItemClicked {
        popup_id: Id,
        menu_id: i32,
    },
    /// Global event for keyboard/mouse handling
    IcedEvent(Event),
}

impl TrayApp {
    fn new(config: Config) -> (Self, Task<Message>) {
        let icon_theme = IconTheme::system(config.icons.theme.as_deref());
        let tray_config = TrayConfig::new(&config.tray);
        let icon_config = IconConfig::from_options(&config.icons);

        let actions = Rc::new(MenuActions::default());
        let main_menu = Rc::new(
            StaticItem::new(&icon_theme)
                .with_name(&config.tray.name)
                .with_icon_names(&["open-menu-symbolic", "application-menu"]),
        );
        main_menu.set_menu_right(Some(main_menu_for(&actions)));

        let tray = Tray::new(&icon_config, &tray_config, main_menu);
        let root = Node::root();
        tray.set_container(Some(&root));

        let quit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&quit);
        tray.connect_quit(move || flag.set(true));

        sync_boxes(&tray, &[], &config.tray.boxes);
        for (id, side) in [(CLOCK_BOX, Side::Right), (SNI_BOX, Side::Right)] {
            if let Err(e) = tray.add_box(id, true, side) {
                warn!(box_id = id, error = %e, "box not created");
            }
        }

        let clock = Rc::new(ClockItem::new(
            &icon_theme,
            config.tray.clock_format.as_deref(),
        ));
        if let Err(e) = tray.add_icon(CLOCK_BOX, CLOCK_ICON, clock.clone()) {
            error!(error = %e, "clock icon not added");
        }

        (
            Self {
                app_theme: AppTheme::from(&config.theme),
                config,
                icon_theme,
                tray_config,
                icon_config,
                tray,
                clock,
                sni_items: HashMap::new(),
                activate_tx: None,
                popups: HashMap::new(),
                actions,
                quit,
            },
            Task::none(),
        )
    }

    fn namespace(&self) -> String {
        String::from("trayline")
    }

    fn theme(&self) -> iced::Theme {
        self.app_theme.into()
    }

    fn remove_id(&mut self, id: Id) {
        self.popups.remove(&id);
    }

    fn open_target(&self) -> Option<&IconTarget> {
        self.popups.values().next().map(|(target, _)| target)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick(now) => {
                self.clock.tick(now);
                Task::none()
            }
            Message::Tray(msg) => self.update_tray(msg),
            Message::Host(msg) => {
                self.update_host(msg);
                Task::none()
            }
            Message::Config(ConfigMessage::Reloaded(config)) => {
                self.apply_config(config);
                Task::none()
            }
            Message::Config(ConfigMessage::Error(e)) => {
                warn!(error = %e, "config reload failed");
                Task::none()
            }
            Message::ClosePopup(id) => {
                self.remove_id(id);
                Task::done(Message::RemoveWindow(id))
            }
            Message::PopupMenuItemClicked { popup_id, menu_id } => {
                if let Some((_, menu)) = self.popups.get(&popup_id) {
                    menu.activate(menu_id);
                }
                let close = Task::done(Message::ClosePopup(popup_id));
                Task::batch([close, self.run_menu_actions()])
            }
            Message::IcedEvent(event) => {
                // Handle ESC key to close any open popup
                if let Event::Keyboard(keyboard::Event::KeyPressed {
                    key: keyboard::Key::Named(Named::Escape),
                    ..
                }) = event
                {
                    if let Some(&id) = self.popups.keys().next() {
                        return Task::done(Message::ClosePopup(id));
                    }
                }
                Task::none()
            }
            _ => Task::none(), // Handle layer shell messages
        }
    }

    fn update_tray(&mut self, message: TrayMessage) -> Task<Message> {
        match message {
            TrayMessage::Pressed(target, button) => {
                let Some(icon) = target.resolve(&self.tray) else {
                    return Task::none();
                };
                // A second click on the same icon closes its menu.
                if let Some(&id) = self
                    .popups
                    .iter()
                    .find(|(_, (open, _))| *open == target)
                    .map(|(id, _)| id)
                {
                    return Task::done(Message::ClosePopup(id));
                }
                match icon.activate(button, 0) {
                    Some(menu) if !menu.is_empty() => self.open_popup(target, menu),
                    _ => Task::none(),
                }
            }
            TrayMessage::Scrolled(target, direction) => {
                if let Some(icon) = target.resolve(&self.tray) {
                    icon.scroll(direction, 0);
                }
                Task::none()
            }
        }
    }

    fn open_popup(&mut self, target: IconTarget, menu: Menu) -> Task<Message> {
        let item_count = menu.items().len();
        let height = (item_count as u32 * 28) + 16;

        let id = Id::unique();
        self.popups.insert(id, (target, menu));

        Task::done(Message::NewMenu {
            settings: IcedNewMenuSettings {
                size: (200, height.min(400)),
                direction: MenuDirection::Down,
            },
            id,
        })
    }

    fn run_menu_actions(&mut self) -> Task<Message> {
        if self.actions.reload.take() {
            match Config::load() {
                Ok(config) => self.apply_config(config),
                Err(e) => warn!(error = %e, "config reload failed"),
            }
        }
        if self.actions.quit.take() {
            self.tray.destroy();
        }
        if self.quit.get() {
            info!("quitting");
            return iced::exit();
        }
        Task::none()
    }

    fn update_host(&mut self, message: HostMessage) {
        match message {
            HostMessage::ActivateChannelReady(tx) => {
                self.activate_tx = Some(tx);
            }
            HostMessage::ItemAdded { address, state } => {
                if let Some(item) = self.sni_items.get(&address) {
                    item.replace(state);
                    return;
                }
                let item = Rc::new(SniItem::new(
                    &self.icon_theme,
                    address.clone(),
                    state,
                    self.activate_tx.clone(),
                ));
                match self.tray.add_icon(SNI_BOX, &address, item.clone()) {
                    Ok(_) => {
                        self.sni_items.insert(address, item);
                    }
                    Err(e) => warn!(%address, error = %e, "sni item not shown"),
                }
            }
            HostMessage::ItemUpdated { address, state } => {
                if let Some(item) = self.sni_items.get(&address) {
                    item.replace(state);
                }
            }
            HostMessage::MenuUpdated { address, items } => {
                if let Some(item) = self.sni_items.get(&address) {
                    item.set_menu_items(items);
                }
            }
            HostMessage::ItemRemoved(address) => {
                self.sni_items.remove(&address);
                self.tray.remove_icon(&address);
                self.popups
                    .retain(|_, (target, _)| *target != IconTarget::Icon(address.clone()));
            }
        }
    }

    fn apply_config(&mut self, config: Config) {
        info!("applying configuration");
        self.tray_config.apply(&config.tray);
        self.icon_config.set_size(config.icons.size);
        sync_boxes(&self.tray, &self.config.tray.boxes, &config.tray.boxes);
        if config.icons.theme != self.config.icons.theme {
            warn!("icon theme changes take effect after a restart");
        }
        self.icon_theme.changed();
        self.tray.forget_menus();
        self.app_theme = AppTheme::from(&config.theme);
        self.config = config;
    }

    fn view(&self, id: Id) -> Element<'_, Message> {
        if self.popups.contains_key(&id) {
            self.view_popup(id)
        } else {
            self.view_main()
        }
    }

    fn view_main(&self) -> Element<'_, Message> {
        let content = view::view_tray(&self.tray, self.app_theme, self.open_target())
            .map(Message::Tray);

        let background = self.app_theme.background();
        let accent = self.app_theme.accent();

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_y(Length::Fill)
            .padding([0, 8])
            .style(move |_theme: &iced::Theme| container::Style {
                background: Some(background.into()),
                border: Border {
                    radius: 15.0.into(),
                    width: 1.0,
                    color: accent,
                },
                ..container::Style::default()
            })
            .into()
    }

    fn view_popup(&self, popup_id: Id) -> Element<'_, Message> {
        match self.popups.get(&popup_id) {
            Some((_, menu)) => menu::render_menu(menu.items(), self.app_theme, move |menu_id| {
                Message::PopupMenuItemClicked { popup_id, menu_id }
            }),
            None => container(iced::widget::text("Menu not found"))
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch(vec![
            time::every(std::time::Duration::from_millis(1000)).map(|_| Message::Tick(Local::now())),
            host::subscription().map(Message::Host),
            config_subscription().map(Message::Config),
            event::listen().map(Message::IcedEvent),
        ])
    }
}

/// The tray's own menu.
fn main_menu_for(actions: &Rc<MenuActions>) -> Menu {
    let actions = Rc::clone(actions);
    Menu::new(vec![
        MenuItem::action(MENU_RELOAD, "Reload configuration"),
        MenuItem::separator(),
        MenuItem::action(MENU_QUIT, "Quit"),
    ])
    .on_activate(move |id| match id {
        MENU_RELOAD => actions.reload.set(true),
        MENU_QUIT => actions.quit.set(true),
        _ => {}
    })
}

/// Create configured boxes that are new and drop the ones no longer listed.
fn sync_boxes(tray: &Tray, old: &[BoxOptions], new: &[BoxOptions]) {
    for stale in old.iter().filter(|b| !new.contains(b)) {
        if let Err(e) = tray.remove_box(&stale.id) {
            warn!(box_id = %stale.id, error = %e, "box not removed");
        }
    }
    for added in new.iter().filter(|b| !old.contains(b)) {
        if let Err(e) = tray.add_box(&added.id, added.separator, added.side) {
            warn!(box_id = %added.id, error = %e, "box not created");
        }
    }
}
