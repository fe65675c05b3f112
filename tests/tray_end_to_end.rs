use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use trayline::config::{TrayOptions, Separators};
use trayline::icon_theme::IconLookup;
use trayline::image::FileDecoder;
use trayline::item::{ClockItem, StaticItem};
use trayline::{IconConfig, IconTheme, Item, ItemEvent, ItemWrapper, Node, Side, Tray, TrayConfig};

/// Looks names up as `<dir>/<name>.png`.
struct DirLookup(PathBuf);

impl IconLookup for DirLookup {
    fn lookup(&self, name: &str, _size: u32) -> Option<PathBuf> {
        let path = self.0.join(format!("{name}.png"));
        path.exists().then_some(path)
    }
}

fn theme_in(dir: &tempfile::TempDir) -> Rc<IconTheme> {
    IconTheme::new(DirLookup(dir.path().to_path_buf()), FileDecoder)
}

fn tray(theme: &Rc<IconTheme>, options: &TrayOptions) -> Tray {
    let menu = Rc::new(StaticItem::new(theme).with_name("Menu"));
    Tray::new(&IconConfig::new(false, 22), &TrayConfig::new(options), menu)
}

#[test]
fn wrapped_clock_lives_and_dies_with_the_tray() {
    let dir = tempfile::tempdir().unwrap();
    let theme = theme_in(&dir);
    let tray = tray(&theme, &TrayOptions::default());
    let root = Node::root();
    tray.set_container(Some(&root));

    tray.add_box("left1", false, Side::Left).unwrap();
    tray.add_box("right1", false, Side::Right).unwrap();

    let clock = ClockItem::new(&theme, Some("%H:%M"));
    let wrapper = Rc::new(ItemWrapper::new(&theme, Box::new(clock)));
    let icon = tray.add_icon("left1", "clock", wrapper.clone()).unwrap();

    assert_eq!(tray.icon_ids().collect::<Vec<_>>(), vec!["clock"]);
    assert_eq!(tray.get_icon("clock").unwrap().get_name().len(), 5);

    let destroyed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&destroyed);
    wrapper
        .signals()
        .connect(ItemEvent::Destroyed, move || counter.set(counter.get() + 1));
    let quit = Rc::new(Cell::new(false));
    let flag = Rc::clone(&quit);
    tray.connect_quit(move || flag.set(true));

    tray.destroy();

    assert!(icon.is_destroyed());
    assert_eq!(destroyed.get(), 1);
    assert!(wrapper.item().is_destroyed());
    assert!(quit.get());
    assert_eq!(theme.subscriber_count(), 0);
}

#[test]
fn theme_change_reloads_icons_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let theme = theme_in(&dir);
    let tray = tray(&theme, &TrayOptions::default());
    tray.add_box("apps", true, Side::Left).unwrap();

    let item = Rc::new(StaticItem::new(&theme).with_icon_names(&["mail"]));
    let icon = tray.add_icon("apps", "mail", item).unwrap();
    assert!(icon.view().image.is_none());

    ::image::RgbaImage::from_pixel(4, 4, ::image::Rgba([0, 128, 255, 255]))
        .save(dir.path().join("mail.png"))
        .unwrap();
    theme.changed();

    let view = icon.view();
    let image = view.image.as_ref().unwrap();
    assert_eq!((image.width(), image.height()), (4, 4));
}

#[test]
fn reapplied_options_leave_the_tree_alone() {
    let dir = tempfile::tempdir().unwrap();
    let theme = theme_in(&dir);
    let options = TrayOptions {
        separators: Separators::BOTH,
        menus: Side::Left,
        ..TrayOptions::default()
    };
    let tray = tray(&theme, &options);

    let revision = tray.main_box().tree_revision();
    tray.tray_config().apply(&options);
    tray.update_option_separators();
    tray.update_option_menus();
    assert_eq!(tray.main_box().tree_revision(), revision);

    tray.tray_config().apply(&TrayOptions {
        menus: Side::Right,
        ..options
    });
    assert_ne!(tray.main_box().tree_revision(), revision);
}
