//! Icon theme service.
//!
//! Resolves icon names to files and broadcasts a parameterless `changed`
//! notification when the theme changes. The host application owns the
//! service and hands an `Rc<IconTheme>` to every item it creates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::image::{FileDecoder, Image, ImageDecoder};
use crate::signal::{HandlerId, Signals};

/// Default icon size for the tray (in pixels).
pub const ICON_SIZE: u32 = 22;

const EXTENSIONS: [&str; 3] = ["png", "xpm", "svg"];
const FALLBACK_SIZES: [u32; 6] = [ICON_SIZE, 24, 32, 48, 22, 16];
const CONTEXTS: [&str; 6] = ["apps", "status", "devices", "places", "actions", "mimetypes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeEvent {
    Changed,
}

/// Backend mapping `(name, size)` to a file.
pub trait IconLookup {
    fn lookup(&self, name: &str, size: u32) -> Option<PathBuf>;

    /// Forget cached results. Called before `changed` is broadcast.
    fn rescan(&self) {}
}

/// Freedesktop-style lookup over a list of icon roots, with caching.
#[derive(Debug)]
pub struct FreedesktopLookup {
    roots: Vec<PathBuf>,
    themes: Vec<String>,
    /// Key: (icon_name, size), Value: resolved path or None
    cache: RefCell<HashMap<(String, u32), Option<PathBuf>>>,
}

impl FreedesktopLookup {
    pub fn new(roots: Vec<PathBuf>, theme: Option<&str>) -> Self {
        let mut themes: Vec<String> = theme.map(str::to_owned).into_iter().collect();
        if !themes.iter().any(|t| t == "hicolor") {
            themes.push("hicolor".to_owned());
        }
        Self {
            roots,
            themes,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The usual XDG icon roots.
    pub fn system(theme: Option<&str>) -> Self {
        let mut roots = Vec::new();
        if let Some(data) = dirs::data_dir() {
            roots.push(data.join("icons"));
        }
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join(".icons"));
        }
        roots.push(PathBuf::from("/usr/local/share/icons"));
        roots.push(PathBuf::from("/usr/share/icons"));
        roots.push(PathBuf::from("/usr/share/pixmaps"));
        Self::new(roots, theme)
    }

    fn find(&self, name: &str, size: u32) -> Option<PathBuf> {
        for root in &self.roots {
            for theme in &self.themes {
                if let Some(path) = find_icon_in_theme(&root.join(theme), name, size) {
                    return Some(path);
                }
            }
            if let Some(path) = find_with_extension(root, name) {
                return Some(path);
            }
        }
        None
    }
}

impl IconLookup for FreedesktopLookup {
    fn lookup(&self, name: &str, size: u32) -> Option<PathBuf> {
        let key = (name.to_owned(), size);
        if let Some(cached) = self.cache.borrow().get(&key) {
            return cached.clone();
        }

        let result = self.find(name, size);
        trace!(name, size, ?result, "icon lookup");
        self.cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn rescan(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Find an icon in a theme directory laid out as `<size>x<size>/<context>/`.
fn find_icon_in_theme(theme_dir: &Path, name: &str, size: u32) -> Option<PathBuf> {
    if !theme_dir.is_dir() {
        return None;
    }
    let sizes = std::iter::once(size).chain(FALLBACK_SIZES);
    for size in sizes {
        let size_dir = theme_dir.join(format!("{size}x{size}"));
        for context in CONTEXTS {
            if let Some(path) = find_with_extension(&size_dir.join(context), name) {
                return Some(path);
            }
        }
    }
    find_with_extension(&theme_dir.join("scalable").join("apps"), name)
}

/// Find an icon inside an application-provided theme path.
///
/// Tries `<size>x<size>/`, the path itself, then a nested hicolor layout.
pub fn find_icon_in_path(theme_path: &Path, name: &str, size: u32) -> Option<PathBuf> {
    let sizes: Vec<u32> = std::iter::once(size).chain(FALLBACK_SIZES).collect();

    for size in &sizes {
        if let Some(path) = find_with_extension(&theme_path.join(format!("{size}x{size}")), name) {
            return Some(path);
        }
    }

    if let Some(path) = find_with_extension(theme_path, name) {
        return Some(path);
    }

    for size in &sizes {
        let dir = theme_path
            .join("hicolor")
            .join(format!("{size}x{size}"))
            .join("apps");
        if let Some(path) = find_with_extension(&dir, name) {
            return Some(path);
        }
    }

    None
}

fn find_with_extension(dir: &Path, name: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

/// Icon theme service shared by all items.
pub struct IconTheme {
    lookup: Box<dyn IconLookup>,
    decoder: Box<dyn ImageDecoder>,
    signals: Signals<ThemeEvent>,
}

impl std::fmt::Debug for IconTheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconTheme")
            .field("subscribers", &self.signals.handler_count(ThemeEvent::Changed))
            .finish()
    }
}

impl IconTheme {
    pub fn new(
        lookup: impl IconLookup + 'static,
        decoder: impl ImageDecoder + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            lookup: Box::new(lookup),
            decoder: Box::new(decoder),
            signals: Signals::new(),
        })
    }

    /// Theme backed by the XDG icon directories and the file decoder.
    pub fn system(theme: Option<&str>) -> Rc<Self> {
        Self::new(FreedesktopLookup::system(theme), FileDecoder)
    }

    /// Resolve `name` at `size` to a file path.
    pub fn lookup(&self, name: &str, size: u32) -> Option<PathBuf> {
        self.lookup.lookup(name, size)
    }

    pub fn decode(&self, path: &Path) -> Result<Image> {
        self.decoder.decode(path)
    }

    pub fn connect_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + 'static,
    {
        self.signals.connect(ThemeEvent::Changed, handler)
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.signals.disconnect(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signals.handler_count(ThemeEvent::Changed)
    }

    /// The system theme changed: drop cached lookups and notify subscribers.
    pub fn changed(&self) {
        debug!(subscribers = self.subscriber_count(), "icon theme changed");
        self.lookup.rescan();
        self.signals.emit(ThemeEvent::Changed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TrayError;
    use std::cell::Cell;

    /// Lookup resolving from a fixed table.
    #[derive(Default)]
    pub(crate) struct TableLookup {
        pub(crate) entries: HashMap<String, PathBuf>,
    }

    impl IconLookup for TableLookup {
        fn lookup(&self, name: &str, _size: u32) -> Option<PathBuf> {
            self.entries.get(name).cloned()
        }
    }

    /// Decoder that yields a 1x1 image whose red channel identifies the file,
    /// and fails for any path ending in `.bad`.
    pub(crate) struct TagDecoder;

    impl ImageDecoder for TagDecoder {
        fn decode(&self, path: &Path) -> Result<Image> {
            if path.extension().is_some_and(|ext| ext == "bad") {
                return Err(TrayError::Decode {
                    path: path.to_path_buf(),
                    reason: "corrupt".into(),
                });
            }
            let tag = path.to_string_lossy().len() as u8;
            Ok(Image::from_rgba(1, 1, vec![tag, 0, 0, 255]).expect("1x1 image"))
        }
    }

    pub(crate) fn table_theme(entries: &[(&str, &str)]) -> Rc<IconTheme> {
        let entries = entries
            .iter()
            .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
            .collect();
        IconTheme::new(TableLookup { entries }, TagDecoder)
    }

    #[test]
    fn changed_reaches_every_subscriber_until_disconnected() {
        let theme = table_theme(&[]);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = theme.connect_changed(move || counter.set(counter.get() + 1));

        theme.changed();
        assert!(theme.disconnect(id));
        theme.changed();
        assert_eq!(hits.get(), 1);
        assert_eq!(theme.subscriber_count(), 0);
    }

    #[test]
    fn freedesktop_lookup_prefers_requested_size_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let theme_dir = dir.path().join("hicolor");
        for size in [16, 48] {
            let apps = theme_dir.join(format!("{size}x{size}")).join("apps");
            std::fs::create_dir_all(&apps).unwrap();
            std::fs::write(apps.join("mail.png"), b"").unwrap();
        }

        let lookup = FreedesktopLookup::new(vec![dir.path().to_path_buf()], None);
        let found = lookup.lookup("mail", 48).unwrap();
        assert!(found.ends_with("48x48/apps/mail.png"));
        assert!(lookup.lookup("absent", 48).is_none());

        std::fs::remove_file(&found).unwrap();
        assert_eq!(lookup.lookup("mail", 48), Some(found.clone()));
        lookup.rescan();
        assert!(lookup.lookup("mail", 48).unwrap().ends_with("16x16/apps/mail.png"));
    }

    #[test]
    fn app_theme_path_falls_back_to_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.png"), b"").unwrap();
        let found = find_icon_in_path(dir.path(), "app", 22).unwrap();
        assert_eq!(found, dir.path().join("app.png"));
        assert!(find_icon_in_path(dir.path(), "other", 22).is_none());
    }
}
