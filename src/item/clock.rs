use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Local, TimeZone};

use super::{Item, ItemBase, ItemEvent};
use crate::icon_theme::IconTheme;

pub const DEFAULT_FORMAT: &str = "%H:%M:%S";

/// An item whose name is the current local time.
#[derive(Debug)]
pub struct ClockItem {
    base: ItemBase,
    format: String,
    text: RefCell<String>,
}

impl ClockItem {
    pub fn new(theme: &Rc<IconTheme>, format: Option<&str>) -> Self {
        let format = format.unwrap_or(DEFAULT_FORMAT).to_owned();
        let text = Local::now().format(&format).to_string();
        Self {
            base: ItemBase::new(theme),
            format,
            text: RefCell::new(text),
        }
    }

    /// Advance to `now`. Fires `name-changed` only if the text changed.
    pub fn tick<Tz: TimeZone>(&self, now: DateTime<Tz>)
    where
        Tz::Offset: std::fmt::Display,
    {
        let text = now.format(&self.format).to_string();
        if *self.text.borrow() == text {
            return;
        }
        *self.text.borrow_mut() = text;
        self.emit(ItemEvent::NameChanged);
    }
}

impl Item for ClockItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn get_name(&self) -> String {
        self.text.borrow().clone()
    }

    fn get_icon_names(&self) -> Vec<String> {
        vec!["preferences-system-time".into(), "clock".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon_theme::tests::table_theme;
    use crate::item::tests::record;
    use chrono::Utc;

    #[test]
    fn tick_fires_when_the_text_changes() {
        let theme = table_theme(&[]);
        let clock = ClockItem::new(&theme, Some("%H:%M"));
        let log = record(&clock);

        let noon = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        clock.tick(noon);
        assert_eq!(clock.get_name(), "12:00");

        let log_len = log.borrow().len();
        clock.tick(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap());
        assert_eq!(log.borrow().len(), log_len);

        clock.tick(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
        assert_eq!(clock.get_name(), "12:01");
        assert_eq!(log.borrow().last(), Some(&ItemEvent::NameChanged));
    }
}
