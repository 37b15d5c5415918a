use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    pub package: String,
    pub activity: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppShortcut {
    pub package: String,
    pub shortcut_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub label: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub contact_id: i64,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub event_id: i64,
    pub title: String,
    pub start_epoch_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Website {
    pub url: String,
    pub label: String,
}

/// A launchable thing that can be saved to the favorites table.
///
/// Every variant carries a stable type tag. The tag is stored next to the
/// serialized payload so the deserializer is chosen by column value instead
/// of by inspecting the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Searchable {
    #[serde(rename = "app")]
    App(Application),
    #[serde(rename = "shortcut")]
    Shortcut(AppShortcut),
    #[serde(rename = "file")]
    File(File),
    #[serde(rename = "contact")]
    Contact(Contact),
    #[serde(rename = "calendar")]
    CalendarEvent(CalendarEvent),
    #[serde(rename = "website")]
    Website(Website),
}

pub const TYPE_APP: &str = "app";
pub const TYPE_SHORTCUT: &str = "shortcut";
pub const TYPE_FILE: &str = "file";
pub const TYPE_CONTACT: &str = "contact";
pub const TYPE_CALENDAR: &str = "calendar";
pub const TYPE_WEBSITE: &str = "website";

impl Searchable {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::App(_) => TYPE_APP,
            Self::Shortcut(_) => TYPE_SHORTCUT,
            Self::File(_) => TYPE_FILE,
            Self::Contact(_) => TYPE_CONTACT,
            Self::CalendarEvent(_) => TYPE_CALENDAR,
            Self::Website(_) => TYPE_WEBSITE,
        }
    }

    pub fn key(&self) -> String {
        let identity = match self {
            Self::App(app) => format!("{}:{}", app.package, app.activity),
            Self::Shortcut(shortcut) => format!("{}/{}", shortcut.package, shortcut.shortcut_id),
            Self::File(file) => file.path.clone(),
            Self::Contact(contact) => contact.contact_id.to_string(),
            Self::CalendarEvent(event) => event.event_id.to_string(),
            Self::Website(site) => site.url.clone(),
        };
        format!("{}://{identity}", self.type_tag())
    }

    pub fn label(&self) -> &str {
        match self {
            Self::App(app) => &app.label,
            Self::Shortcut(shortcut) => &shortcut.label,
            Self::File(file) => &file.label,
            Self::Contact(contact) => &contact.display_name,
            Self::CalendarEvent(event) => &event.title,
            Self::Website(site) => &site.label,
        }
    }

    pub fn app(package: &str, activity: &str, label: &str) -> Self {
        Self::App(Application {
            package: package.to_string(),
            activity: activity.to_string(),
            label: label.to_string(),
        })
    }

    pub fn file(path: &str, label: &str) -> Self {
        Self::File(File {
            path: path.to_string(),
            label: label.to_string(),
            mime_type: None,
        })
    }

    pub fn website(url: &str, label: &str) -> Self {
        Self::Website(Website {
            url: url.to_string(),
            label: label.to_string(),
        })
    }
}

/// One row of the favorites table.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord {
    pub key: String,
    pub item_type: String,
    pub serialized: String,
    pub launch_count: u32,
    pub pin_position: u32,
    pub hidden: bool,
    pub weight: f64,
}

impl FavoriteRecord {
    pub fn new(key: &str, item_type: &str, serialized: &str) -> Self {
        Self {
            key: key.to_string(),
            item_type: item_type.to_string(),
            serialized: serialized.to_string(),
            launch_count: 0,
            pin_position: 0,
            hidden: false,
            weight: 0.0,
        }
    }

    pub fn with_usage(mut self, launch_count: u32, weight: f64) -> Self {
        self.launch_count = launch_count;
        self.weight = weight;
        self
    }

    pub fn with_pin(mut self, pin_position: u32) -> Self {
        self.pin_position = pin_position;
        self.hidden = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self.pin_position = 0;
        self
    }

    pub fn is_manually_sorted(&self) -> bool {
        self.pin_position > 1
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_position > 0
    }
}
