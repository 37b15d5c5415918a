use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{
    AppShortcut, Application, CalendarEvent, Contact, File, Searchable, Website, TYPE_APP,
    TYPE_CALENDAR, TYPE_CONTACT, TYPE_FILE, TYPE_SHORTCUT, TYPE_WEBSITE,
};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode {tag} payload: {source}")]
    Encode {
        tag: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Turns a stored payload back into a live item.
///
/// Returning `None` means the item can no longer be resolved (bad payload,
/// uninstalled app, deleted file) and its record should be pruned.
pub trait SearchableDeserializer: Send + Sync {
    fn deserialize(&self, payload: &str) -> Option<Searchable>;
}

struct JsonDeserializer<T> {
    wrap: fn(T) -> Searchable,
}

impl<T> SearchableDeserializer for JsonDeserializer<T>
where
    T: DeserializeOwned + Send + Sync,
{
    fn deserialize(&self, payload: &str) -> Option<Searchable> {
        serde_json::from_str::<T>(payload).ok().map(self.wrap)
    }
}

/// Accepts a decoded item only if `predicate` still resolves it.
pub struct ResolvingDeserializer<F> {
    inner: Arc<dyn SearchableDeserializer>,
    predicate: F,
}

impl<F> ResolvingDeserializer<F>
where
    F: Fn(&Searchable) -> bool + Send + Sync,
{
    pub fn new(inner: Arc<dyn SearchableDeserializer>, predicate: F) -> Self {
        Self { inner, predicate }
    }
}

impl<F> SearchableDeserializer for ResolvingDeserializer<F>
where
    F: Fn(&Searchable) -> bool + Send + Sync,
{
    fn deserialize(&self, payload: &str) -> Option<Searchable> {
        self.inner
            .deserialize(payload)
            .filter(|item| (self.predicate)(item))
    }
}

#[derive(Clone)]
pub struct SearchableCodec {
    deserializers: HashMap<String, Arc<dyn SearchableDeserializer>>,
}

impl Default for SearchableCodec {
    fn default() -> Self {
        let mut codec = Self {
            deserializers: HashMap::new(),
        };
        codec.register_json::<Application>(TYPE_APP, Searchable::App);
        codec.register_json::<AppShortcut>(TYPE_SHORTCUT, Searchable::Shortcut);
        codec.register_json::<File>(TYPE_FILE, Searchable::File);
        codec.register_json::<Contact>(TYPE_CONTACT, Searchable::Contact);
        codec.register_json::<CalendarEvent>(TYPE_CALENDAR, Searchable::CalendarEvent);
        codec.register_json::<Website>(TYPE_WEBSITE, Searchable::Website);
        codec
    }
}

impl SearchableCodec {
    pub fn register(&mut self, tag: &str, deserializer: Arc<dyn SearchableDeserializer>) {
        self.deserializers.insert(tag.to_string(), deserializer);
    }

    /// Wraps the deserializer registered for `tag` so that decoded items are
    /// additionally checked against `predicate`.
    pub fn require<F>(&mut self, tag: &str, predicate: F)
    where
        F: Fn(&Searchable) -> bool + Send + Sync + 'static,
    {
        if let Some(inner) = self.deserializers.get(tag).cloned() {
            self.register(tag, Arc::new(ResolvingDeserializer::new(inner, predicate)));
        }
    }

    pub fn serialize(&self, item: &Searchable) -> Result<(String, String), CodecError> {
        let tag = item.type_tag();
        let payload = match item {
            Searchable::App(inner) => encode(tag, inner),
            Searchable::Shortcut(inner) => encode(tag, inner),
            Searchable::File(inner) => encode(tag, inner),
            Searchable::Contact(inner) => encode(tag, inner),
            Searchable::CalendarEvent(inner) => encode(tag, inner),
            Searchable::Website(inner) => encode(tag, inner),
        }?;
        Ok((tag.to_string(), payload))
    }

    pub fn deserialize(&self, tag: &str, payload: &str) -> Option<Searchable> {
        self.deserializers.get(tag)?.deserialize(payload)
    }

    fn register_json<T>(&mut self, tag: &str, wrap: fn(T) -> Searchable)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register(tag, Arc::new(JsonDeserializer { wrap }));
    }
}

fn encode<T: Serialize>(tag: &'static str, value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|source| CodecError::Encode { tag, source })
}
