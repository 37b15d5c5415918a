use serde::{Deserialize, Serialize};

use crate::model::Searchable;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoritesRequest {
    pub columns: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRequest {
    pub item: Searchable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateFavoritesRequest {
    pub manually_sorted: Vec<Searchable>,
    pub automatically_sorted: Vec<Searchable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteDto {
    pub key: String,
    pub kind: String,
    pub label: String,
    pub item: Searchable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoritesResponse {
    pub items: Vec<FavoriteDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationResponse {
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagResponse {
    pub value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CoreRequest {
    Favorites(FavoritesRequest),
    Pin(ItemRequest),
    Unpin(ItemRequest),
    Hide(ItemRequest),
    Unhide(ItemRequest),
    Launch(ItemRequest),
    Save(ItemRequest),
    Remove(ItemRequest),
    RemoveFromFavorites(ItemRequest),
    UpdateFavorites(UpdateFavoritesRequest),
    IsPinned(ItemRequest),
    IsHidden(ItemRequest),
    HiddenItems,
    PinnedCalendarEvents,
    HiddenCalendarEventKeys,
    SortByRelevance(KeysRequest),
    SortByWeight(KeysRequest),
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CoreResponse {
    Favorites(FavoritesResponse),
    Mutation(MutationResponse),
    Flag(FlagResponse),
    Keys(KeysResponse),
    Cleanup(CleanupResponse),
}

impl From<Searchable> for FavoriteDto {
    fn from(value: Searchable) -> Self {
        Self {
            key: value.key(),
            kind: value.type_tag().to_string(),
            label: value.label().to_string(),
            item: value,
        }
    }
}

impl FavoritesResponse {
    pub fn from_items(items: Vec<Searchable>) -> Self {
        Self {
            items: items.into_iter().map(FavoriteDto::from).collect(),
        }
    }
}
