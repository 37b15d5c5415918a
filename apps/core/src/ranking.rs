use crate::favorites_store::TypeFilter;
use crate::model::TYPE_CALENDAR;
use crate::settings::MAX_GRID_COLUMNS;

pub const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRequest {
    pub columns: usize,
    pub include_manual: bool,
    pub include_auto: bool,
    pub include_frequent: bool,
    pub limit: usize,
    pub types: TypeFilter,
    /// Publish an empty list while the "show favorites" preference is off.
    pub follows_visibility: bool,
}

impl RankingRequest {
    /// Everything a favorites grid shows: both pin classes plus frequent
    /// items filling up the rows. Calendar events live in their own list.
    pub fn grid(columns: usize) -> Self {
        Self {
            columns,
            include_manual: true,
            include_auto: true,
            include_frequent: true,
            limit: DEFAULT_LIMIT,
            types: TypeFilter::Exclude(vec![TYPE_CALENDAR.to_string()]),
            follows_visibility: true,
        }
    }

    /// Pinned calendar events, shown outside the favorites grid.
    pub fn pinned_calendar_events() -> Self {
        Self {
            columns: 1,
            include_manual: true,
            include_auto: true,
            include_frequent: false,
            limit: DEFAULT_LIMIT,
            types: TypeFilter::Include(vec![TYPE_CALENDAR.to_string()]),
            follows_visibility: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_types(mut self, types: TypeFilter) -> Self {
        self.types = types;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.columns == 0 || self.columns > MAX_GRID_COLUMNS as usize {
            return Err(format!("columns must be between 1 and {MAX_GRID_COLUMNS}"));
        }
        if self.limit == 0 {
            return Err("limit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Total grid slots to fill for `pinned` pinned items.
///
/// Pinned items are rounded up to whole rows. While the pins do not fill a
/// single row, one extra row is reserved for frequently used items.
pub fn fill_quota(pinned: usize, columns: usize) -> usize {
    let columns = columns.max(1);
    let mut slots = pinned.div_ceil(columns).saturating_mul(columns);
    if pinned < columns {
        slots = slots.saturating_add(columns);
    }
    slots
}

/// Pinned items first, then as many automatic items as fit into `slots`.
pub fn merge<T>(mut pinned: Vec<T>, automatic: Vec<T>, slots: usize) -> Vec<T> {
    let room = slots.saturating_sub(pinned.len());
    pinned.extend(automatic.into_iter().take(room));
    pinned
}

#[cfg(test)]
mod tests {
    use super::{fill_quota, merge, RankingRequest};
    use crate::favorites_store::TypeFilter;

    #[test]
    fn partial_row_of_pins_gets_an_extra_row() {
        assert_eq!(fill_quota(2, 4), 8);
        assert_eq!(fill_quota(0, 4), 4);
        assert_eq!(fill_quota(3, 1), 3);
    }

    #[test]
    fn full_rows_of_pins_are_not_padded() {
        assert_eq!(fill_quota(4, 4), 4);
        assert_eq!(fill_quota(8, 4), 8);
        assert_eq!(fill_quota(5, 4), 8);
    }

    #[test]
    fn quota_is_always_a_whole_number_of_rows() {
        for columns in 1..=8 {
            for pinned in 0..40 {
                let slots = fill_quota(pinned, columns);
                assert_eq!(slots % columns, 0);
                assert!(slots >= pinned);
            }
        }
    }

    #[test]
    fn huge_column_counts_saturate_instead_of_overflowing() {
        assert_eq!(fill_quota(1, usize::MAX / 2 + 1), usize::MAX);
        assert_eq!(fill_quota(0, usize::MAX), usize::MAX);
        assert_eq!(fill_quota(usize::MAX, 2), usize::MAX);
    }

    #[test]
    fn merge_keeps_pins_first_and_caps_fill() {
        let merged = merge(vec!["p1", "p2"], vec!["a1", "a2", "a3"], 4);
        assert_eq!(merged, vec!["p1", "p2", "a1", "a2"]);
    }

    #[test]
    fn merge_never_drops_pins() {
        let merged = merge(vec!["p1", "p2", "p3"], vec!["a1"], 2);
        assert_eq!(merged, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn out_of_range_columns_are_rejected() {
        assert!(RankingRequest::grid(0).validate().is_err());
        assert!(RankingRequest::grid(13).validate().is_err());
        assert!(RankingRequest::grid(usize::MAX).validate().is_err());
        assert!(RankingRequest::grid(3).validate().is_ok());
    }

    #[test]
    fn grid_leaves_calendar_events_out() {
        let grid = RankingRequest::grid(4);
        assert_eq!(grid.types, TypeFilter::Exclude(vec!["calendar".to_string()]));

        let calendar = RankingRequest::pinned_calendar_events();
        assert!(!calendar.include_frequent);
        assert_eq!(calendar.types, TypeFilter::Include(vec!["calendar".to_string()]));
    }
}
