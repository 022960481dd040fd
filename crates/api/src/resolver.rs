//! Slot Resolver (C7): turns a preset or partial venue reference into a
//! concrete `(venue_id, field_type_id)` pair, expands a date spec into
//! concrete date strings, and applies the post-fetch `start_hour` filter.

use chrono::{Duration, NaiveDate, Utc};

use booking_domain::models::{BookingTarget, PresetCatalogue, Slot};

use crate::client::BookingApi;
use crate::models::{FieldType, Venue};

#[derive(Debug, Clone, Default)]
pub struct ResolvedTarget {
    pub venue_id: String,
    pub venue_name: Option<String>,
    pub field_type_id: String,
    pub field_type_name: Option<String>,
}

impl ResolvedTarget {
    fn is_complete(&self) -> bool {
        !self.venue_id.is_empty() && !self.field_type_id.is_empty()
    }
}

/// Resolves venue/field-type identifiers (§4.7 steps 1-3). A `preset`
/// pre-populates the target before keyword/id resolution runs.
pub async fn resolve_target(
    api: &BookingApi,
    target: &BookingTarget,
    preset_catalogue: &PresetCatalogue,
    preset_index: Option<i64>,
) -> booking_domain::Result<ResolvedTarget> {
    let mut resolved = ResolvedTarget {
        venue_id: target.venue_id.clone().unwrap_or_default(),
        venue_name: target.venue_keyword.clone(),
        field_type_id: target.field_type_id.clone().unwrap_or_default(),
        field_type_name: target.field_type_keyword.clone(),
    };

    if let Some(idx) = preset_index {
        if let Some(preset) = preset_catalogue.get(&idx) {
            resolved.venue_id = preset.venue_id.clone();
            resolved.venue_name = Some(preset.venue_name.clone());
            resolved.field_type_id = preset.field_type_id.clone();
            resolved.field_type_name = Some(preset.field_type_name.clone());
        }
    }

    if resolved.venue_id.is_empty() {
        if let Some(keyword) = target.venue_keyword.as_deref() {
            if let Some(venue) = find_venue(api, keyword).await? {
                resolved.venue_id = venue.id;
                resolved.venue_name = Some(venue.name);
            }
        }
    }

    if resolved.field_type_id.is_empty() && !resolved.venue_id.is_empty() {
        let detail = api.venue_detail(&resolved.venue_id).await?;
        let field_types = api.list_field_types(&detail);
        let picked = match target.field_type_keyword.as_deref() {
            Some(keyword) => field_types.iter().find(|ft| ft.name.contains(keyword)),
            None => field_types.first(),
        };
        if let Some(ft) = picked {
            resolved.field_type_id = ft.id.clone();
            resolved.field_type_name = Some(ft.name.clone());
        }
    }

    Ok(resolved)
}

/// Case-sensitive substring match over up to 3 pages of 50 listings
/// (§4.7 step 2).
pub async fn find_venue(api: &BookingApi, keyword: &str) -> booking_domain::Result<Option<Venue>> {
    for page in 1..=3u32 {
        let venues = api.list_venues(Some(keyword), page, 50).await?;
        if venues.is_empty() {
            break;
        }
        if let Some(found) = venues.into_iter().find(|v| v.name.contains(keyword)) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

pub fn find_field_type<'a>(field_types: &'a [FieldType], keyword: Option<&str>) -> Option<&'a FieldType> {
    match keyword {
        Some(k) => field_types.iter().find(|ft| ft.name.contains(k)),
        None => field_types.first(),
    }
}

/// Expands a target's date spec into concrete `YYYY-MM-DD` strings
/// (§4.7 step 4). An empty result with `use_all_dates=true` means the
/// caller should fall back to server-supplied dates.
pub fn expand_dates(target: &BookingTarget, today: chrono::DateTime<Utc>) -> Vec<String> {
    if !target.fixed_dates.is_empty() {
        return target.fixed_dates.clone();
    }
    if target.use_all_dates {
        return Vec::new();
    }
    let Some(offset) = &target.date_offset else {
        return Vec::new();
    };
    offset
        .clone()
        .into_vec()
        .into_iter()
        .map(|days| (today + Duration::days(days)).format("%Y-%m-%d").to_string())
        .collect()
}

/// Applies the post-fetch `start_hour` filter (§4.7 step 5).
pub fn filter_by_start_hour(slots: Vec<Slot>, start_hour: Option<u32>) -> Vec<Slot> {
    match start_hour {
        Some(hour) => slots.into_iter().filter(|s| s.start_hour() == Some(hour)).collect(),
        None => slots,
    }
}

/// Parses `"YYYY-MM-DD"` or a bare integer day-offset relative to today.
pub fn parse_date_input(input: &str, today: chrono::DateTime<Utc>) -> Option<String> {
    if NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok() {
        return Some(input.to_string());
    }
    let offset: i64 = input.parse().ok()?;
    Some((today + Duration::days(offset)).format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_domain::models::DateOffset;
    use chrono::TimeZone;

    fn today() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
    }

    #[test]
    fn expand_dates_prefers_fixed_dates() {
        let mut target = BookingTarget::default();
        target.fixed_dates = vec!["2026-08-01".into()];
        target.date_offset = Some(DateOffset::Single(5));
        assert_eq!(expand_dates(&target, today()), vec!["2026-08-01".to_string()]);
    }

    #[test]
    fn expand_dates_use_all_dates_is_empty() {
        let mut target = BookingTarget::default();
        target.use_all_dates = true;
        target.date_offset = Some(DateOffset::Single(5));
        assert!(expand_dates(&target, today()).is_empty());
    }

    #[test]
    fn expand_dates_single_offset() {
        let mut target = BookingTarget::default();
        target.date_offset = Some(DateOffset::Single(2));
        assert_eq!(expand_dates(&target, today()), vec!["2026-07-30".to_string()]);
    }

    #[test]
    fn expand_dates_multiple_offsets() {
        let mut target = BookingTarget::default();
        target.date_offset = Some(DateOffset::Many(vec![0, 1, 2]));
        assert_eq!(
            expand_dates(&target, today()),
            vec!["2026-07-28".to_string(), "2026-07-29".to_string(), "2026-07-30".to_string()]
        );
    }

    #[test]
    fn parse_date_input_accepts_literal_date() {
        assert_eq!(parse_date_input("2026-08-01", today()), Some("2026-08-01".to_string()));
    }

    #[test]
    fn parse_date_input_accepts_day_offset() {
        assert_eq!(parse_date_input("3", today()), Some("2026-07-31".to_string()));
    }
}
