use serde::{Deserialize, Serialize};

use crate::model::ids::VenueId;

/// A bookable space. Canonical shape; see `remote::types::RemoteVenue` for the wire form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue_type: Option<String>,
    /// Human-readable location, flattened from whatever the server sent.
    #[serde(default)]
    pub location: String,
    pub capacity: u32,
    pub daily_rate: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Inclusive numeric range with an optional upper bound (`"min-max"` or `"min"`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeFilter {
    pub min: f64,
    pub max: Option<f64>,
}

impl RangeFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        match raw.split_once('-') {
            Some((min, max)) => {
                let min = min.trim().parse().ok()?;
                let max: f64 = max.trim().parse().ok()?;
                // A zero upper bound means "no upper bound".
                Some(Self {
                    min,
                    max: (max > 0.0).then_some(max),
                })
            }
            None => Some(Self {
                min: raw.parse().ok()?,
                max: None,
            }),
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && self.max.is_none_or(|max| v <= max)
    }
}

/// Client-side venue filtering: substring match on location, numeric ranges
/// on price and capacity, exact (case-insensitive) venue type.
#[derive(Clone, Debug, Default)]
pub struct VenueFilter {
    pub location: Option<String>,
    pub price: Option<RangeFilter>,
    pub capacity: Option<RangeFilter>,
    pub venue_type: Option<String>,
}

impl VenueFilter {
    pub fn is_empty(&self) -> bool {
        self.location.as_deref().is_none_or(|l| l.trim().is_empty())
            && self.price.is_none()
            && self.capacity.is_none()
            && self.venue_type.is_none()
    }

    pub fn matches(&self, venue: &Venue) -> bool {
        if let Some(loc) = self.location.as_deref().map(str::trim) {
            if !loc.is_empty()
                && !venue
                    .location
                    .to_lowercase()
                    .contains(&loc.to_lowercase())
            {
                return false;
            }
        }

        if let Some(range) = &self.price {
            if !range.contains(venue.daily_rate) {
                return false;
            }
        }

        if let Some(range) = &self.capacity {
            if !range.contains(f64::from(venue.capacity)) {
                return false;
            }
        }

        if let Some(wanted) = &self.venue_type {
            let matches_type = venue
                .venue_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(wanted));
            if !matches_type {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, venues: &[Venue]) -> Vec<Venue> {
        venues.iter().filter(|v| self.matches(v)).cloned().collect()
    }
}
