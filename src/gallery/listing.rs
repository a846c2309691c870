//! Reconciling raw directory entries into an image listing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::gallery::types::ImageMetadata;
use crate::storage::AccessTier;

/// Images per listing page.
pub const PAGE_SIZE: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedImage {
    pub tier: AccessTier,
    pub tier_name: String,
    pub file_name: String,
    pub tags: Vec<String>,
    pub uploaded: DateTime<Utc>,
}

impl ListedImage {
    pub fn into_metadata(self, image_token: String) -> ImageMetadata {
        ImageMetadata {
            file_name: self.file_name,
            tags: self.tags,
            access_path: self.tier_name,
            uploaded: self.uploaded.to_rfc3339_opts(SecondsFormat::Secs, true),
            image_token,
        }
    }
}

/// Tag filter: empty matches everything, otherwise at least one tag must be
/// in the set.
#[derive(Debug, Default)]
pub struct TagFilter<'a> {
    wanted: HashSet<&'a str>,
}

impl<'a> TagFilter<'a> {
    pub fn new(tags: &'a [String]) -> Self {
        Self {
            wanted: tags.iter().map(String::as_str).collect(),
        }
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        self.wanted.is_empty() || tags.iter().any(|t| self.wanted.contains(t.as_str()))
    }
}

/// Deduplicates the content file and its tag symlink, which both show up in
/// a raw listing. The tagged variant wins.
#[derive(Debug, Default)]
pub struct Listing {
    images: HashMap<(AccessTier, String), ListedImage>,
}

impl Listing {
    pub fn insert(&mut self, image: ListedImage) {
        let key = (image.tier, image.file_name.clone());
        if let Some(existing) = self.images.get(&key) {
            if !existing.tags.is_empty() && image.tags.is_empty() {
                return;
            }
        }
        self.images.insert(key, image);
    }

    /// All images, newest first. Ties are ordered by name so pages are stable.
    pub fn into_sorted(self) -> Vec<ListedImage> {
        let mut images: Vec<ListedImage> = self.images.into_values().collect();
        images.sort_by(|a, b| {
            b.uploaded
                .cmp(&a.uploaded)
                .then_with(|| a.file_name.cmp(&b.file_name))
                .then_with(|| a.tier.cmp(&b.tier))
        });
        images
    }
}

/// Slice bounds for a 1-based page. Out-of-range pages clamp to the first or
/// last page.
pub fn page_bounds(page: i64, available: usize) -> (usize, usize) {
    let last_page = available.div_ceil(PAGE_SIZE) as i64;
    let page = page.min(last_page).max(1) as usize;

    let start = (page - 1) * PAGE_SIZE;
    let end = (page * PAGE_SIZE).min(available);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn image(name: &str, tags: &[&str], secs: i64) -> ListedImage {
        ListedImage {
            tier: AccessTier::Public,
            tier_name: "public".to_string(),
            file_name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            uploaded: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_tagged_variant_wins_either_order() {
        let mut listing = Listing::default();
        listing.insert(image("a.jpg", &["x"], 10));
        listing.insert(image("a.jpg", &[], 10));
        assert_eq!(listing.into_sorted()[0].tags, vec!["x".to_string()]);

        let mut listing = Listing::default();
        listing.insert(image("a.jpg", &[], 10));
        listing.insert(image("a.jpg", &["x"], 10));
        let sorted = listing.into_sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].tags, vec!["x".to_string()]);
    }

    #[test]
    fn test_same_name_in_different_tiers_kept_apart() {
        let mut listing = Listing::default();
        listing.insert(image("a.jpg", &[], 10));
        let mut private = image("a.jpg", &[], 10);
        private.tier = AccessTier::Private;
        listing.insert(private);
        assert_eq!(listing.into_sorted().len(), 2);
    }

    #[test]
    fn test_sorted_newest_first() {
        let mut listing = Listing::default();
        listing.insert(image("old.jpg", &[], 1));
        listing.insert(image("new.jpg", &[], 3));
        listing.insert(image("mid.jpg", &[], 2));
        let names: Vec<_> = listing.into_sorted().into_iter().map(|i| i.file_name).collect();
        assert_eq!(names, vec!["new.jpg", "mid.jpg", "old.jpg"]);
    }

    #[test]
    fn test_tag_filter() {
        let wanted = vec!["cats".to_string()];
        let filter = TagFilter::new(&wanted);
        assert!(filter.matches(&["dogs".to_string(), "cats".to_string()]));
        assert!(!filter.matches(&["dogs".to_string()]));
        assert!(!filter.matches(&[]));

        let everything = TagFilter::new(&[]);
        assert!(everything.matches(&[]));
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(1, 0), (0, 0));
        assert_eq!(page_bounds(0, 5), (0, 5));
        assert_eq!(page_bounds(1, 21), (0, 21));
        assert_eq!(page_bounds(2, 22), (21, 22));
        assert_eq!(page_bounds(9, 50), (42, 50));
        assert_eq!(page_bounds(-3, 50), (0, 21));
    }

    #[test]
    fn test_metadata_timestamp_format() {
        let meta = image("a.jpg", &[], 0).into_metadata(String::new());
        assert_eq!(meta.uploaded, "1970-01-01T00:00:00Z");
        assert_eq!(meta.access_path, "public");
    }
}
