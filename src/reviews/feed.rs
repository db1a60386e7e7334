use crate::models::review::EnrichedReview;

/// Entries shown before "show more" is used.
pub const PAGE_SIZE: usize = 5;

/// The displayed review list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFeed {
    entries: Vec<EnrichedReview>,
    expanded: bool,
}

impl ReviewFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list with an authoritative load. Locally prepended
    /// entries are dropped; the ones the store kept come back confirmed.
    pub fn replace(&mut self, loaded: Vec<EnrichedReview>) {
        self.entries = loaded;
    }

    /// Puts a freshly submitted review at the top.
    pub fn prepend(&mut self, review: EnrichedReview) {
        self.entries.insert(0, review);
    }

    pub fn entries(&self) -> &[EnrichedReview] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visible(&self) -> &[EnrichedReview] {
        if self.expanded {
            &self.entries
        } else {
            &self.entries[..self.entries.len().min(PAGE_SIZE)]
        }
    }

    pub fn can_show_more(&self) -> bool {
        !self.expanded && self.entries.len() > PAGE_SIZE
    }

    pub fn show_more(&mut self) {
        self.expanded = true;
    }

    pub fn unconfirmed(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_confirmed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::review::{Confirmation, Review};
    use chrono::Utc;

    fn entry(id: i64, confirmation: Confirmation) -> EnrichedReview {
        EnrichedReview {
            review: Review {
                id,
                user_id: None,
                username: format!("user{id}"),
                rating: 5,
                comment: String::new(),
                created_at: Utc::now(),
            },
            profile_pic: "pic".into(),
            confirmation,
        }
    }

    #[test]
    fn prepend_puts_the_new_entry_first() {
        let mut feed = ReviewFeed::new();
        feed.replace(vec![entry(2, Confirmation::Confirmed), entry(1, Confirmation::Confirmed)]);

        feed.prepend(entry(3, Confirmation::Unconfirmed));

        assert_eq!(feed.len(), 3);
        assert_eq!(feed.entries()[0].review.id, 3);
        assert_eq!(feed.unconfirmed(), 1);
    }

    #[test]
    fn a_full_load_confirms_local_entries() {
        let mut feed = ReviewFeed::new();
        feed.prepend(entry(3, Confirmation::Unconfirmed));

        feed.replace(vec![entry(3, Confirmation::Confirmed)]);

        assert_eq!(feed.unconfirmed(), 0);
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn shows_five_until_expanded() {
        let mut feed = ReviewFeed::new();
        feed.replace((1..=7).map(|id| entry(id, Confirmation::Confirmed)).collect());

        assert_eq!(feed.visible().len(), PAGE_SIZE);
        assert!(feed.can_show_more());

        feed.show_more();
        assert_eq!(feed.visible().len(), 7);
        assert!(!feed.can_show_more());
    }

    #[test]
    fn short_feeds_never_offer_more() {
        let mut feed = ReviewFeed::new();
        feed.replace((1..=5).map(|id| entry(id, Confirmation::Confirmed)).collect());
        assert!(!feed.can_show_more());
        assert_eq!(feed.visible().len(), 5);
    }
}
