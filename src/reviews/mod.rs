//! Review feed: loading, submitting and rating display.

pub mod feed;
pub mod load;
pub mod stars;
pub mod submit;
pub mod summary;

pub use feed::ReviewFeed;
pub use load::load_reviews;
pub use stars::{average_rating, stars_for, AverageRating, StarDisplay};
pub use submit::{submit_review, Author};
pub use summary::{load_summary, SiteSummary};
