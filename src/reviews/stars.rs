use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_STARS: u8 = 5;
pub const NO_RATINGS: &str = "Nincs még értékelés";

/// How a rating is drawn: full stars, an optional partial star, empty stars.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarDisplay {
    pub full: u8,
    pub half: bool,
    pub empty: u8,
}

impl StarDisplay {
    pub fn total(&self) -> u8 {
        self.full + u8::from(self.half) + self.empty
    }
}

/// Any non-zero fractional part earns the partial star, so 4.2 draws as
/// four full stars and a partial one. Ratings outside 0..=5 are clamped.
pub fn stars_for(rating: f64) -> StarDisplay {
    let rating = if rating.is_nan() {
        0.0
    } else {
        rating.clamp(0.0, f64::from(MAX_STARS))
    };
    let full = rating.floor() as u8;
    let half = rating.fract() > 0.0;
    StarDisplay {
        full,
        half,
        empty: MAX_STARS - full - u8::from(half),
    }
}

/// Site-wide average of all review ratings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum AverageRating {
    NoRatings,
    /// Mean rounded to one decimal place.
    Average(f64),
}

impl AverageRating {
    pub fn value(&self) -> Option<f64> {
        match self {
            AverageRating::NoRatings => None,
            AverageRating::Average(value) => Some(*value),
        }
    }

    pub fn stars(&self) -> Option<StarDisplay> {
        self.value().map(stars_for)
    }
}

impl fmt::Display for AverageRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageRating::NoRatings => f.write_str(NO_RATINGS),
            AverageRating::Average(value) => write!(f, "{value:.1}"),
        }
    }
}

pub fn average_rating(ratings: &[i32]) -> AverageRating {
    if ratings.is_empty() {
        return AverageRating::NoRatings;
    }
    let sum: f64 = ratings.iter().copied().map(f64::from).sum();
    let mean = sum / ratings.len() as f64;
    AverageRating::Average((mean * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_and_fractional_ratings() {
        assert_eq!(stars_for(3.0), StarDisplay { full: 3, half: false, empty: 2 });
        assert_eq!(stars_for(3.5), StarDisplay { full: 3, half: true, empty: 1 });
        assert_eq!(stars_for(4.2), StarDisplay { full: 4, half: true, empty: 0 });
        assert_eq!(stars_for(5.0), StarDisplay { full: 5, half: false, empty: 0 });
        assert_eq!(stars_for(0.0), StarDisplay { full: 0, half: false, empty: 5 });
    }

    #[test]
    fn every_rating_draws_five_stars() {
        for tenths in -20..=80 {
            let rating = f64::from(tenths) / 10.0;
            assert_eq!(stars_for(rating).total(), MAX_STARS, "rating {rating}");
        }
        assert_eq!(stars_for(f64::NAN).total(), MAX_STARS);
    }

    #[test]
    fn averages_round_to_one_decimal() {
        assert_eq!(average_rating(&[5, 4, 3]).to_string(), "4.0");
        assert_eq!(average_rating(&[5, 4]).to_string(), "4.5");
        assert_eq!(average_rating(&[5, 5, 4]), AverageRating::Average(4.7));
        assert_eq!(average_rating(&[]).to_string(), NO_RATINGS);
        assert_eq!(average_rating(&[]).stars(), None);
    }
}
