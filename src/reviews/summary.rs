use futures::try_join;
use serde::{Deserialize, Serialize};

use super::stars::{average_rating, AverageRating};
use crate::backend::{fetch, RelationalStore, Select, Table};
use crate::error::AppError;

#[derive(Deserialize)]
struct RatingRow {
    rating: i32,
}

/// Numbers shown on the landing page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SiteSummary {
    pub players: usize,
    pub ratings: usize,
    pub average: AverageRating,
}

/// Fetches player and rating counts concurrently.
pub async fn load_summary(store: &dyn RelationalStore) -> Result<SiteSummary, AppError> {
    let players_query = Select::on(Table::Profiles).columns(&["id"]);
    let players = store.select(&players_query);
    let ratings_query = Select::on(Table::Reviews).columns(&["rating"]);
    let ratings = fetch::<RatingRow>(store, &ratings_query);
    let (players, ratings) = try_join!(players, ratings).map_err(AppError::remote("loading site summary"))?;

    let ratings: Vec<i32> = ratings.into_iter().map(|row| row.rating).collect();
    Ok(SiteSummary {
        players: players.len(),
        ratings: ratings.len(),
        average: average_rating(&ratings),
    })
}
