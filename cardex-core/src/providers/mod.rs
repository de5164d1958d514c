mod tmdb;
mod traits;

pub use tmdb::{API_BASE_URL, IMAGE_BASE_URL, TmdbClient};
pub(crate) use tmdb::image_url;
pub use traits::{
    EpisodeRecord, FindResponse, FoundEpisode, FoundSeries, ImageRecord, LogoRecord,
    SearchHit, SearchResponse, TmdbQuerier,
};

#[cfg(test)]
pub(crate) use traits::MockTmdbQuerier;
