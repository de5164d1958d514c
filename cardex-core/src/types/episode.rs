use std::fmt;

use serde::{Deserialize, Serialize};

use super::TvdbId;

/// Episode title with normalized comparison semantics.
///
/// Provider titles differ from local ones in casing and punctuation far more
/// often than in words, so equality is decided on the lowercased
/// alphanumeric skeleton of both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased title with everything but letters and digits removed.
    pub fn normalized(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect()
    }

    /// Normalized equality against a provider-supplied title.
    pub fn matches(&self, other: &str) -> bool {
        self.normalized() == Title::new(other).normalized()
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Season/episode position of an episode within a series on the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeIndex {
    pub season: u32,
    pub episode: u32,
}

impl fmt::Display for EpisodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Known attributes of a single episode, as read from the local library.
///
/// Immutable after construction apart from identifier enrichment via the
/// builder methods.
#[derive(Debug, Clone)]
pub struct EpisodeInfo {
    pub title: Title,
    pub season: u32,
    pub episode: u32,
    /// Show-wide sequential episode count, independent of season boundaries.
    pub absolute: Option<u32>,
    pub tvdb_id: Option<TvdbId>,
}

impl EpisodeInfo {
    pub fn new(title: Title, season: u32, episode: u32) -> Self {
        Self {
            title,
            season,
            episode,
            absolute: None,
            tvdb_id: None,
        }
    }

    pub fn with_absolute(mut self, number: u32) -> Self {
        self.absolute = Some(number);
        self
    }

    pub fn with_tvdb_id(mut self, id: TvdbId) -> Self {
        self.tvdb_id = Some(id);
        self
    }

    /// Key fragment for blacklist entries, e.g. `2-13`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.season, self.episode)
    }
}

impl fmt::Display for EpisodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_matching_ignores_case_and_punctuation() {
        let title = Title::new("Ozymandias, Part 1");
        assert!(title.matches("ozymandias part 1"));
        assert!(title.matches("OZYMANDIAS: PART 1"));
        assert!(!title.matches("Ozymandias, Part 2"));
    }

    #[test]
    fn episode_key_is_season_dash_episode() {
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 7);
        assert_eq!(episode.key(), "1-7");
    }
}
