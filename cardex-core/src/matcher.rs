use tracing::debug;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::providers::TmdbQuerier;
use crate::types::{EpisodeIndex, EpisodeInfo, SeriesInfo};

/// Find the provider's season/episode index for an episode.
///
/// Strict tier order, short-circuiting on first success:
///
/// 1. episode TVDB ID via the cross-reference lookup (also adopts the
///    series ID from the result; no title check on this tier)
/// 2. direct season/episode index, retried with the absolute number as the
///    episode index across seasons N..0 when the direct index is unknown
/// 3. accept the tier-2 candidate outright, or confirm its title when
///    `title_match` is set
/// 4. exhaustive title scan over seasons 0..N in ascending order; a season
///    that does not exist aborts the whole search
///
/// The deadline is checked before each tier transition and before each
/// season fetch inside a tier.
pub async fn find_episode(
    querier: &dyn TmdbQuerier,
    series: &mut SeriesInfo,
    episode: &EpisodeInfo,
    title_match: bool,
    deadline: Deadline,
) -> Result<Option<EpisodeIndex>> {
    if let Some(tvdb) = episode.tvdb_id {
        deadline.check()?;
        let found = querier.find_by_external_id(tvdb).await?;
        if let Some(first) = found.tv_episode_results.first() {
            debug!(series = %series, %tvdb, "adopted series ID from episode TVDB lookup");
            series.set_tmdb_id(first.show_id);
            return Ok(Some(first.index()));
        }
    }

    // Every later tier needs a resolved series ID.
    let Some(series_id) = series.tmdb_id() else {
        return Ok(None);
    };

    deadline.check()?;
    let mut detail = querier
        .episode_detail(series_id, episode.season, episode.episode)
        .await?;

    // Unknown under its own index: substitute the absolute number as the
    // episode index, scanning seasons from the episode's own down to 0 and
    // stopping at the first season that yields a result.
    if detail.is_none()
        && let Some(absolute) = episode.absolute
    {
        for season in (0..=episode.season).rev() {
            deadline.check()?;
            detail = querier.episode_detail(series_id, season, absolute).await?;
            if detail.is_some() {
                break;
            }
        }
    }

    if let Some(found) = &detail {
        if !title_match || episode.title.matches(&found.name) {
            return Ok(Some(found.index()));
        }
    }

    for season in 0..=episode.season {
        deadline.check()?;
        let Some(episodes) = querier.season_episodes(series_id, season).await? else {
            // A season the provider does not know means the series is
            // exhausted; later seasons are not scanned.
            return Ok(None);
        };
        for candidate in &episodes {
            if episode.title.matches(&candidate.name) {
                return Ok(Some(candidate.index()));
            }
        }
    }

    Ok(None)
}
