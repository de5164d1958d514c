use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::providers::{ImageRecord, LogoRecord};
use crate::types::EpisodeInfo;

/// Minimum acceptable source image dimensions, e.g. `800x400`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimumResolution {
    pub width: u32,
    pub height: u32,
}

impl MinimumResolution {
    /// No minimum; every candidate passes the filter.
    pub fn unrestricted() -> Self {
        Self { width: 0, height: 0 }
    }

    pub fn met_by(&self, width: u32, height: u32) -> bool {
        width >= self.width && height >= self.height
    }
}

impl fmt::Display for MinimumResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error)]
#[error("invalid resolution {0:?}, expected WIDTHxHEIGHT")]
pub struct ParseResolutionError(String);

impl FromStr for MinimumResolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseResolutionError(s.to_owned()))?;
        let width = width
            .trim()
            .parse()
            .map_err(|_| ParseResolutionError(s.to_owned()))?;
        let height = height
            .trim()
            .parse()
            .map_err(|_| ParseResolutionError(s.to_owned()))?;
        Ok(Self { width, height })
    }
}

/// Pick the best still from a candidate list.
///
/// Candidates below the minimum resolution are filtered out; among the
/// survivors pixel area wins, with the provider vote average as tie-break.
/// Comparisons are strict-greater only, so the first-encountered candidate
/// wins all remaining ties.
pub fn pick_best_image(
    candidates: &[ImageRecord],
    minimum: MinimumResolution,
) -> Option<&ImageRecord> {
    let mut best: Option<(&ImageRecord, u64, f32)> = None;

    for image in candidates {
        if !minimum.met_by(image.width, image.height) {
            continue;
        }

        let pixels = u64::from(image.width) * u64::from(image.height);
        let score = image.vote_average;
        let better = match best {
            None => true,
            Some((_, best_pixels, best_score)) => {
                pixels > best_pixels || (pixels == best_pixels && score > best_score)
            }
        };
        if better {
            best = Some((image, pixels, score));
        }
    }

    best.map(|(image, _, _)| image)
}

/// Pick the best logo from a candidate list.
///
/// Only transparent formats (png, svg) with an English language tag are
/// considered. An svg survivor wins outright the moment it is seen; png
/// survivors compete on pixel area alone, first-seen winning ties.
pub fn pick_best_logo(candidates: &[LogoRecord]) -> Option<&LogoRecord> {
    let mut best: Option<(&LogoRecord, u64)> = None;

    for logo in candidates {
        let is_svg = logo.file_path.ends_with(".svg");
        if !is_svg && !logo.file_path.ends_with(".png") {
            continue;
        }
        if logo.iso_639_1.as_deref() != Some("en") {
            continue;
        }

        if is_svg {
            return Some(logo);
        }

        let pixels = u64::from(logo.width) * u64::from(logo.height);
        if best.is_none_or(|(_, best_pixels)| pixels > best_pixels) {
            best = Some((logo, pixels));
        }
    }

    best.map(|(logo, _)| logo)
}

/// Generic translated episode title template for a language code, with a
/// `{number}` placeholder.
fn generic_title_format(language_code: &str) -> Option<&'static str> {
    let format = match language_code {
        "ar" => "الحلقة {number}",
        "zh" => "第 {number} 集",
        "cs" => "{number}. epizoda",
        "en" => "Episode {number}",
        "fr" => "Épisode {number}",
        "de" => "Episode {number}",
        "he" => "פרק {number}",
        "hu" => "{number}. epizód",
        "id" => "Episode {number}",
        "it" => "Episodio {number}",
        "ja" => "第{number}話",
        "ko" => "에피소드 {number}",
        "pl" => "Odcinek {number}",
        "pt" => "Episódio {number}",
        "ro" => "Episodul {number}",
        "ru" => "Эпизод {number}",
        "sk" => "Epizóda {number}",
        "es" => "Episodio {number}",
        "th" => "Episode {number}",
        "tr" => "{number}. Bölüm",
        "uk" => "Серія {number}",
        "vi" => "Episode {number}",
        _ => return None,
    };
    Some(format)
}

/// Whether generic-title detection knows the given language code.
pub fn supports_generic_titles(language_code: &str) -> bool {
    generic_title_format(language_code).is_some()
}

/// Whether a provider title is the generic "Episode N" placeholder for the
/// given language, i.e. no real localized title exists.
///
/// The template is formatted with the episode number and, when known, the
/// absolute number; either match counts. Unrecognized language codes are
/// never treated as generic.
pub fn is_generic_title(title: &str, language_code: &str, episode: &EpisodeInfo) -> bool {
    let Some(template) = generic_title_format(language_code) else {
        debug!(language_code, "unrecognized language code");
        return false;
    };

    let formatted = |number: u32| template.replace("{number}", &number.to_string());
    if title == formatted(episode.episode) {
        return true;
    }
    episode
        .absolute
        .is_some_and(|absolute| title == formatted(absolute))
}
