//! Extraction of pronunciation groups from an entry's pronunciation tab

use super::page::{element_text, selector, PageError};
use crate::types::{Headword, PronunciationGroup};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Region tag preferred when a group lists several regional pronunciations
const PREFERRED_REGION: &str = "U.S.";

/// Headers mentioning a sense restrict the group rather than name it
const SENSE_QUALIFIER: &str = "sense";

struct GroupSelectors {
    header: Selector,
    regional: Selector,
    ipa: Selector,
}

/// Parse a pronunciation tab into labeled pronunciation groups.
///
/// A page without the pronunciation container yields an empty list.
pub fn parse_pronunciation_page(
    html: &str,
    headword: &Headword,
) -> Result<Vec<PronunciationGroup>, PageError> {
    let document = Html::parse_document(html);

    let container = selector("#pronunciation_groups")?;
    let group = selector(".pronunciation-group")?;
    let selectors = GroupSelectors {
        header: selector(".header")?,
        regional: selector(".regional-pronunciation")?,
        ipa: selector(".pronunciation-ipa")?,
    };

    let Some(container) = document.select(&container).next() else {
        debug!("No pronunciation container for {}", headword);
        return Ok(Vec::new());
    };

    let groups = container
        .select(&group)
        .filter_map(|el| parse_group(&el, headword, &selectors))
        .collect();

    Ok(groups)
}

fn parse_group(
    group: &ElementRef<'_>,
    headword: &Headword,
    selectors: &GroupSelectors,
) -> Option<PronunciationGroup> {
    let label = group
        .select(&selectors.header)
        .next()
        .map(|el| element_text(&el))
        .and_then(|header| label_from_header(&header))
        .unwrap_or_else(|| headword.root().to_string());

    let entries: Vec<ElementRef<'_>> = group.select(&selectors.regional).collect();
    let entry = entries
        .iter()
        .find(|el| element_text(el).contains(PREFERRED_REGION))
        .or_else(|| entries.first());

    let Some(entry) = entry else {
        debug!("Pronunciation group for '{}' has no regional entries", label);
        return None;
    };

    let raw = match entry.select(&selectors.ipa).next() {
        Some(ipa) => element_text(&ipa),
        None => {
            // no dedicated IPA element: drop the "Region:" prefix
            let text = element_text(entry);
            match text.split_once(':') {
                Some((_, rest)) => rest.trim().to_string(),
                None => text,
            }
        }
    };

    let ipa = strip_delimiters(&raw);
    if ipa.is_empty() {
        debug!("Empty IPA in group '{}'", label);
        return None;
    }

    Some(PronunciationGroup::new(label, ipa))
}

/// The group's label from its header: the header's last word, unless the
/// header restricts the group to a sense.
fn label_from_header(header: &str) -> Option<String> {
    if header.to_lowercase().contains(SENSE_QUALIFIER) {
        return None;
    }
    header
        .split(' ')
        .last()
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
}

/// Remove the slashes that delimit an IPA transcription
fn strip_delimiters(ipa: &str) -> String {
    ipa.trim().trim_matches('/').trim().to_string()
}
