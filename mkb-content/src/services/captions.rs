//! Ready-to-use caption variants built from the prompt alone
//!
//! Variants never depend on upstream generation, so a draft always carries
//! usable copy even when the text service is down.

use mkb_common::db::Platform;

/// Number of variants in every draft
pub const VARIANT_COUNT: usize = 3;

const MAX_HASHTAGS: usize = 3;

const TRAILING_PUNCTUATION: &[char] = &['.', '!', '?'];

/// Build the fixed, ordered caption variants for a prompt
///
/// The first variant is the default suggestion.
pub fn variants(prompt: &str, platform: Platform, link_url: Option<&str>) -> Vec<String> {
    let topic = prompt.trim();

    let mut variants = vec![
        format!("{}. Discover more and join us today!", sentence(topic)),
        format!("Looking for {}? We have what you need.", lower_first(topic)),
        format!("Don't miss out: {}. Limited spots available!", lower_first(topic)),
    ];

    let link = link_url.map(str::trim).filter(|l| !l.is_empty());
    let hashtags = match platform {
        Platform::Instagram => hashtags(topic),
        Platform::Facebook => String::new(),
    };

    for variant in variants.iter_mut() {
        if let Some(link) = link {
            variant.push_str("\n\n");
            variant.push_str(link);
        }
        if !hashtags.is_empty() {
            variant.push_str("\n\n");
            variant.push_str(&hashtags);
        }
    }

    variants
}

/// Prompt with a capitalized first letter and no trailing punctuation
fn sentence(topic: &str) -> String {
    let topic = topic.trim_end_matches(TRAILING_PUNCTUATION);
    let mut chars = topic.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(topic: &str) -> String {
    let topic = topic.trim_end_matches(TRAILING_PUNCTUATION);
    let mut chars = topic.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Up to three hashtags from the longest prompt words
fn hashtags(topic: &str) -> String {
    let mut words: Vec<String> = topic
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3)
        .collect();

    // Stable sort keeps prompt order among equal lengths
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let mut seen = Vec::new();
    for word in words {
        if !seen.contains(&word) {
            seen.push(word);
        }
        if seen.len() == MAX_HASHTAGS {
            break;
        }
    }

    seen.iter()
        .map(|w| format!("#{}", w))
        .collect::<Vec<_>>()
        .join(" ")
}
