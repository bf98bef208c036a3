//! File names for exported guides.
//!
//! An exported guide is named after its title plus a short id suffix, so two
//! guides with the same title never collide:
//!
//! - `"Le Petit Bistrot"` + id `abcdef1234567890` → `le-petit-bistrot-abcdef12.html`
//! - `"Chalet à Méribel"` → `chalet-a-meribel-<id>.html`
//! - no usable title and no id → `guide.html`
//!
//! ## Slugs
//!
//! Titles are decomposed (NFD), combining marks U+0300..U+036F are dropped,
//! the rest is lowercased and every run of non-alphanumeric characters
//! becomes a single dash. Leading and trailing dashes are stripped.

use unicode_normalization::UnicodeNormalization;

/// Stem used when neither title nor id produce anything.
pub const FALLBACK_STEM: &str = "guide";

/// Length of the id suffix.
const ID_SUFFIX_LEN: usize = 8;

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// ASCII slug of a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_dash = true;
    for c in title.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Truncate a slug to at most `max` bytes, breaking at the last dash when
/// one is available.
fn truncate_slug(slug: &str, max: usize) -> &str {
    if slug.len() <= max {
        return slug;
    }
    let truncated = &slug[..max];
    match truncated.rfind('-') {
        Some(pos) if pos > 0 => &truncated[..pos],
        _ => truncated,
    }
}

/// File stem (no extension) for a guide, at most `max_len` bytes.
pub fn file_stem(title: &str, guide_id: Option<&str>, max_len: usize) -> String {
    let id_part: String = guide_id
        .map(slugify)
        .unwrap_or_default()
        .replace('-', "")
        .chars()
        .take(ID_SUFFIX_LEN)
        .collect();
    let title_part = slugify(title);

    let stem = match (title_part.is_empty(), id_part.is_empty()) {
        (true, true) => return FALLBACK_STEM.to_string(),
        (false, true) => truncate_slug(&title_part, max_len).to_string(),
        (true, false) => id_part,
        (false, false) => {
            let room = max_len.saturating_sub(id_part.len() + 1);
            let title_part = truncate_slug(&title_part, room);
            if title_part.is_empty() {
                id_part
            } else {
                format!("{title_part}-{id_part}")
            }
        }
    };
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// `<stem>.html`
pub fn guide_file_name(title: &str, guide_id: Option<&str>, max_len: usize) -> String {
    format!("{}.html", file_stem(title, guide_id, max_len))
}

/// Public URL of an exported file hosted next to the web app.
pub fn file_share_url(base_url: &str, file_name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), file_name)
}
