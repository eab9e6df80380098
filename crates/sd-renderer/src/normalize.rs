//! Anchor id and link target normalization.

/// Accented Latin letters and their unaccented base letter.
const ACCENTS: &[(&str, char)] = &[
    ("ÀÁÂÃÄÅÆ", 'A'),
    ("àáâãäåæ", 'a'),
    ("ÈÉÊË", 'E'),
    ("èéêë", 'e'),
    ("ÌÍÎÏ", 'I'),
    ("ìíîï", 'i'),
    ("ÒÓÔÕÖØ", 'O'),
    ("òóôõöø", 'o'),
    ("ÙÚÛÜ", 'U'),
    ("ùúûü", 'u'),
    ("Ý", 'Y'),
    ("ýÿ", 'y'),
    ("Ñ", 'N'),
    ("ñ", 'n'),
    ("Ç", 'C'),
    ("ç", 'c'),
];

/// Separator placed between slug segments.
const SEPARATOR: char = '-';

fn fold_accent(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    ACCENTS
        .iter()
        .find(|(from, _)| from.contains(c))
        .map_or(c, |&(_, to)| to)
}

/// Turn heading or link text into a URL-safe slug.
///
/// Accented Latin letters are folded to their base letter, every run of
/// characters other than ASCII letters and digits becomes a single `-`,
/// and the result is lower-cased with no leading or trailing separator.
///
/// The function is idempotent: a slug normalizes to itself.
///
/// # Example
///
/// ```
/// use sd_renderer::normalize_id;
///
/// assert_eq!(normalize_id("Déjà vu: (again)"), "deja-vu-again");
/// assert_eq!(normalize_id("deja-vu-again"), "deja-vu-again");
/// ```
#[must_use]
pub fn normalize_id(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars().map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}
