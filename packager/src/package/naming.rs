//! Package file naming.

/// Extension of package archives, including the dot.
pub const PACKAGE_EXTENSION: &str = ".h5p";

const FALLBACK_SLUG: &str = "activity";

/// Converts `title` into a lowercase, hyphen-separated slug.
///
/// Runs of characters other than ASCII letters and digits collapse into a
/// single hyphen; leading and trailing hyphens are trimmed. A title with no
/// usable characters yields `activity`.
///
/// # Examples
///
/// ```
/// use h5pack_packager::package::slugify;
///
/// assert_eq!(slugify("GNPEC Policy Match"), "gnpec-policy-match");
/// assert_eq!(slugify("  ¿Qué?  "), "qu");
/// assert_eq!(slugify("!!!"), "activity");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        FALLBACK_SLUG.to_owned()
    } else {
        slug
    }
}

/// Suggested archive file name for a package titled `title`.
#[must_use]
pub fn package_filename(title: &str) -> String {
    format!("{}{PACKAGE_EXTENSION}", slugify(title))
}
