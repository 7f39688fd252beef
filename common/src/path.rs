//! Lexical containment checks for caller-supplied relative paths.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Normalises `relative` without touching the filesystem.
///
/// `.` segments are dropped and `..` segments pop the preceding segment.
/// Returns `None` when the path is absolute, carries a platform prefix, or
/// climbs above the implicit root.
///
/// # Examples
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use h5pack_common::contained_relative;
///
/// assert_eq!(
///     contained_relative(Utf8Path::new("content/./images/../content.json")),
///     Some(Utf8PathBuf::from("content/content.json")),
/// );
/// assert_eq!(contained_relative(Utf8Path::new("../../etc/passwd")), None);
/// ```
#[must_use]
pub fn contained_relative(relative: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for component in relative.components() {
        match component {
            Utf8Component::Normal(part) => parts.push(part),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                parts.pop()?;
            }
            Utf8Component::RootDir | Utf8Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().collect())
}

/// Returns `true` when `segment` can be used as a single directory name.
///
/// Rejects empty strings, `.` and `..`, separators of either platform, and
/// NUL bytes.
#[must_use]
pub fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
