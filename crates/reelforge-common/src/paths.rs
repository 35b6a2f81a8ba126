//! File-name helpers shared by the crawler types.
//!
//! These are used while scanning directories: names with illegal characters
//! are rejected, and frame numbers are split off image sequence members.

use std::sync::LazyLock;

use regex::Regex;

/// Characters that may not appear in a crawlable file name.
const ILLEGAL_CHARACTERS: &[char] = &['*', '?', '"', '<', '>', '|', '\\'];

/// `<name>.<frame digits>.<ext>`
static SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+)\.(?P<frame>-?\d+)\.(?P<ext>[^.]+)$").expect("valid sequence regex")
});

/// A file name split into its sequence components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceName {
    /// Base name without frame number and extension.
    pub name: String,
    /// Frame number.
    pub frame: i64,
    /// Number of digits used to write the frame.
    pub padding: usize,
    /// Extension without the dot.
    pub ext: String,
}

/// Check whether a file name contains characters the scanner refuses.
///
/// # Examples
///
/// ```
/// use reelforge_common::paths::has_illegal_characters;
///
/// assert!(!has_illegal_characters("shot_010_plate.1001.exr"));
/// assert!(has_illegal_characters("what?.exr"));
/// ```
pub fn has_illegal_characters(name: &str) -> bool {
    name.chars()
        .any(|c| c.is_control() || ILLEGAL_CHARACTERS.contains(&c))
}

/// Split `name.1001.exr` style file names.
///
/// Returns `None` for names without a numeric frame component.
///
/// # Examples
///
/// ```
/// use reelforge_common::paths::parse_sequence_name;
///
/// let parsed = parse_sequence_name("plate.0042.dpx").unwrap();
/// assert_eq!(parsed.name, "plate");
/// assert_eq!(parsed.frame, 42);
/// assert_eq!(parsed.padding, 4);
/// ```
pub fn parse_sequence_name(base_name: &str) -> Option<SequenceName> {
    let caps = SEQUENCE_RE.captures(base_name)?;
    let frame_text = caps.name("frame")?.as_str();
    let frame = frame_text.parse().ok()?;
    Some(SequenceName {
        name: caps["name"].to_string(),
        frame,
        padding: frame_text.trim_start_matches('-').len(),
        ext: caps["ext"].to_lowercase(),
    })
}

/// Strip the extension (last dot component) from a base name.
pub fn strip_extension(base_name: &str) -> &str {
    match base_name.rfind('.') {
        Some(0) | None => base_name,
        Some(idx) => &base_name[..idx],
    }
}
