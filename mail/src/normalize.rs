//! Repairing armor mangled in transit.
//!
//! Webmail editors replace spaces with non-breaking spaces, turn
//! `-----` into typographic dashes, and double or triple newlines
//! when converting between HTML and text.  The functions in this
//! module undo that, as far as it can be undone.

use lazy_static::lazy_static;
use regex::Regex;

use crate::scan::Kind;

lazy_static! {
    static ref DASHES: Regex =
        Regex::new("(?m)^\u{2014}\u{2013}|\u{2014}\u{2013}$").unwrap();
    static ref TRAILING_SPACES: Regex = Regex::new(" +\n").unwrap();
    static ref CLIP: Regex = Regex::new(
        r"(?s)-----BEGIN PGP (?:MESSAGE|SIGNED MESSAGE|SIGNATURE|PUBLIC KEY BLOCK)-----.+?-----END PGP (?:MESSAGE|SIGNATURE|PUBLIC KEY BLOCK)-----")
        .unwrap();
}

/// Undoes whitespace and dash mangling.
///
/// Non-breaking spaces become spaces, spaces before a newline are
/// dropped, and an em dash followed by an en dash at the
/// start or end of a line becomes `-----`.
pub fn normalize_spaces(text: &str) -> String {
    let text = text.replace('\u{a0}', " ");
    let text = DASHES.replace_all(&text, "-----");
    TRAILING_SPACES.replace_all(&text, "\n").into_owned()
}

/// Repairs an armored block of the given kind.
///
/// On top of [`normalize_spaces`], messages and keys get their line
/// structure restored: CRLF becomes LF, and if every newline appears
/// to have been doubled or tripled, the extra newlines are removed.
/// The heuristic looks at the one blank line an armored block has,
/// after the headers.  Doubling turns it into the only run of four
/// newlines, tripling into the only run of six.
///
/// ```
/// use sequoia_mail::normalize::normalize;
/// use sequoia_mail::scan::Kind;
///
/// let doubled = "-----BEGIN PGP MESSAGE-----\n\n\n\nwy4E\n\n=abcd\n\n\
///                -----END PGP MESSAGE-----";
/// assert_eq!(normalize(doubled, Kind::Message),
///            "-----BEGIN PGP MESSAGE-----\n\nwy4E\n=abcd\n\
///             -----END PGP MESSAGE-----");
/// ```
pub fn normalize(armored: &str, kind: Kind) -> String {
    let armored = normalize_spaces(armored);
    match kind {
        Kind::Message | Kind::PublicKey | Kind::PrivateKey => (),
        _ => return armored,
    }

    let armored = armored.replace("\r\n", "\n");
    let armored = armored.trim();

    let runs = |n: usize| armored.matches(&"\n".repeat(n)[..]).count();
    let (nl2, nl3, nl4, nl6) = (runs(2), runs(3), runs(4), runs(6));

    if nl3 > 1 && nl6 == 1 {
        armored.replace("\n\n\n", "\n")
    } else if nl2 > 1 && nl4 == 1 {
        armored.replace("\n\n", "\n")
    } else {
        armored.into()
    }
}

/// Returns the first armored message, signature or public key in
/// `text`.
///
/// A block ends at the first matching footer.
///
/// ```
/// use sequoia_mail::normalize::clip;
///
/// let text = "> quoted\n> -----BEGIN PGP MESSAGE-----\n> abc\n\
///             > -----END PGP MESSAGE-----\n> more";
/// assert_eq!(clip(text),
///            Some("-----BEGIN PGP MESSAGE-----\n> abc\n> -----END PGP MESSAGE-----"));
/// assert_eq!(clip("no armor here"), None);
/// ```
pub fn clip(text: &str) -> Option<&str> {
    if ! text.contains("-----BEGIN") || ! text.contains("-----END") {
        return None;
    }
    CLIP.find(text).map(|m| m.as_str())
}
