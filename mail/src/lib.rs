//! Finding, decrypting and verifying OpenPGP data in mail.
//!
//! Mail that went through webmail providers, mailing lists and a
//! zoo of desktop clients rarely contains clean OpenPGP data.
//! Armored blocks are quoted, surrounded by prose, cut off by size
//! limits, have their newlines doubled or their dashes replaced by
//! typographic ones.  This crate deals with that mess, and then with
//! the question of which of the user's keys can actually open the
//! message.
//!
//! # Scope
//!
//! This crate implements the message processing core of a mail user
//! agent:
//!
//!   - [`scan`] finds armored blocks in arbitrary text,
//!   - [`normalize`] repairs blocks mangled in transit,
//!   - [`mime`] picks bodies, signatures and attachments out of an
//!     already parsed MIME tree,
//!   - [`keys`] decides which private keys to try and which
//!     certificates to verify with,
//!   - [`decrypt`] drives the decryption attempts and classifies
//!     their failures, and
//!   - [`verify`] checks signatures.
//!
//! Storage of keys and passphrases, MIME parsing, network lookups and
//! rendering are left to the caller, who plugs them in through the
//! traits in [`keys`], [`mime`] and [`report`].
//!
//! # Example
//!
//! ```
//! use sequoia_mail::scan::{self, Kind};
//!
//! let scan = scan::scan_blocks("hello\n\
//!     -----BEGIN PGP MESSAGE-----\nabc\n-----END PGP MESSAGE-----\nbye")?;
//! let kinds: Vec<Kind> = scan.blocks.iter().map(|b| b.kind).collect();
//! assert_eq!(kinds, [Kind::Text, Kind::Message, Kind::Text]);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![doc(html_favicon_url = "https://docs.sequoia-pgp.org/favicon.png")]
#![doc(html_logo_url = "https://docs.sequoia-pgp.org/logo.svg")]
#![warn(missing_docs)]

pub use sequoia_openpgp as openpgp;

pub mod classify;
pub mod config;
pub mod decrypt;
pub mod engine;
pub mod keyid;
pub mod keys;
pub mod mime;
pub mod normalize;
pub mod report;
pub mod scan;
pub mod verify;

pub use crate::config::Config;
pub use crate::keyid::Longid;

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors returned by this crate.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The armor scanner failed to make progress.
    ///
    /// This indicates a bug in the scanner, not bad input.
    #[error("Armor scan stalled: next offset {next} <= current offset {at}")]
    ScanStalled {
        /// The offset the scan was at.
        at: usize,
        /// The offset the scan wanted to continue at.
        next: usize,
    },

    /// A key identifier could not be parsed.
    #[error("Invalid key identifier: {0}")]
    InvalidLongid(String),

    /// The data does not look like an OpenPGP message.
    #[error("Malformed Message: {0}")]
    MalformedMessage(String),

    /// The message uses encryption without a modification detection
    /// code.
    #[error("Message is not integrity protected (missing MDC)")]
    MissingMdc,

    /// The message contains more than one literal data packet.
    #[error("can only verify message with one literal data packet")]
    MultipleLiteralPackets,

    /// None of the session keys could be decrypted with the given key.
    #[error("No session key for {0}")]
    NoMatchingKey(String),
}
