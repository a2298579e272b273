//! Tunables.
//!
//! The defaults match what real-world mail needs.  Applications that
//! keep settings on disk can embed a [`Config`] in their own settings
//! structure: all fields are optional when deserializing.

use serde::{Deserialize, Serialize};

/// Tunables of the armor scanner and the MIME heuristics.
///
/// # Example
///
/// ```
/// use sequoia_mail::Config;
///
/// let mut config = Config::default();
/// config.password_message_hosts.push("mail.example.org".into());
/// let scanner = sequoia_mail::scan::Scanner::new(&config);
/// # let _ = scanner;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of bytes after `-----BEGIN` that are examined to
    /// identify the kind of block.
    pub header_lookahead: usize,

    /// Maximum offset of a password message header inside the
    /// lookahead window.
    pub password_header_max_offset: usize,

    /// Hosts serving password protected messages.
    ///
    /// A password message ends with a link to one of these hosts.
    pub password_message_hosts: Vec<String>,

    /// Unnamed attachments smaller than this are hidden.
    pub hidden_attachment_max_size: usize,

    /// `.asc` attachments smaller than this are treated as messages.
    pub asc_message_max_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            header_lookahead: 40,
            password_header_max_offset: 15,
            password_message_hosts: vec![
                "flowcrypt.com".into(),
                "cryptup.org".into(),
            ],
            hidden_attachment_max_size: 100,
            asc_message_max_size: 100_000,
        }
    }
}
