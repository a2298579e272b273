//! Classifying decryption failures.
//!
//! A failed attempt has to be told apart: the key did not match, the
//! password was wrong, the message lacks integrity protection, or
//! the data is broken.  Errors are first matched by type.  Errors
//! that lost their type on the way, e.g. because a collaborator
//! rendered them into strings, are matched against a table of known
//! messages.

use std::io;

use crate::openpgp;

use crate::Error;

/// The kind of a decryption failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// The key cannot decrypt the message.
    KeyMismatch,
    /// The password or session key is wrong.
    WrongPassword,
    /// The message is not integrity protected.
    UnsecureMdc,
    /// The data is not a well-formed message.
    Format,
    /// Anything else.
    Unclassified,
}

use Category::*;

/// Known error messages.
///
/// The second column applies to key attempts, the third to password
/// attempts.
const KNOWN: &[(&str, Category, Category)] = &[
    ("Invalid password", WrongPassword, WrongPassword),
    ("Invalid session key", KeyMismatch, WrongPassword),
    ("Missing session key", KeyMismatch, WrongPassword),
    ("No session key", KeyMismatch, WrongPassword),
    ("session key has the wrong size", KeyMismatch, WrongPassword),
    ("checksum mismatch", KeyMismatch, WrongPassword),
    ("missing MDC", UnsecureMdc, UnsecureMdc),
    ("not integrity protected", UnsecureMdc, UnsecureMdc),
    ("Malformed Message", Format, Format),
    ("Malformed packet", Format, Format),
    ("Malformed MPI", Format, Format),
    ("Malformed armor", Format, Format),
    ("unexpected EOF", Format, Format),
    ("Unexpected EOF", Format, Format),
];

/// Classifies the failure of a decryption attempt.
///
/// `with_password` says whether the attempt used a password rather
/// than a key.
pub fn classify(error: &anyhow::Error, with_password: bool) -> Category {
    for cause in error.chain() {
        if let Some(c) = typed(cause, with_password) {
            return c;
        }
        // Errors raised inside readers travel wrapped in io::Error.
        if let Some(inner) = cause.downcast_ref::<io::Error>()
            .and_then(|e| e.get_ref())
        {
            if let Some(c) = typed(inner, with_password) {
                return c;
            }
        }
    }

    for cause in error.chain() {
        let text = cause.to_string();
        if let Some(c) = known(&text, with_password) {
            return c;
        }
    }

    Unclassified
}

/// Classifies an error message.
pub fn known(text: &str, with_password: bool) -> Option<Category> {
    KNOWN.iter()
        .find(|(needle, _, _)| text.contains(needle))
        .map(|(_, key, password)| if with_password { *password } else { *key })
}

fn typed(e: &(dyn std::error::Error + 'static), with_password: bool)
         -> Option<Category>
{
    let mismatch = if with_password { WrongPassword } else { KeyMismatch };

    if let Some(e) = e.downcast_ref::<Error>() {
        return match e {
            Error::NoMatchingKey(_) => Some(mismatch),
            Error::MissingMdc => Some(UnsecureMdc),
            Error::MalformedMessage(_) => Some(Format),
            _ => None,
        };
    }

    if let Some(e) = e.downcast_ref::<openpgp::Error>() {
        return match e {
            openpgp::Error::InvalidPassword => Some(WrongPassword),
            openpgp::Error::InvalidSessionKey(_)
                | openpgp::Error::MissingSessionKey(_) => Some(mismatch),
            openpgp::Error::MalformedMessage(_)
                | openpgp::Error::MalformedPacket(_)
                | openpgp::Error::MalformedMPI(_)
                | openpgp::Error::MalformedCert(_) => Some(Format),
            _ => None,
        };
    }

    None
}

/// Returns whether a verification failed because the message has
/// more than one literal data packet.
pub fn is_literal_limitation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(cause.downcast_ref::<Error>(),
                 Some(Error::MultipleLiteralPackets))
            || cause.to_string().contains("one literal data packet")
    })
}
