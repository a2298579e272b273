//! Verifying signatures.
//!
//! Checks a message's signatures against the certificates of known
//! signers and condenses the individual checks into one
//! [`SignatureResult`] for display.

use crate::classify::is_literal_limitation;
use crate::engine::{Engine, SignatureCheck};
use crate::keys::{Contact, VerificationKey};
use crate::openpgp::Cert;
use crate::report::Reporter;
use crate::{Longid, Result};

/// Shown when a message cannot be verified because it has more than
/// one literal data packet.
pub const LITERAL_LIMITATION: &str =
    "Verification of messages with more than one literal data packet \
     is not supported";

/// Shown when verification failed for an unknown reason.
pub const VERIFICATION_TROUBLE: &str =
    "There was a problem verifying this signature";

/// The outcome of verifying a message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureResult {
    /// The key that made the first signature.
    pub signer: Option<Longid>,
    /// The contact owning the signer's certificate, if known.
    pub contact: Option<Contact>,
    /// Whether the signatures are good.
    ///
    /// `Some(false)` if any signature is bad, `Some(true)` if at
    /// least one is good and none is bad, and `None` if nothing could
    /// be checked.
    pub valid: Option<bool>,
    /// A message for the user, if verification failed.
    pub error: Option<String>,
}

impl SignatureResult {
    /// Returns whether this result is conclusive.
    pub fn is_conclusive(&self) -> bool {
        self.valid.is_some()
    }
}

/// Condenses individual checks.
///
/// The contact is `contact` if given, otherwise the owner of the
/// signer's key among `keys`.
pub fn combine(checks: &[SignatureCheck], keys: &[VerificationKey],
               contact: Option<&Contact>)
               -> SignatureResult
{
    let signer = checks.iter().find_map(|c| c.issuer.clone());

    let valid = if checks.iter().any(|c| c.valid == Some(false)) {
        Some(false)
    } else if checks.iter().any(|c| c.valid == Some(true)) {
        Some(true)
    } else {
        None
    };

    let contact = contact.cloned().or_else(|| {
        let signer = signer.as_ref()?;
        keys.iter().find(|k| k.has(signer)).map(|k| k.contact.clone())
    });

    let error = if valid == Some(false) {
        checks.iter().find(|c| c.valid == Some(false))
            .and_then(|c| c.error.clone())
    } else {
        None
    };

    SignatureResult { signer, contact, valid, error }
}

/// Checks signatures using an [`Engine`].
pub struct Verifier<'a> {
    engine: &'a dyn Engine,
    reporter: &'a dyn Reporter,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier.
    pub fn new(engine: &'a dyn Engine, reporter: &'a dyn Reporter) -> Self {
        Verifier { engine, reporter }
    }

    /// Verifies `data`, or `data` against a `detached` signature.
    ///
    /// Every certificate in `keys` is tried.  Without certificates
    /// the result is inconclusive.  Verification errors end up in
    /// the result, they are not returned.
    pub fn verify(&self, data: &[u8], detached: Option<&[u8]>,
                  keys: &[VerificationKey], contact: Option<&Contact>)
                  -> SignatureResult
    {
        if keys.is_empty() {
            return SignatureResult::default();
        }

        let mut checks = Vec::new();
        for key in keys {
            match self.engine.verify(data, detached,
                                     std::slice::from_ref(&key.cert)) {
                Ok(verified) => checks.extend(verified.checks),
                Err(e) => return self.failure(e, contact),
            }
        }

        combine(&checks, keys, contact)
    }

    /// Verifies a signed message and returns its content.
    ///
    /// The engine is called once per certificate in `keys`, or once
    /// without certificates if there are none, and the content is
    /// taken from the first call.  A message that cannot be verified
    /// because it has more than one literal data packet is still
    /// read.  Errors that leave no content to show are returned.
    pub fn verify_inline(&self, data: &[u8], keys: &[VerificationKey],
                         contact: Option<&Contact>)
                         -> Result<(Vec<u8>, SignatureResult)>
    {
        let certs: Vec<&[Cert]> = if keys.is_empty() {
            vec![&[] as &[Cert]]
        } else {
            keys.iter().map(|k| std::slice::from_ref(&k.cert)).collect()
        };

        let mut content = None;
        let mut checks = Vec::new();
        for certs in certs {
            match self.engine.verify(data, None, certs) {
                Ok(verified) => {
                    if content.is_none() {
                        content = Some(verified.content);
                    }
                    checks.extend(verified.checks);
                },
                Err(e) if is_literal_limitation(&e) => {
                    let content = self.engine.literal_data(data)?;
                    return Ok((content, self.failure(e, contact)));
                },
                Err(e) => match content {
                    Some(content) =>
                        return Ok((content, self.failure(e, contact))),
                    None => return Err(e),
                },
            }
        }

        let result = if keys.is_empty() {
            SignatureResult::default()
        } else {
            combine(&checks, keys, contact)
        };
        Ok((content.unwrap_or_default(), result))
    }

    fn failure(&self, error: anyhow::Error, contact: Option<&Contact>)
               -> SignatureResult
    {
        let message = if is_literal_limitation(&error) {
            LITERAL_LIMITATION
        } else {
            self.reporter.report("verify", &error);
            VERIFICATION_TROUBLE
        };

        SignatureResult {
            signer: None,
            contact: contact.cloned(),
            valid: None,
            error: Some(message.into()),
        }
    }
}
