//! The OpenPGP engine.
//!
//! The decryption orchestrator and the signature verifier only talk
//! to the [`Engine`] trait.  [`Sequoia`] implements it using
//! `sequoia-openpgp`; tests substitute scripted engines.

use std::io::Read;

use crate::openpgp;
use openpgp::cert::prelude::*;
use openpgp::crypto::{Password, SessionKey};
use openpgp::packet::{PKESK, SKESK};
use openpgp::packet::Tag;
use openpgp::parse::{PacketParser, PacketParserResult, Parse};
use openpgp::parse::stream::*;
use openpgp::policy::{Policy, StandardPolicy};
use openpgp::types::SymmetricAlgorithm;
use openpgp::{Fingerprint, Packet};

use crate::keys::UnlockedKey;
use crate::{Error, Longid, Result};

const P: &StandardPolicy = &StandardPolicy::new();

/// What a message is, at the outermost layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// An encrypted message.
    Encrypted,
    /// A signed, unencrypted message.
    Signed,
    /// Literal data, neither encrypted nor signed.
    Literal,
}

/// What can be learned about a message without decrypting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    /// The kind of message.
    pub kind: MessageKind,
    /// Whether this is a cleartext signed message.
    pub cleartext: bool,
    /// The recipients named in the message.
    ///
    /// Anonymous recipients are not listed.
    pub encrypted_for: Vec<Longid>,
    /// The issuers of the signatures visible without decrypting.
    pub signed_by: Vec<Longid>,
    /// Whether the session key is also encrypted with a password.
    pub password_protected: bool,
    /// Whether the encryption container detects modifications.
    pub integrity_protected: bool,
    /// Number of literal data packets visible without decrypting.
    pub literal_packets: usize,
}

/// The result of one signature check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureCheck {
    /// The key that made the signature, if known.
    pub issuer: Option<Longid>,
    /// Whether the signature is good.
    ///
    /// `None` if it could not be checked, e.g. because the
    /// certificate is missing.
    pub valid: Option<bool>,
    /// Why the check failed, if it did.
    pub error: Option<String>,
}

/// A decrypted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plaintext {
    /// The content of the literal data packet.
    pub content: Vec<u8>,
    /// Whether the message was integrity protected.
    pub integrity_protected: bool,
    /// The key that decrypted the session key, if any.
    pub decrypted_with: Option<Longid>,
    /// Checks of the signatures inside the encryption container.
    pub signatures: Vec<SignatureCheck>,
}

/// A verified message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verified {
    /// The signed content.
    pub content: Vec<u8>,
    /// One check per signature.
    pub checks: Vec<SignatureCheck>,
}

/// The cryptographic operations needed to process mail.
pub trait Engine {
    /// Looks at a message's packets without decrypting it.
    fn inspect(&self, data: &[u8]) -> Result<MessageInfo>;

    /// Decrypts a message using the given key.
    ///
    /// Signatures in the message are checked against `verify_with`.
    fn decrypt_with_key(&self, data: &[u8], key: &UnlockedKey,
                        verify_with: &[Cert])
                        -> Result<Plaintext>;

    /// Decrypts a message using a password.
    fn decrypt_with_password(&self, data: &[u8], password: &Password,
                             verify_with: &[Cert])
                             -> Result<Plaintext>;

    /// Verifies a signed message, or `data` using a detached
    /// signature.
    fn verify(&self, data: &[u8], detached: Option<&[u8]>, certs: &[Cert])
              -> Result<Verified>;

    /// Returns the content of a message's literal data packets
    /// without checking any signature.
    fn literal_data(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// An [`Engine`] backed by Sequoia.
pub struct Sequoia<'a> {
    policy: &'a dyn Policy,
}

impl Default for Sequoia<'static> {
    fn default() -> Self {
        Sequoia { policy: P }
    }
}

impl<'a> Sequoia<'a> {
    /// Creates an engine using the given policy.
    pub fn new(policy: &'a dyn Policy) -> Self {
        Sequoia { policy }
    }

    fn decrypt(&self, data: &[u8], helper: Helper) -> Result<Plaintext> {
        let info = self.inspect(data)?;
        if info.kind != MessageKind::Encrypted {
            return Err(Error::MalformedMessage(
                "Message is not encrypted".into()).into());
        }
        if ! info.integrity_protected {
            return Err(Error::MissingMdc.into());
        }

        let mut decryptor = DecryptorBuilder::from_bytes(data)?
            .with_policy(self.policy, None, helper)?;
        let mut content = Vec::new();
        decryptor.read_to_end(&mut content)?;
        let helper = decryptor.into_helper();

        Ok(Plaintext {
            content,
            integrity_protected: true,
            decrypted_with: helper.decrypted_with,
            signatures: helper.checks,
        })
    }
}

/// Returns whether `data` is a cleartext signed message.
fn is_cleartext(data: &[u8]) -> bool {
    let start = data.iter().position(|b| ! b.is_ascii_whitespace())
        .unwrap_or(data.len());
    data[start..].starts_with(b"-----BEGIN PGP SIGNED MESSAGE-----")
}

impl Engine for Sequoia<'_> {
    fn inspect(&self, data: &[u8]) -> Result<MessageInfo> {
        let malformed = |e: anyhow::Error| Error::MalformedMessage(e.to_string());

        let mut info = MessageInfo {
            kind: MessageKind::Literal,
            cleartext: is_cleartext(data),
            encrypted_for: Vec::new(),
            signed_by: Vec::new(),
            password_protected: false,
            integrity_protected: false,
            literal_packets: 0,
        };
        let mut encrypted = false;
        let mut signed = false;
        let mut packets = 0;

        let mut ppr = PacketParser::from_bytes(data).map_err(malformed)?;
        while let PacketParserResult::Some(pp) = ppr {
            packets += 1;

            match &pp.packet {
                Packet::PKESK(p) => {
                    let recipient = Longid::from(p.recipient());
                    if ! recipient.is_wildcard()
                        && ! info.encrypted_for.contains(&recipient)
                    {
                        info.encrypted_for.push(recipient);
                    }
                },
                Packet::SKESK(_) => info.password_protected = true,
                Packet::OnePassSig(ops) => {
                    signed = true;
                    let issuer = Longid::from(ops.issuer());
                    if ! issuer.is_wildcard()
                        && ! info.signed_by.contains(&issuer)
                    {
                        info.signed_by.push(issuer);
                    }
                },
                Packet::Signature(sig) => {
                    signed = true;
                    for issuer in sig.get_issuers() {
                        let issuer = Longid::from(issuer);
                        if ! info.signed_by.contains(&issuer) {
                            info.signed_by.push(issuer);
                        }
                    }
                },
                Packet::Literal(_) => info.literal_packets += 1,
                _ => (),
            }

            match pp.packet.tag() {
                Tag::SEIP | Tag::AED => {
                    encrypted = true;
                    info.integrity_protected = true;
                },
                Tag::SED => encrypted = true,
                Tag::PublicKey | Tag::SecretKey =>
                    return Err(Error::MalformedMessage(
                        "This is a key, not a message".into()).into()),
                _ => (),
            }

            ppr = pp.recurse().map_err(malformed)?.1;
        }

        if packets == 0 {
            return Err(Error::MalformedMessage(
                "No OpenPGP packets found".into()).into());
        }

        info.kind = if encrypted || ! info.encrypted_for.is_empty()
            || info.password_protected
        {
            MessageKind::Encrypted
        } else if signed {
            MessageKind::Signed
        } else if info.literal_packets > 0 {
            MessageKind::Literal
        } else {
            return Err(Error::MalformedMessage(
                "Neither encrypted, signed, nor literal data".into()).into());
        };

        Ok(info)
    }

    fn decrypt_with_key(&self, data: &[u8], key: &UnlockedKey,
                        verify_with: &[Cert])
                        -> Result<Plaintext>
    {
        self.decrypt(data, Helper::with_key(key, verify_with))
    }

    fn decrypt_with_password(&self, data: &[u8], password: &Password,
                             verify_with: &[Cert])
                             -> Result<Plaintext>
    {
        self.decrypt(data, Helper::with_password(password, verify_with))
    }

    fn verify(&self, data: &[u8], detached: Option<&[u8]>, certs: &[Cert])
              -> Result<Verified>
    {
        let helper = Helper::verifying(certs);

        if let Some(signature) = detached {
            let mut v = DetachedVerifierBuilder::from_bytes(signature)?
                .with_policy(self.policy, None, helper)?;
            v.verify_bytes(data)?;
            return Ok(Verified {
                content: data.to_vec(),
                checks: v.into_helper().checks,
            });
        }

        let info = self.inspect(data)?;
        if info.literal_packets > 1 {
            return Err(Error::MultipleLiteralPackets.into());
        }

        let mut v = VerifierBuilder::from_bytes(data)?
            .with_policy(self.policy, None, helper)?;
        let mut content = Vec::new();
        v.read_to_end(&mut content)?;
        Ok(Verified {
            content,
            checks: v.into_helper().checks,
        })
    }

    fn literal_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut ppr = PacketParser::from_bytes(data)?;
        while let PacketParserResult::Some(mut pp) = ppr {
            if let Packet::Literal(_) = pp.packet {
                pp.read_to_end(&mut content)?;
            }
            ppr = pp.recurse()?.1;
        }
        Ok(content)
    }
}

/// Drives Sequoia's streaming decryptor and verifier.
struct Helper<'a> {
    key: Option<&'a UnlockedKey>,
    password: Option<&'a Password>,
    certs: &'a [Cert],
    decrypted_with: Option<Longid>,
    checks: Vec<SignatureCheck>,
}

impl<'a> Helper<'a> {
    fn verifying(certs: &'a [Cert]) -> Self {
        Helper {
            key: None,
            password: None,
            certs,
            decrypted_with: None,
            checks: Vec::new(),
        }
    }

    fn with_key(key: &'a UnlockedKey, certs: &'a [Cert]) -> Self {
        Helper {
            key: Some(key),
            ..Self::verifying(certs)
        }
    }

    fn with_password(password: &'a Password, certs: &'a [Cert]) -> Self {
        Helper {
            password: Some(password),
            ..Self::verifying(certs)
        }
    }

    fn try_key<D>(&mut self, key: &UnlockedKey, pkesks: &[PKESK],
                  sym_algo: Option<SymmetricAlgorithm>, decrypt: &mut D)
                  -> Option<Fingerprint>
        where D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool
    {
        for pkesk in pkesks {
            let recipient = pkesk.recipient();
            for secret in &key.secrets {
                if ! recipient.is_wildcard() && *recipient != secret.keyid() {
                    continue;
                }

                let mut pair = match secret.clone().into_keypair() {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::debug!("Cannot use {}: {}", secret.keyid(), e);
                        continue;
                    }
                };

                if let Some((algo, sk)) = pkesk.decrypt(&mut pair, sym_algo) {
                    if decrypt(algo, &sk) {
                        self.decrypted_with = Some(secret.keyid().into());
                        return Some(key.fingerprint.clone());
                    }
                }
            }
        }
        None
    }
}

impl VerificationHelper for Helper<'_> {
    fn get_certs(&mut self, _ids: &[openpgp::KeyHandle])
                 -> openpgp::Result<Vec<Cert>>
    {
        Ok(self.certs.to_vec())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        for layer in structure.into_iter() {
            if let MessageLayer::SignatureGroup { results } = layer {
                self.checks.extend(results.into_iter().map(check_of));
            }
        }
        Ok(())
    }
}

impl DecryptionHelper for Helper<'_> {
    fn decrypt<D>(&mut self, pkesks: &[PKESK], skesks: &[SKESK],
                  sym_algo: Option<SymmetricAlgorithm>, mut decrypt: D)
                  -> openpgp::Result<Option<Fingerprint>>
        where D: FnMut(SymmetricAlgorithm, &SessionKey) -> bool
    {
        if let Some(key) = self.key {
            return match self.try_key(key, pkesks, sym_algo, &mut decrypt) {
                Some(fp) => Ok(Some(fp)),
                None => Err(Error::NoMatchingKey(key.longid.to_string()).into()),
            };
        }

        if let Some(password) = self.password {
            if skesks.is_empty() {
                return Err(Error::NoMatchingKey("password".into()).into());
            }
            for skesk in skesks {
                if let Ok((algo, sk)) = skesk.decrypt(password) {
                    if decrypt(algo, &sk) {
                        return Ok(None);
                    }
                }
            }
            return Err(openpgp::Error::InvalidPassword.into());
        }

        Err(Error::NoMatchingKey("no key given".into()).into())
    }
}

fn issuer_of(sig: &openpgp::packet::Signature) -> Option<Longid> {
    sig.get_issuers().first().map(Longid::from)
}

fn check_of(result: VerificationResult) -> SignatureCheck {
    match result {
        Ok(GoodChecksum { ka, .. }) => SignatureCheck {
            issuer: Some(ka.key().keyid().into()),
            valid: Some(true),
            error: None,
        },
        Err(VerificationError::MissingKey { sig, .. }) => SignatureCheck {
            issuer: issuer_of(sig),
            valid: None,
            error: None,
        },
        Err(VerificationError::BadSignature { ka, error, .. }) =>
            SignatureCheck {
                issuer: Some(ka.key().keyid().into()),
                valid: Some(false),
                error: Some(error.to_string()),
            },
        Err(VerificationError::MalformedSignature { sig, error, .. }) =>
            SignatureCheck {
                issuer: issuer_of(sig),
                valid: Some(false),
                error: Some(error.to_string()),
            },
        Err(VerificationError::UnboundKey { sig, error, .. }) =>
            SignatureCheck {
                issuer: issuer_of(sig),
                valid: None,
                error: Some(error.to_string()),
            },
        Err(VerificationError::BadKey { ka, error, .. }) => SignatureCheck {
            issuer: Some(ka.key().keyid().into()),
            valid: None,
            error: Some(error.to_string()),
        },
        #[allow(unreachable_patterns)]
        Err(e) => SignatureCheck {
            issuer: None,
            valid: None,
            error: Some(e.to_string()),
        },
    }
}
