//! Choosing keys.
//!
//! Before decrypting, the user agent has to decide which of the
//! user's private keys to try, whether it has their passphrases, and
//! which contacts' certificates to check signatures with.  Keys and
//! passphrases live in the application's storage, which is accessed
//! through [`KeyStore`] and [`ContactStore`].

use std::collections::HashMap;

use crate::openpgp;
use openpgp::cert::prelude::*;
use openpgp::crypto::Password;
use openpgp::packet::key;
use openpgp::packet::Key;
use openpgp::parse::Parse;
use openpgp::policy::{Policy, StandardPolicy};
use openpgp::Fingerprint;

use crate::engine::MessageInfo;
use crate::{Longid, Result};

const P: &StandardPolicy = &StandardPolicy::new();

/// A private key as kept by the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    /// The primary key's identifier.
    pub longid: Longid,
    /// The primary key's fingerprint, as hex.
    pub fingerprint: String,
    /// The armored transferable secret key.
    pub armored_private: String,
    /// The armored certificate.
    pub armored_public: String,
    /// Whether this is the account's primary key.
    pub is_primary: bool,
}

/// A contact's certificate as kept by the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    /// The contact's address.
    pub email: String,
    /// The armored certificate.
    pub pubkey_armored: String,
    /// The certificate's primary key identifier.
    pub longid: Longid,
}

/// Access to the user's private keys and stored passphrases.
pub trait KeyStore {
    /// Returns the private keys of `account`.
    fn private_keys(&self, account: &str) -> Result<Vec<KeyInfo>>;

    /// Returns the stored passphrase of the given key, if any.
    fn passphrase(&self, account: &str, longid: &Longid)
                  -> Result<Option<Password>>;
}

/// Access to contacts' certificates.
pub trait ContactStore {
    /// Looks up contacts by key identifier.
    ///
    /// Returns one entry per identifier, in order.  Identifiers of
    /// subkeys must be resolved too.
    fn contacts_by_longid(&self, longids: &[Longid])
                          -> Result<Vec<Option<Contact>>>;
}

/// Passphrases entered during this session.
///
/// These take precedence over stored passphrases and are never
/// persisted.
#[derive(Default)]
pub struct SessionPassphrases {
    passphrases: HashMap<Longid, Password>,
}

impl SessionPassphrases {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers the passphrase of a key.
    pub fn insert(&mut self, longid: Longid, passphrase: Password) {
        self.passphrases.insert(longid, passphrase);
    }

    /// Returns the passphrase of a key.
    pub fn get(&self, longid: &Longid) -> Option<&Password> {
        self.passphrases.get(longid)
    }

    /// Forgets the passphrase of a key.
    pub fn remove(&mut self, longid: &Longid) -> Option<Password> {
        self.passphrases.remove(longid)
    }
}

/// A private key ready for decryption.
#[derive(Clone, Debug)]
pub struct UnlockedKey {
    /// The primary key's identifier.
    pub longid: Longid,
    /// The primary key's fingerprint.
    pub fingerprint: Fingerprint,
    /// The certificate.
    pub cert: Cert,
    /// The unencrypted encryption-capable secret keys.
    pub secrets: Vec<Key<key::SecretParts, key::UnspecifiedRole>>,
}

impl UnlockedKey {
    /// Unlocks the encryption-capable secret keys of `cert`.
    ///
    /// Fails if there is no secret key material, or if it is
    /// encrypted and `passphrase` does not unlock it.  Expired keys
    /// are included: old mail was encrypted to them.
    pub fn new(cert: Cert, passphrase: Option<&Password>, policy: &dyn Policy)
               -> Result<Self>
    {
        if ! cert.is_tsk() {
            return Err(anyhow::anyhow!("{} has no secret key material",
                                       cert.fingerprint()));
        }

        let mut secrets = Vec::new();
        for ka in cert.keys().with_policy(policy, None).secret()
            .for_transport_encryption().for_storage_encryption()
        {
            let key = ka.key().clone();
            if key.secret().is_encrypted() {
                let passphrase = passphrase.ok_or_else(|| {
                    anyhow::anyhow!("{} is locked", key.keyid())
                })?;
                secrets.push(key.decrypt_secret(passphrase)?);
            } else {
                secrets.push(key);
            }
        }

        Ok(UnlockedKey {
            longid: cert.keyid().into(),
            fingerprint: cert.fingerprint(),
            cert,
            secrets,
        })
    }

    /// Returns whether one of the certificate's keys has the given
    /// identifier.
    pub fn has(&self, longid: &Longid) -> bool {
        holds(&self.cert, longid)
    }
}

/// A candidate key whose passphrase is missing or wrong.
#[derive(Clone, Debug)]
pub struct LockedKey {
    /// The primary key's identifier.
    pub longid: Longid,
    /// The certificate.
    pub cert: Cert,
}

/// A contact together with the parsed certificate.
#[derive(Clone, Debug)]
pub struct VerificationKey {
    /// The contact.
    pub contact: Contact,
    /// The contact's certificate.
    pub cert: Cert,
}

impl VerificationKey {
    /// Returns whether one of the certificate's keys has the given
    /// identifier.
    pub fn has(&self, longid: &Longid) -> bool {
        holds(&self.cert, longid)
    }
}

fn holds(cert: &Cert, longid: &Longid) -> bool {
    cert.keys().any(|ka| Longid::from(ka.key().keyid()) == *longid)
}

/// The keys that are relevant for one message.
#[derive(Clone, Debug, Default)]
pub struct CandidateKeySet {
    /// The recipients named in the message.
    pub encrypted_for: Vec<Longid>,
    /// The signers named in the message.
    pub signed_by: Vec<Longid>,
    /// The private keys that might decrypt the message, as primary
    /// key identifiers.
    pub candidates: Vec<Longid>,
    /// The candidates that are ready to use, in candidate order.
    pub unlocked: Vec<UnlockedKey>,
    /// The candidates that need a passphrase.
    pub locked: Vec<LockedKey>,
    /// The certificates of known signers.
    pub verification_keys: Vec<VerificationKey>,
}

impl CandidateKeySet {
    /// Returns the identifiers of the keys that need a passphrase.
    pub fn missing_passphrase(&self) -> Vec<Longid> {
        self.locked.iter().map(|k| k.longid.clone()).collect()
    }
}

/// Builds [`CandidateKeySet`]s.
pub struct Selector<'a> {
    keys: &'a dyn KeyStore,
    contacts: &'a dyn ContactStore,
    session: &'a SessionPassphrases,
    policy: &'a dyn Policy,
}

impl<'a> Selector<'a> {
    /// Creates a selector using the given storage.
    pub fn new(keys: &'a dyn KeyStore, contacts: &'a dyn ContactStore,
               session: &'a SessionPassphrases)
               -> Self
    {
        Selector { keys, contacts, session, policy: P }
    }

    /// Changes the policy used to find encryption-capable keys.
    pub fn policy(mut self, policy: &'a dyn Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects the keys for a message sent to `account`.
    ///
    /// Private keys holding one of the message's recipients are
    /// candidates.  If there are none, e.g. because the recipients
    /// are hidden, all private keys are.  Keys that fail to parse are
    /// skipped.
    pub fn select(&self, account: &str, message: &MessageInfo)
                  -> Result<CandidateKeySet>
    {
        let mut set = CandidateKeySet {
            encrypted_for: message.encrypted_for.clone(),
            signed_by: message.signed_by.clone(),
            ..Default::default()
        };

        let mut local = Vec::new();
        for info in self.keys.private_keys(account)? {
            match Cert::from_bytes(info.armored_private.as_bytes()) {
                Ok(cert) => local.push((info, cert)),
                Err(e) => log::warn!("Skipping corrupt key {}: {}",
                                     info.longid, e),
            }
        }

        let matching: Vec<&(KeyInfo, Cert)> = local.iter()
            .filter(|(_, cert)| set.encrypted_for.iter()
                    .any(|id| holds(cert, id)))
            .collect();
        let candidates = if matching.is_empty() {
            if ! set.encrypted_for.is_empty() {
                log::debug!("No key matches {:?}, trying all",
                            set.encrypted_for);
            }
            local.iter().collect()
        } else {
            matching
        };

        for (info, cert) in candidates {
            set.candidates.push(info.longid.clone());

            let stored;
            let passphrase = match self.session.get(&info.longid) {
                Some(p) => Some(p),
                None => {
                    stored = self.keys.passphrase(account, &info.longid)?;
                    stored.as_ref()
                },
            };

            match UnlockedKey::new(cert.clone(), passphrase, self.policy) {
                Ok(key) => set.unlocked.push(key),
                Err(e) => {
                    log::debug!("Cannot unlock {}: {}", info.longid, e);
                    set.locked.push(LockedKey {
                        longid: info.longid.clone(),
                        cert: cert.clone(),
                    });
                },
            }
        }

        set.verification_keys = self.verification_keys(&set.signed_by)?;
        Ok(set)
    }

    /// Looks up the certificates of the given signers.
    pub fn verification_keys(&self, signed_by: &[Longid])
                             -> Result<Vec<VerificationKey>>
    {
        if signed_by.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys: Vec<VerificationKey> = Vec::new();
        for contact in self.contacts.contacts_by_longid(signed_by)?
            .into_iter().flatten()
        {
            let cert = match Cert::from_bytes(contact.pubkey_armored.as_bytes())
            {
                Ok(cert) => cert,
                Err(e) => {
                    log::warn!("Skipping corrupt certificate of {}: {}",
                               contact.email, e);
                    continue;
                },
            };
            if keys.iter().all(|k| k.cert.fingerprint() != cert.fingerprint()) {
                keys.push(VerificationKey { contact, cert });
            }
        }
        Ok(keys)
    }
}

/// Parses a [`KeyInfo`] out of an armored transferable secret key.
pub fn key_info(armored_private: &str, is_primary: bool) -> Result<KeyInfo> {
    use openpgp::serialize::SerializeInto;

    let cert = Cert::from_bytes(armored_private.as_bytes())?;
    if ! cert.is_tsk() {
        return Err(anyhow::anyhow!("{} has no secret key material",
                                   cert.fingerprint()));
    }

    let armored_public = String::from_utf8(cert.armored().to_vec()?)?;
    Ok(KeyInfo {
        longid: cert.keyid().into(),
        fingerprint: cert.fingerprint().to_hex(),
        armored_private: armored_private.into(),
        armored_public,
        is_primary,
    })
}

/// Makes a [`Contact`] out of an armored certificate.
///
/// The address is taken from the primary user id, if any.
pub fn contact(pubkey_armored: &str) -> Result<Contact> {
    let cert = Cert::from_bytes(pubkey_armored.as_bytes())?;
    let email = cert.userids()
        .find_map(|u| u.email().ok().flatten())
        .unwrap_or_default();
    Ok(Contact {
        email,
        pubkey_armored: pubkey_armored.into(),
        longid: cert.keyid().into(),
    })
}
