//! Decrypting messages.
//!
//! The [`Decryptor`] tries the candidate keys one after another, or
//! the password if one is given, and stops at the first success.
//! Failed attempts are classified and counted, so that the user can
//! be told whether a passphrase is missing, the password is wrong, or
//! the message is simply broken.
//!
//! # Example
//!
//! ```no_run
//! use sequoia_mail::decrypt::{DecryptResult, Decryptor};
//! use sequoia_mail::engine::Sequoia;
//! use sequoia_mail::keys::{CandidateKeySet, UnlockedKey};
//! use sequoia_mail::report::LogReporter;
//! # use sequoia_mail::openpgp::{Cert, policy::StandardPolicy};
//! # fn f(cert: Cert, ciphertext: &[u8]) -> anyhow::Result<()> {
//!
//! let keys = CandidateKeySet {
//!     unlocked: vec![UnlockedKey::new(cert, None, &StandardPolicy::new())?],
//!     ..Default::default()
//! };
//!
//! let engine = Sequoia::default();
//! match Decryptor::new(&engine, &LogReporter).decrypt(ciphertext, &keys, None) {
//!     DecryptResult::Success(s) =>
//!         println!("{}", String::from_utf8_lossy(&s.content)),
//!     DecryptResult::Failure(f) =>
//!         eprintln!("{} attempts failed", f.counters.attempts_executed),
//! }
//! # Ok(()) }
//! ```

use crate::openpgp;
use openpgp::crypto::Password;
use openpgp::Cert;

use crate::classify::{classify, Category};
use crate::engine::{Engine, MessageInfo, MessageKind, Plaintext};
use crate::keys::{CandidateKeySet, Selector, UnlockedKey, VerificationKey};
use crate::report::Reporter;
use crate::verify::{combine, SignatureResult, Verifier};
use crate::{Longid, Result};

/// What happened during a decryption.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Number of candidate keys.
    pub keys_considered: usize,
    /// Number of attempts to be made.
    pub attempts_planned: usize,
    /// Number of attempts made.
    pub attempts_executed: usize,
    /// Number of successful attempts.
    pub successes: usize,
    /// Attempts failing because the key did not match.
    pub key_mismatch: usize,
    /// Attempts failing because of a wrong password.
    pub wrong_password: usize,
    /// Attempts failing because the message is not integrity
    /// protected.
    pub unsecure_mdc: usize,
    /// Attempts failing because the message is malformed.
    pub format_error: usize,
}

/// A decrypted or verified message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Success {
    /// The content.
    pub content: Vec<u8>,
    /// The result of checking the signatures, if the message was
    /// signed.
    pub signature: Option<SignatureResult>,
    /// Whether the message lacked integrity protection.
    pub unsecure_mdc: bool,
    /// The key that decrypted the message.
    pub decrypted_with: Option<Longid>,
    /// What happened on the way.
    pub counters: Counters,
}

/// Why a message could not be decrypted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Failure {
    /// What happened on the way.
    pub counters: Counters,
    /// Candidate keys whose passphrase is missing.
    pub missing_passphrase: Vec<Longid>,
    /// The recipients named in the message.
    pub encrypted_for: Vec<Longid>,
    /// Errors that could not be classified.
    pub errors: Vec<String>,
    /// Set if the data is not a well-formed message.
    pub format_error: Option<String>,
}

/// The outcome of [`Decryptor::decrypt`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecryptResult {
    /// The message was decrypted, or was not encrypted.
    Success(Success),
    /// The message could not be decrypted.
    Failure(Failure),
}

impl DecryptResult {
    /// Returns the counters.
    pub fn counters(&self) -> &Counters {
        match self {
            DecryptResult::Success(s) => &s.counters,
            DecryptResult::Failure(f) => &f.counters,
        }
    }

    /// Returns whether decryption succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, DecryptResult::Success(_))
    }
}

#[derive(Clone, Copy)]
enum Attempt<'a> {
    Key(&'a UnlockedKey),
    Password(&'a Password),
}

/// Drives decryption attempts.
pub struct Decryptor<'a> {
    engine: &'a dyn Engine,
    reporter: &'a dyn Reporter,
}

impl<'a> Decryptor<'a> {
    /// Creates a decryptor.
    pub fn new(engine: &'a dyn Engine, reporter: &'a dyn Reporter) -> Self {
        Decryptor { engine, reporter }
    }

    /// Decrypts `data` using the given keys, or `password`.
    ///
    /// If a password is given, it is the only attempt.  Messages that
    /// are merely signed are verified instead.
    pub fn decrypt(&self, data: &[u8], keys: &CandidateKeySet,
                   password: Option<&Password>)
                   -> DecryptResult
    {
        match self.engine.inspect(data) {
            Ok(info) =>
                self.decrypt_inspected(data, &info, keys, password,
                                       &mut |_: &[Longid]| Vec::new()),
            Err(e) => Self::malformed(keys, e),
        }
    }

    /// Inspects `data`, selects keys and decrypts.
    ///
    /// The issuers of signatures inside the encryption container are
    /// looked up in the contact store once the message is decrypted.
    /// Errors accessing the key store are returned; everything else
    /// ends up in the result.
    pub fn decrypt_message(&self, data: &[u8], selector: &Selector,
                           account: &str, password: Option<&Password>)
                           -> Result<DecryptResult>
    {
        let info = match self.engine.inspect(data) {
            Ok(info) => info,
            Err(e) => return Ok(Self::malformed(&Default::default(), e)),
        };
        let keys = selector.select(account, &info)?;

        let mut lookup_error = None;
        let result = self.decrypt_inspected(
            data, &info, &keys, password,
            &mut |issuers: &[Longid]| {
                match selector.verification_keys(issuers) {
                    Ok(found) => found,
                    Err(e) => {
                        lookup_error = Some(e);
                        Vec::new()
                    },
                }
            });
        match lookup_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn malformed(keys: &CandidateKeySet, error: anyhow::Error) -> DecryptResult {
        log::debug!("Not a message: {}", error);
        DecryptResult::Failure(Failure {
            counters: Counters {
                keys_considered: keys.candidates.len(),
                ..Default::default()
            },
            encrypted_for: keys.encrypted_for.clone(),
            format_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    fn decrypt_inspected(&self, data: &[u8], info: &MessageInfo,
                         keys: &CandidateKeySet, password: Option<&Password>,
                         signers: &mut dyn FnMut(&[Longid])
                                                 -> Vec<VerificationKey>)
                         -> DecryptResult
    {
        let mut counters = Counters {
            keys_considered: keys.candidates.len(),
            ..Default::default()
        };

        if info.kind != MessageKind::Encrypted {
            return self.verify_only(data, keys, counters);
        }

        let attempts: Vec<Attempt> = match password {
            Some(p) => vec![Attempt::Password(p)],
            None => keys.unlocked.iter().map(Attempt::Key).collect(),
        };
        counters.attempts_planned = attempts.len();

        let failure = |counters, errors, format_error| Failure {
            counters,
            missing_passphrase: keys.missing_passphrase(),
            encrypted_for: keys.encrypted_for.clone(),
            errors,
            format_error,
        };

        if attempts.is_empty() {
            return DecryptResult::Failure(failure(counters, Vec::new(), None));
        }

        let certs: Vec<Cert> =
            keys.verification_keys.iter().map(|k| k.cert.clone()).collect();
        let mut errors = Vec::new();
        let mut format_errors = Vec::new();

        for attempt in attempts {
            counters.attempts_executed += 1;

            let error = match self.attempt(data, attempt, &certs) {
                Ok(mut plaintext) => {
                    counters.successes += 1;
                    let mut verification_keys = keys.verification_keys.clone();
                    self.recheck_signatures(data, attempt, &mut plaintext,
                                            &mut verification_keys, signers);
                    let signature = if plaintext.signatures.is_empty() {
                        None
                    } else {
                        Some(combine(&plaintext.signatures,
                                     &verification_keys, None))
                    };
                    let decrypted_with = match attempt {
                        Attempt::Key(key) => Some(key.longid.clone()),
                        Attempt::Password(_) => None,
                    };
                    return DecryptResult::Success(Success {
                        content: plaintext.content,
                        signature,
                        unsecure_mdc: ! plaintext.integrity_protected,
                        decrypted_with,
                        counters,
                    });
                },
                Err(e) => e,
            };

            match classify(&error, password.is_some()) {
                Category::KeyMismatch => counters.key_mismatch += 1,
                Category::WrongPassword => counters.wrong_password += 1,
                Category::UnsecureMdc => counters.unsecure_mdc += 1,
                Category::Format => {
                    counters.format_error += 1;
                    format_errors.push(error.to_string());
                },
                Category::Unclassified => {
                    self.reporter.report("decrypt", &error);
                    errors.push(format!("{:#}", error));
                },
            }
        }

        // Report a format error only if nothing else went wrong more
        // often.
        let other = counters.key_mismatch + counters.wrong_password
            + counters.unsecure_mdc;
        let format_error = if counters.format_error > other {
            format_errors.into_iter().next()
        } else {
            None
        };

        DecryptResult::Failure(failure(counters, errors, format_error))
    }

    fn attempt(&self, data: &[u8], attempt: Attempt, certs: &[Cert])
               -> Result<Plaintext>
    {
        match attempt {
            Attempt::Key(key) =>
                self.engine.decrypt_with_key(data, key, certs),
            Attempt::Password(p) =>
                self.engine.decrypt_with_password(data, p, certs),
        }
    }

    /// Checks the signatures of signers that were not known before
    /// decryption against their certificates.
    fn recheck_signatures(&self, data: &[u8], attempt: Attempt,
                          plaintext: &mut Plaintext,
                          verification_keys: &mut Vec<VerificationKey>,
                          signers: &mut dyn FnMut(&[Longid])
                                                  -> Vec<VerificationKey>)
    {
        let mut unknown: Vec<Longid> = Vec::new();
        for issuer in plaintext.signatures.iter()
            .filter_map(|c| c.issuer.as_ref())
        {
            if ! unknown.contains(issuer)
                && ! verification_keys.iter().any(|k| k.has(issuer))
            {
                unknown.push(issuer.clone());
            }
        }
        if unknown.is_empty() {
            return;
        }

        let found = signers(&unknown);
        if found.is_empty() {
            return;
        }
        verification_keys.extend(found);

        let certs: Vec<Cert> =
            verification_keys.iter().map(|k| k.cert.clone()).collect();
        match self.attempt(data, attempt, &certs) {
            Ok(rechecked) => plaintext.signatures = rechecked.signatures,
            Err(e) => log::debug!("Rechecking signatures failed: {}", e),
        }
    }

    fn verify_only(&self, data: &[u8], keys: &CandidateKeySet,
                   counters: Counters)
                   -> DecryptResult
    {
        let verifier = Verifier::new(self.engine, self.reporter);
        let (content, signature) =
            match verifier.verify_inline(data, &keys.verification_keys, None)
        {
            Ok(verified) => verified,
            Err(e) => {
                let (errors, format_error) =
                    match classify(&e, false) {
                        Category::Format => (Vec::new(), Some(e.to_string())),
                        _ => {
                            self.reporter.report("verify", &e);
                            (vec![format!("{:#}", e)], None)
                        },
                    };
                return DecryptResult::Failure(Failure {
                    counters,
                    encrypted_for: keys.encrypted_for.clone(),
                    errors,
                    format_error,
                    ..Default::default()
                });
            },
        };

        DecryptResult::Success(Success {
            content,
            signature: Some(signature),
            unsecure_mdc: false,
            decrypted_with: None,
            counters,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::RefCell;

    use openpgp::cert::prelude::*;
    use openpgp::policy::StandardPolicy;

    use crate::engine::{Plaintext, SignatureCheck, Verified};
    use crate::{Error, Longid};

    const P: &StandardPolicy = &StandardPolicy::new();

    /// An engine that plays back scripted outcomes.
    struct Script {
        info: Result<MessageInfo>,
        outcomes: RefCell<Vec<Result<Plaintext>>>,
        used: RefCell<Vec<Option<Longid>>>,
        verifications: RefCell<Vec<Result<Verified>>>,
        verify_calls: RefCell<usize>,
    }

    impl Script {
        fn new(kind: MessageKind, outcomes: Vec<Result<Plaintext>>) -> Self {
            Script {
                info: Ok(MessageInfo {
                    kind,
                    cleartext: false,
                    encrypted_for: Vec::new(),
                    signed_by: Vec::new(),
                    password_protected: false,
                    integrity_protected: true,
                    literal_packets: 1,
                }),
                outcomes: RefCell::new(outcomes),
                used: RefCell::new(Vec::new()),
                verifications: RefCell::new(Vec::new()),
                verify_calls: RefCell::new(0),
            }
        }

        fn next(&self, key: Option<Longid>) -> Result<Plaintext> {
            self.used.borrow_mut().push(key);
            self.outcomes.borrow_mut().remove(0)
        }
    }

    impl Engine for Script {
        fn inspect(&self, _: &[u8]) -> Result<MessageInfo> {
            match &self.info {
                Ok(info) => Ok(info.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }

        fn decrypt_with_key(&self, _: &[u8], key: &UnlockedKey, _: &[Cert])
                            -> Result<Plaintext> {
            self.next(Some(key.longid.clone()))
        }

        fn decrypt_with_password(&self, _: &[u8], _: &Password, _: &[Cert])
                                 -> Result<Plaintext> {
            self.next(None)
        }

        fn verify(&self, _: &[u8], _: Option<&[u8]>, _: &[Cert])
                  -> Result<Verified> {
            *self.verify_calls.borrow_mut() += 1;
            let mut verifications = self.verifications.borrow_mut();
            if verifications.is_empty() {
                Ok(Verified {
                    content: b"signed".to_vec(),
                    checks: Vec::new(),
                })
            } else {
                verifications.remove(0)
            }
        }

        fn literal_data(&self, _: &[u8]) -> Result<Vec<u8>> {
            Ok(b"unverified".to_vec())
        }
    }

    fn plaintext(integrity_protected: bool) -> Result<Plaintext> {
        Ok(Plaintext {
            content: b"hello".to_vec(),
            integrity_protected,
            decrypted_with: None,
            signatures: Vec::new(),
        })
    }

    fn keys(n: usize) -> CandidateKeySet {
        let unlocked: Vec<UnlockedKey> = (0..n).map(|_| {
            let (cert, _) = CertBuilder::new()
                .add_transport_encryption_subkey()
                .generate().unwrap();
            UnlockedKey::new(cert, None, P).unwrap()
        }).collect();
        CandidateKeySet {
            candidates: unlocked.iter().map(|k| k.longid.clone()).collect(),
            unlocked,
            ..Default::default()
        }
    }

    fn failure(result: DecryptResult) -> Failure {
        match result {
            DecryptResult::Failure(f) => f,
            DecryptResult::Success(s) => panic!("unexpected success: {:?}", s),
        }
    }

    fn success(result: DecryptResult) -> Success {
        match result {
            DecryptResult::Success(s) => s,
            DecryptResult::Failure(f) => panic!("unexpected failure: {:?}", f),
        }
    }

    fn run(engine: &Script, keys: &CandidateKeySet, password: Option<&str>)
           -> DecryptResult
    {
        let password = password.map(Password::from);
        Decryptor::new(engine, &crate::report::LogReporter)
            .decrypt(b"", keys, password.as_ref())
    }

    #[test]
    fn stops_at_first_success() {
        let keys = keys(3);
        let engine = Script::new(MessageKind::Encrypted, vec![
            Err(Error::NoMatchingKey("x".into()).into()),
            plaintext(true),
            plaintext(true),
        ]);

        let s = success(run(&engine, &keys, None));
        assert_eq!(s.content, b"hello");
        assert!(! s.unsecure_mdc);
        assert_eq!(s.decrypted_with, Some(keys.unlocked[1].longid.clone()));
        assert_eq!(s.counters, Counters {
            keys_considered: 3,
            attempts_planned: 3,
            attempts_executed: 2,
            successes: 1,
            key_mismatch: 1,
            ..Default::default()
        });
        assert_eq!(engine.used.borrow().len(), 2);
    }

    #[test]
    fn nothing_to_try() {
        let mut keys = keys(1);
        let locked = keys.unlocked.remove(0);
        keys.locked.push(crate::keys::LockedKey {
            longid: locked.longid.clone(),
            cert: locked.cert,
        });
        keys.encrypted_for = vec![locked.longid.clone()];

        let engine = Script::new(MessageKind::Encrypted, Vec::new());
        let f = failure(run(&engine, &keys, None));
        assert_eq!(f.counters.attempts_planned, 0);
        assert_eq!(f.counters.attempts_executed, 0);
        assert_eq!(f.missing_passphrase, vec![locked.longid.clone()]);
        assert_eq!(f.encrypted_for, vec![locked.longid]);
        assert!(engine.used.borrow().is_empty());
    }

    #[test]
    fn password_is_the_only_attempt() {
        let keys = keys(2);
        let engine = Script::new(MessageKind::Encrypted, vec![
            Err(openpgp::Error::InvalidPassword.into()),
        ]);
        let f = failure(run(&engine, &keys, Some("guess")));
        assert_eq!(f.counters.attempts_planned, 1);
        assert_eq!(f.counters.attempts_executed, 1);
        assert_eq!(f.counters.wrong_password, 1);
        assert_eq!(*engine.used.borrow(), vec![None]);
    }

    #[test]
    fn counts_add_up() {
        let keys = keys(5);
        let engine = Script::new(MessageKind::Encrypted, vec![
            Err(Error::NoMatchingKey("x".into()).into()),
            Err(Error::MissingMdc.into()),
            Err(openpgp::Error::MalformedPacket("y".into()).into()),
            Err(anyhow::anyhow!("the dog ate it")),
            Err(openpgp::Error::MissingSessionKey("z".into()).into()),
        ]);
        let reported = RefCell::new(0);
        let reporter = |_: &str, _: &anyhow::Error| *reported.borrow_mut() += 1;

        let f = failure(Decryptor::new(&engine, &reporter)
                        .decrypt(b"", &keys, None));
        let c = &f.counters;
        assert_eq!(c.attempts_executed, c.attempts_planned);
        assert_eq!(c.key_mismatch, 2);
        assert_eq!(c.unsecure_mdc, 1);
        assert_eq!(c.format_error, 1);
        assert_eq!(c.successes, 0);
        assert_eq!(c.key_mismatch + c.wrong_password + c.unsecure_mdc
                   + c.format_error + f.errors.len(),
                   c.attempts_executed);
        assert_eq!(f.errors, vec!["the dog ate it".to_string()]);
        assert_eq!(*reported.borrow(), 1);
        // Format errors are outnumbered.
        assert_eq!(f.format_error, None);
    }

    #[test]
    fn mostly_malformed() {
        let keys = keys(2);
        let engine = Script::new(MessageKind::Encrypted, vec![
            Err(openpgp::Error::MalformedPacket("a".into()).into()),
            Err(openpgp::Error::MalformedPacket("b".into()).into()),
        ]);
        let f = failure(run(&engine, &keys, None));
        assert_eq!(f.counters.format_error, 2);
        assert_eq!(f.format_error.as_deref(), Some("Malformed packet: a"));
    }

    #[test]
    fn unsecure_mdc_plaintext() {
        let keys = keys(1);
        let engine = Script::new(MessageKind::Encrypted, vec![
            plaintext(false),
        ]);
        assert!(success(run(&engine, &keys, None)).unsecure_mdc);
    }

    #[test]
    fn not_a_message() {
        let keys = keys(1);
        let mut engine = Script::new(MessageKind::Encrypted, Vec::new());
        engine.info = Err(Error::MalformedMessage("garbage".into()).into());
        let f = failure(run(&engine, &keys, None));
        assert_eq!(f.counters.attempts_executed, 0);
        assert!(f.format_error.is_some());
    }

    #[test]
    fn signed_only() {
        let keys = keys(1);
        let engine = Script::new(MessageKind::Signed, Vec::new());
        let s = success(run(&engine, &keys, None));
        assert_eq!(s.content, b"signed");
        assert_eq!(s.counters.attempts_executed, 0);
        // No certificates, no verdict.
        assert_eq!(s.signature, Some(SignatureResult::default()));
        assert_eq!(*engine.verify_calls.borrow(), 1);
    }

    #[test]
    fn signed_only_with_keys() {
        let mut keys = keys(0);
        keys.verification_keys = (0..2).map(|_| {
            let (cert, _) = CertBuilder::new().add_signing_subkey()
                .generate().unwrap();
            VerificationKey {
                contact: crate::keys::Contact {
                    email: "alice@example.org".into(),
                    pubkey_armored: String::new(),
                    longid: cert.keyid().into(),
                },
                cert,
            }
        }).collect();
        let engine = Script::new(MessageKind::Signed, Vec::new());
        let s = success(run(&engine, &keys, None));
        assert_eq!(s.content, b"signed");
        // One call per certificate, none just to read the content.
        assert_eq!(*engine.verify_calls.borrow(), 2);
    }

    #[test]
    fn signed_with_many_literal_packets() {
        let keys = keys(1);
        let engine = Script::new(MessageKind::Signed, Vec::new());
        engine.verifications.borrow_mut()
            .push(Err(Error::MultipleLiteralPackets.into()));
        let reported = RefCell::new(0);
        let reporter = |_: &str, _: &anyhow::Error| *reported.borrow_mut() += 1;

        let s = success(Decryptor::new(&engine, &reporter)
                        .decrypt(b"", &keys, None));
        assert_eq!(s.content, b"unverified");
        let signature = s.signature.unwrap();
        assert_eq!(signature.valid, None);
        assert_eq!(signature.error.as_deref(),
                   Some(crate::verify::LITERAL_LIMITATION));
        assert_eq!(*reported.borrow(), 0);
    }

    #[test]
    fn signed_but_unreadable() {
        let keys = keys(1);
        let engine = Script::new(MessageKind::Signed, Vec::new());
        engine.verifications.borrow_mut()
            .push(Err(anyhow::anyhow!("the dog ate it")));
        let reported = RefCell::new(0);
        let reporter = |_: &str, _: &anyhow::Error| *reported.borrow_mut() += 1;

        let f = failure(Decryptor::new(&engine, &reporter)
                        .decrypt(b"", &keys, None));
        assert_eq!(f.errors, vec!["the dog ate it".to_string()]);
        assert_eq!(*reported.borrow(), 1);
    }

    #[test]
    fn inner_signatures() {
        let keys = keys(1);
        let signer: Longid = "AAAAAAAAAAAAAAAA".parse().unwrap();
        let engine = Script::new(MessageKind::Encrypted, vec![
            Ok(Plaintext {
                content: b"hello".to_vec(),
                integrity_protected: true,
                decrypted_with: None,
                signatures: vec![SignatureCheck {
                    issuer: Some(signer.clone()),
                    valid: None,
                    error: None,
                }],
            }),
        ]);
        let s = success(run(&engine, &keys, None));
        let sig = s.signature.unwrap();
        assert_eq!(sig.signer, Some(signer));
        assert_eq!(sig.valid, None);
    }

    #[test]
    fn inner_signers_are_looked_up() {
        let keys = keys(1);
        let (cert, _) = CertBuilder::new().add_signing_subkey()
            .generate().unwrap();
        let signer = Longid::from(cert.keyid());
        let check = |valid| SignatureCheck {
            issuer: Some(signer.clone()),
            valid,
            error: None,
        };
        let plaintext = |valid| Ok(Plaintext {
            content: b"hello".to_vec(),
            integrity_protected: true,
            decrypted_with: None,
            signatures: vec![check(valid)],
        });
        let engine = Script::new(MessageKind::Encrypted, vec![
            plaintext(None),
            plaintext(Some(true)),
        ]);
        let contact = crate::keys::Contact {
            email: "alice@example.org".into(),
            pubkey_armored: String::new(),
            longid: signer.clone(),
        };

        let mut asked = Vec::new();
        let mut lookup = |issuers: &[Longid]| {
            asked.extend_from_slice(issuers);
            vec![VerificationKey {
                contact: contact.clone(),
                cert: cert.clone(),
            }]
        };
        let info = engine.inspect(b"").unwrap();
        let s = success(Decryptor::new(&engine, &crate::report::LogReporter)
                        .decrypt_inspected(b"", &info, &keys, None,
                                           &mut lookup));
        assert_eq!(asked, vec![signer.clone()]);
        // The second decryption only rechecks the signatures.
        assert_eq!(engine.used.borrow().len(), 2);
        assert_eq!(s.counters.attempts_executed, 1);
        let sig = s.signature.unwrap();
        assert_eq!(sig.valid, Some(true));
        assert_eq!(sig.contact, Some(contact));
    }
}
