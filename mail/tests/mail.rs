use std::cell::Cell;
use std::io::Write;

use sequoia_mail as mail;
use mail::openpgp;

use openpgp::Cert;
use openpgp::cert::prelude::*;
use openpgp::crypto::Password;
use openpgp::PacketPile;
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::SerializeInto;
use openpgp::serialize::stream::*;

use mail::decrypt::{DecryptResult, Decryptor};
use mail::engine::{Engine, Sequoia};
use mail::keys::{self, CandidateKeySet, Contact, ContactStore, KeyInfo,
                 KeyStore, Selector, SessionPassphrases, UnlockedKey};
use mail::normalize::{clip, normalize};
use mail::report::LogReporter;
use mail::scan::{self, Kind};
use mail::{Longid, Result};

const P: &StandardPolicy = &StandardPolicy::new();

fn cert(userid: &str, password: Option<&str>) -> Cert {
    let mut builder = CertBuilder::general_purpose(None, Some(userid));
    if let Some(p) = password {
        builder = builder.set_password(Some(p.into()));
    }
    builder.generate().unwrap().0
}

fn encrypt(recipients: &[&Cert], password: Option<&str>, text: &str)
           -> String
{
    let mut sink = Vec::new();
    let message = Message::new(&mut sink);
    let message = Armorer::new(message).build().unwrap();
    let keys = recipients.iter().flat_map(|c| {
        c.keys().with_policy(P, None).supported().alive().revoked(false)
            .for_transport_encryption()
    });
    let mut encryptor = Encryptor::for_recipients(message, keys);
    if let Some(p) = password {
        encryptor = encryptor.add_passwords(Some(p));
    }
    let message = encryptor.build().unwrap();
    let mut message = LiteralWriter::new(message).build().unwrap();
    message.write_all(text.as_bytes()).unwrap();
    message.finalize().unwrap();
    String::from_utf8(sink).unwrap()
}

fn signing_keypair(cert: &Cert) -> openpgp::crypto::KeyPair {
    cert.keys().unencrypted_secret()
        .with_policy(P, None).for_signing().next().unwrap()
        .key().clone().into_keypair().unwrap()
}

fn sign_and_encrypt(recipient: &Cert, signer: &Cert, text: &str) -> String {
    let mut sink = Vec::new();
    let message = Message::new(&mut sink);
    let message = Armorer::new(message).build().unwrap();
    let keys = recipient.keys().with_policy(P, None).supported().alive()
        .revoked(false).for_transport_encryption();
    let message = Encryptor::for_recipients(message, keys).build().unwrap();
    let message = Signer::new(message, signing_keypair(signer))
        .build().unwrap();
    let mut message = LiteralWriter::new(message).build().unwrap();
    message.write_all(text.as_bytes()).unwrap();
    message.finalize().unwrap();
    String::from_utf8(sink).unwrap()
}

fn unlocked(certs: &[&Cert]) -> CandidateKeySet {
    let unlocked: Vec<UnlockedKey> = certs.iter()
        .map(|c| UnlockedKey::new((*c).clone(), None, P).unwrap())
        .collect();
    CandidateKeySet {
        candidates: unlocked.iter().map(|k| k.longid.clone()).collect(),
        unlocked,
        ..Default::default()
    }
}

#[derive(Default)]
struct Keys {
    keys: Vec<KeyInfo>,
    passphrase: Option<Password>,
}

impl KeyStore for Keys {
    fn private_keys(&self, _account: &str) -> Result<Vec<KeyInfo>> {
        Ok(self.keys.clone())
    }

    fn passphrase(&self, _account: &str, _longid: &Longid)
                  -> Result<Option<Password>>
    {
        Ok(self.passphrase.clone())
    }
}

#[derive(Default)]
struct Contacts {
    contacts: Vec<Contact>,
    lookups: Cell<usize>,
}

impl ContactStore for Contacts {
    fn contacts_by_longid(&self, longids: &[Longid])
                          -> Result<Vec<Option<Contact>>>
    {
        self.lookups.set(self.lookups.get() + 1);
        Ok(longids.iter().map(|id| {
            self.contacts.iter().find(|c| {
                let cert = Cert::from_bytes(c.pubkey_armored.as_bytes())
                    .unwrap();
                cert.keys().any(|ka| Longid::from(ka.key().keyid()) == *id)
            }).cloned()
        }).collect())
    }
}

fn key_info(cert: &Cert, primary: bool) -> KeyInfo {
    let armored = String::from_utf8(cert.as_tsk().armored().to_vec().unwrap())
        .unwrap();
    keys::key_info(&armored, primary).unwrap()
}

#[test]
fn scanning_is_deterministic() {
    let bob = cert("<bob@example.org>", None);
    let text = format!("Hi!\n\n{}\n\n-----BEGIN PGP SIGNATURE-----\nabc",
                       encrypt(&[&bob], None, "hello"));

    let first = scan::scan_blocks(&text).unwrap();
    for _ in 0..3 {
        assert_eq!(scan::scan_blocks(&text).unwrap(), first);
    }
    assert_eq!(first.blocks.last().map(|b| (b.kind, b.complete)),
               Some((Kind::Signature, false)));
}

#[test]
fn clipping_keeps_the_block_intact() {
    let bob = cert("<bob@example.org>", None);
    let armored = encrypt(&[&bob], None, "hello");
    let armored = armored.trim();
    let text = format!("Some prose\n\n{}\n\nMore prose", armored);

    assert_eq!(clip(&text), Some(armored));
    let scan = scan::scan_blocks(&text).unwrap();
    let block = scan.blocks.iter().find(|b| b.kind == Kind::Message).unwrap();
    assert_eq!(normalize(&block.content, block.kind), armored);
}

#[test]
fn clipped_blocks_parse() {
    let bob = cert("<bob@example.org>", None);
    let engine = Sequoia::default();
    let quoted = |armored: &str| {
        format!("Bob wrote:\n\n{}\n\n-- \nBob", armored.trim())
    };

    // A message.
    let text = quoted(&encrypt(&[&bob], None, "hello"));
    let clipped = clip(&text).unwrap();
    match Decryptor::new(&engine, &LogReporter)
        .decrypt(clipped.as_bytes(), &unlocked(&[&bob]), None)
    {
        DecryptResult::Success(s) => assert_eq!(s.content, b"hello"),
        DecryptResult::Failure(f) => panic!("{:?}", f),
    }

    // A certificate.
    let public = String::from_utf8(bob.armored().to_vec().unwrap()).unwrap();
    let text = quoted(&public);
    let clipped = clip(&text).unwrap();
    assert_eq!(Cert::from_bytes(clipped.as_bytes()).unwrap(),
               bob.clone().strip_secret_key_material());

    // A detached signature.
    let mut sig = Vec::new();
    {
        let message = Message::new(&mut sig);
        let message = Armorer::new(message)
            .kind(openpgp::armor::Kind::Signature)
            .build().unwrap();
        let mut signer = Signer::new(message, signing_keypair(&bob))
            .detached().build().unwrap();
        signer.write_all(b"attachment").unwrap();
        signer.finalize().unwrap();
    }
    let text = quoted(std::str::from_utf8(&sig).unwrap());
    let clipped = clip(&text).unwrap();
    assert_eq!(PacketPile::from_bytes(clipped.as_bytes()).unwrap(),
               PacketPile::from_bytes(&sig).unwrap());
    let verified = engine.verify(b"attachment", Some(clipped.as_bytes()),
                                 &[bob.clone()]).unwrap();
    assert_eq!(verified.checks[0].valid, Some(true));
}

#[test]
fn stops_after_the_first_matching_key() {
    let certs: Vec<Cert> = (0..5)
        .map(|i| cert(&format!("<user{}@example.org>", i), None))
        .collect();
    let data = encrypt(&[&certs[1], &certs[3]], None, "for two of five");
    let set = unlocked(&certs.iter().collect::<Vec<_>>());

    let engine = Sequoia::default();
    match Decryptor::new(&engine, &LogReporter)
        .decrypt(data.as_bytes(), &set, None)
    {
        DecryptResult::Success(s) => {
            assert_eq!(s.content, b"for two of five");
            assert_eq!(s.decrypted_with, Some(set.unlocked[1].longid.clone()));
            assert_eq!(s.counters.keys_considered, 5);
            assert_eq!(s.counters.attempts_planned, 5);
            assert_eq!(s.counters.attempts_executed, 2);
            assert_eq!(s.counters.key_mismatch, 1);
            assert!(! s.unsecure_mdc);
        },
        DecryptResult::Failure(f) => panic!("{:?}", f),
    }
}

#[test]
fn decryption_is_deterministic() {
    let certs: Vec<Cert> = (0..4)
        .map(|i| cert(&format!("<user{}@example.org>", i), None))
        .collect();
    let data = encrypt(&[&certs[2]], None, "third time lucky");
    let engine = Sequoia::default();
    let decryptor = Decryptor::new(&engine, &LogReporter);

    let set = unlocked(&certs.iter().collect::<Vec<_>>());
    let first = decryptor.decrypt(data.as_bytes(), &set, None);
    let second = decryptor.decrypt(data.as_bytes(), &set, None);
    assert!(first.is_success());
    assert_eq!(first.counters().key_mismatch, 2);
    assert_eq!(first.counters().attempts_executed, 3);
    assert_eq!(first.counters(), second.counters());
    assert_eq!(first, second);

    let set = unlocked(&[&certs[0], &certs[1], &certs[3]]);
    let first = decryptor.decrypt(data.as_bytes(), &set, None);
    let second = decryptor.decrypt(data.as_bytes(), &set, None);
    assert!(! first.is_success());
    assert_eq!(first.counters().key_mismatch, 3);
    assert_eq!(first.counters(), second.counters());
    assert_eq!(first, second);
}

#[test]
fn signer_inside_an_encrypted_message() {
    let alice = cert("<alice@example.org>", None);
    let bob = cert("<bob@example.org>", None);
    let data = sign_and_encrypt(&bob, &alice, "attack at dawn");

    let armored = String::from_utf8(alice.armored().to_vec().unwrap()).unwrap();
    let contacts = Contacts {
        contacts: vec![keys::contact(&armored).unwrap()],
        ..Default::default()
    };
    let store = Keys {
        keys: vec![key_info(&bob, true)],
        ..Default::default()
    };
    let session = SessionPassphrases::new();

    let engine = Sequoia::default();
    let result = Decryptor::new(&engine, &LogReporter).decrypt_message(
        data.as_bytes(), &Selector::new(&store, &contacts, &session),
        "bob@example.org", None).unwrap();
    assert_eq!(contacts.lookups.get(), 1);
    match result {
        DecryptResult::Success(s) => {
            assert_eq!(s.content, b"attack at dawn");
            assert_eq!(s.counters.attempts_executed, 1);
            let signature = s.signature.unwrap();
            assert_eq!(signature.valid, Some(true));
            assert_eq!(signature.contact.map(|c| c.email),
                       Some("alice@example.org".into()));
        },
        DecryptResult::Failure(f) => panic!("{:?}", f),
    }
}

#[test]
fn locked_keys_ask_for_a_passphrase() {
    let bob = cert("<bob@example.org>", Some("streng geheim"));
    let data = encrypt(&[&bob], None, "hello");

    let store = Keys {
        keys: vec![key_info(&bob, true)],
        ..Default::default()
    };
    let contacts = Contacts::default();
    let mut session = SessionPassphrases::new();

    let engine = Sequoia::default();
    let decryptor = Decryptor::new(&engine, &LogReporter);
    let result = decryptor.decrypt_message(
        data.as_bytes(), &Selector::new(&store, &contacts, &session),
        "bob@example.org", None).unwrap();
    match &result {
        DecryptResult::Failure(f) => {
            assert_eq!(f.missing_passphrase, vec![Longid::from(bob.keyid())]);
            assert_eq!(f.counters.attempts_executed, 0);
            assert_eq!(f.format_error, None);
        },
        DecryptResult::Success(_) => panic!("decrypted with a locked key"),
    }

    session.insert(bob.keyid().into(), "streng geheim".into());
    let result = decryptor.decrypt_message(
        data.as_bytes(), &Selector::new(&store, &contacts, &session),
        "bob@example.org", None).unwrap();
    assert!(result.is_success());
    assert_eq!(result.counters().attempts_executed, 1);
}

#[test]
fn wrong_message_password() {
    let bob = cert("<bob@example.org>", None);
    let data = encrypt(&[&bob], Some("correct horse"), "hello");

    let store = Keys {
        keys: vec![key_info(&bob, true)],
        ..Default::default()
    };
    let contacts = Contacts::default();
    let session = SessionPassphrases::new();
    let selector = Selector::new(&store, &contacts, &session);

    let engine = Sequoia::default();
    let decryptor = Decryptor::new(&engine, &LogReporter);
    let result = decryptor.decrypt_message(
        data.as_bytes(), &selector, "bob@example.org",
        Some(&"battery staple".into())).unwrap();
    match result {
        DecryptResult::Failure(f) => {
            assert_eq!(f.counters.attempts_planned, 1);
            assert_eq!(f.counters.attempts_executed, 1);
            assert_eq!(f.counters.wrong_password, 1);
            assert!(f.errors.is_empty());
        },
        DecryptResult::Success(_) => panic!("wrong password accepted"),
    }

    let result = decryptor.decrypt_message(
        data.as_bytes(), &selector, "bob@example.org",
        Some(&"correct horse".into())).unwrap();
    assert!(result.is_success());
}

#[test]
fn cleartext_from_a_known_contact() {
    let alice = cert("<alice@example.org>", None);

    let mut signed = Vec::new();
    {
        let message = Message::new(&mut signed);
        let mut signer = Signer::new(message, signing_keypair(&alice))
            .cleartext()
            .build().unwrap();
        signer.write_all(b"See you tomorrow.\n").unwrap();
        signer.finalize().unwrap();
    }

    let armored = String::from_utf8(alice.armored().to_vec().unwrap()).unwrap();
    let contacts = Contacts {
        contacts: vec![keys::contact(&armored).unwrap()],
        ..Default::default()
    };
    let store = Keys::default();
    let session = SessionPassphrases::new();

    let engine = Sequoia::default();
    let info = engine.inspect(&signed).unwrap();
    assert!(info.cleartext);

    let result = Decryptor::new(&engine, &LogReporter).decrypt_message(
        &signed, &Selector::new(&store, &contacts, &session),
        "bob@example.org", None).unwrap();
    assert_eq!(contacts.lookups.get(), 1);
    match result {
        DecryptResult::Success(s) => {
            assert!(String::from_utf8_lossy(&s.content)
                    .starts_with("See you tomorrow."));
            assert_eq!(s.counters.attempts_executed, 0);
            let signature = s.signature.unwrap();
            assert_eq!(signature.valid, Some(true));
            assert_eq!(signature.contact.map(|c| c.email),
                       Some("alice@example.org".into()));
            let signer = signature.signer.unwrap();
            assert!(alice.keys().any(|ka| Longid::from(ka.key().keyid())
                                     == signer));
        },
        DecryptResult::Failure(f) => panic!("{:?}", f),
    }
}
