use std::io::Write;

use sequoia_mail as mail;
use mail::openpgp::crypto::Password;

use mail::decrypt::{DecryptResult, Decryptor, Failure};
use mail::engine::{Engine, Sequoia};
use mail::keys::{Contact, KeyInfo, Selector, SessionPassphrases};
use mail::report::LogReporter;
use mail::scan::Kind;
use mail::{Config, Longid, Result};

use super::{first_block, print_signature, FileContacts, FileKeyStore, ACCOUNT};

pub fn decrypt(config: &Config, input: &[u8], output: &mut dyn Write,
               keys: Vec<KeyInfo>, contacts: Vec<Contact>,
               passphrase: Option<Password>, password: Option<Password>,
               prompt: bool)
               -> Result<()>
{
    let data = first_block(config, input, &[Kind::Message])?;

    let store = FileKeyStore { keys, passphrase };
    let contacts = FileContacts::new(contacts)?;
    let engine = Sequoia::default();
    let decryptor = Decryptor::new(&engine, &LogReporter);
    let mut session = SessionPassphrases::new();

    let info = engine.inspect(&data)
        .map_err(|e| anyhow::anyhow!("Malformed message: {}", e))?;

    let mut retried = false;
    loop {
        let mut keys = Selector::new(&store, &contacts, &session)
            .select(ACCOUNT, &info)?;
        // Signatures inside the encryption container are not known
        // in advance, offer all given certificates.
        for key in contacts.verification_keys() {
            if keys.verification_keys.iter()
                .all(|k| k.cert.fingerprint() != key.cert.fingerprint())
            {
                keys.verification_keys.push(key);
            }
        }

        let result = decryptor.decrypt(&data, &keys, password.as_ref());
        log::debug!("{:?}", result.counters());

        match result {
            DecryptResult::Success(s) => {
                output.write_all(&s.content)?;
                if s.unsecure_mdc {
                    eprintln!("Warning: The message is not integrity \
                               protected, it may have been modified.");
                }
                if let Some(signature) = &s.signature {
                    print_signature(signature);
                }
                return Ok(());
            },
            DecryptResult::Failure(f) => {
                if prompt && ! retried && password.is_none()
                    && ! f.missing_passphrase.is_empty()
                    && ask(&f.missing_passphrase, &mut session)
                {
                    retried = true;
                    continue;
                }
                return Err(explain(&f));
            },
        }
    }
}

/// Asks for the passphrases of locked keys.
///
/// Returns whether any passphrase was entered.
fn ask(locked: &[Longid], session: &mut SessionPassphrases) -> bool {
    let mut entered = false;
    for longid in locked {
        match rpassword::read_password_from_tty(Some(&format!(
            "Enter passphrase to unlock {} (blank to skip): ", longid)))
        {
            Ok(p) if p.is_empty() => (),
            Ok(p) => {
                session.insert(longid.clone(), p.into());
                entered = true;
            },
            Err(err) => {
                eprintln!("While reading passphrase: {}", err);
                return false;
            },
        }
    }
    entered
}

fn list(longids: &[Longid]) -> String {
    longids.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
}

/// Turns a failure into a message for the user.
fn explain(f: &Failure) -> anyhow::Error {
    let c = &f.counters;
    if let Some(e) = &f.format_error {
        anyhow::anyhow!("Malformed message: {}", e)
    } else if c.attempts_executed == 0 && ! f.missing_passphrase.is_empty() {
        anyhow::anyhow!("Passphrase needed to unlock {}",
                        list(&f.missing_passphrase))
    } else if c.wrong_password > 0 {
        anyhow::anyhow!("Wrong password")
    } else if c.unsecure_mdc > 0 {
        anyhow::anyhow!("Refusing to decrypt a message without \
                         integrity protection")
    } else if ! f.errors.is_empty() {
        anyhow::anyhow!("Decryption failed: {}", f.errors.join("; "))
    } else if f.encrypted_for.is_empty() {
        anyhow::anyhow!("No key to decrypt this message")
    } else {
        anyhow::anyhow!("No key to decrypt this message, it is encrypted \
                         for {}", list(&f.encrypted_for))
    }
}
