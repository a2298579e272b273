use std::io::Write;

use sequoia_mail as mail;
use mail::engine::{Engine, Sequoia};
use mail::keys::{Contact, Selector, SessionPassphrases};
use mail::report::LogReporter;
use mail::scan::Kind;
use mail::verify::Verifier;
use mail::{Config, Result};

use super::{first_block, print_signature, FileContacts, FileKeyStore};

pub fn verify(config: &Config, input: &[u8], detached: Option<&[u8]>,
              output: &mut dyn Write, contacts: Vec<Contact>)
              -> Result<()>
{
    let engine = Sequoia::default();

    let (data, signature) = match detached {
        Some(sig) => (input.to_vec(),
                      Some(first_block(config, sig, &[Kind::Signature])?)),
        None => (first_block(config, input,
                             &[Kind::SignedMessage, Kind::Message])?,
                 None),
    };

    let info = engine.inspect(signature.as_deref().unwrap_or(&data))?;

    let store = FileKeyStore::default();
    let contacts = FileContacts::new(contacts)?;
    let session = SessionPassphrases::new();
    let keys = Selector::new(&store, &contacts, &session)
        .verification_keys(&info.signed_by)?;

    let verifier = Verifier::new(&engine, &LogReporter);
    let result = match signature {
        Some(signature) =>
            verifier.verify(&data, Some(&signature), &keys, None),
        None => {
            let (content, result) =
                verifier.verify_inline(&data, &keys, None)?;
            output.write_all(&content)?;
            result
        },
    };

    print_signature(&result);
    if result.valid == Some(true) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("No valid signature"))
    }
}
