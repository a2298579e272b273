use sequoia_mail as mail;
use mail::openpgp;

use openpgp::Cert;
use openpgp::crypto::Password;
use openpgp::parse::Parse;

use mail::keys::{Contact, ContactStore, KeyInfo, KeyStore, VerificationKey};
use mail::normalize::normalize;
use mail::scan::{Kind, Scanner};
use mail::verify::SignatureResult;
use mail::{Config, Longid, Result};

mod decrypt;
pub use self::decrypt::decrypt;
mod scan;
pub use self::scan::{clip, scan};
mod verify;
pub use self::verify::verify;

/// Keys handed over on the command line all belong to this account.
const ACCOUNT: &str = "default";

/// Keys given on the command line.
#[derive(Default)]
struct FileKeyStore {
    keys: Vec<KeyInfo>,
    passphrase: Option<Password>,
}

impl KeyStore for FileKeyStore {
    fn private_keys(&self, _account: &str) -> Result<Vec<KeyInfo>> {
        Ok(self.keys.clone())
    }

    fn passphrase(&self, _account: &str, _longid: &Longid)
                  -> Result<Option<Password>>
    {
        Ok(self.passphrase.clone())
    }
}

/// Certificates given on the command line.
struct FileContacts {
    contacts: Vec<(Contact, Cert)>,
}

impl FileContacts {
    fn new(contacts: Vec<Contact>) -> Result<Self> {
        let mut parsed = Vec::new();
        for contact in contacts {
            let cert = Cert::from_bytes(contact.pubkey_armored.as_bytes())?;
            parsed.push((contact, cert));
        }
        Ok(FileContacts { contacts: parsed })
    }

    fn verification_keys(&self) -> Vec<VerificationKey> {
        self.contacts.iter().map(|(contact, cert)| VerificationKey {
            contact: contact.clone(),
            cert: cert.clone(),
        }).collect()
    }
}

impl ContactStore for FileContacts {
    fn contacts_by_longid(&self, longids: &[Longid])
                          -> Result<Vec<Option<Contact>>>
    {
        Ok(longids.iter().map(|id| {
            self.contacts.iter()
                .find(|(_, cert)| cert.keys()
                      .any(|ka| Longid::from(ka.key().keyid()) == *id))
                .map(|(contact, _)| contact.clone())
        }).collect())
    }
}

/// Returns the data to work on.
///
/// This is the first complete block of one of the given kinds, with
/// its armor repaired.  Input without any armor is returned as is.
fn first_block(config: &Config, input: &[u8], kinds: &[Kind])
               -> Result<Vec<u8>>
{
    let text = match std::str::from_utf8(input) {
        Ok(text) => text,
        Err(_) => return Ok(input.to_vec()),
    };

    let scan = Scanner::new(config)?.scan(text)?;
    match scan.blocks.iter().find(|b| kinds.contains(&b.kind)) {
        Some(b) if ! b.complete =>
            Err(anyhow::anyhow!("The {} is incomplete", b.kind)),
        Some(b) => Ok(normalize(&b.content, b.kind).into_bytes()),
        None if ! scan.has_armor() => Ok(input.to_vec()),
        None => {
            if let Some(b) = scan.blocks.iter()
                .find(|b| b.kind == Kind::PasswordMessage)
            {
                return Err(anyhow::anyhow!(
                    "Password protected message {} must be fetched \
                     from the web", b.content));
            }
            Err(anyhow::anyhow!("No {} found", kinds.first()
                                .map(Kind::name).unwrap_or("block")))
        },
    }
}

fn print_signature(result: &SignatureResult) {
    let who = match (&result.contact, &result.signer) {
        (Some(c), Some(s)) => format!("{} ({})", c.email, s),
        (Some(c), None) => c.email.clone(),
        (None, Some(s)) => s.to_string(),
        (None, None) => "an unknown key".into(),
    };

    match result.valid {
        Some(true) => eprintln!("Good signature from {}", who),
        Some(false) => eprintln!("Bad signature from {}", who),
        None => eprintln!("Unverified signature from {}", who),
    }
    if let Some(e) = &result.error {
        eprintln!("  {}", e);
    }
}
