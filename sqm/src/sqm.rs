/// A command-line frontend for sequoia-mail.

use anyhow::Context as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

use sequoia_mail as mail;
use mail::openpgp;
use mail::{Config, Result};

use openpgp::Cert;
use openpgp::crypto::Password;
use openpgp::parse::Parse;
use openpgp::serialize::SerializeInto;

use mail::keys::{Contact, KeyInfo};

mod sqm_cli;
mod commands;

fn read_input(f: Option<&str>) -> Result<Vec<u8>> {
    match f {
        Some(f) if f != "-" =>
            fs::read(f).context("Failed to open input file"),
        _ => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        },
    }
}

fn create_or_stdout(f: Option<&str>, force: bool)
    -> Result<Box<dyn io::Write + Sync + Send>> {
    match f {
        None => Ok(Box::new(io::stdout())),
        Some(p) if p == "-" => Ok(Box::new(io::stdout())),
        Some(f) => {
            let p = Path::new(f);
            if !p.exists() || force {
                Ok(Box::new(OpenOptions::new()
                            .write(true)
                            .truncate(true)
                            .create(true)
                            .open(f)
                            .context("Failed to create output file")?))
            } else {
                Err(anyhow::anyhow!(
                    "File {:?} exists, use --force to overwrite", p))
            }
        }
    }
}

fn load_config(f: Option<&str>) -> Result<Config> {
    match f {
        Some(f) => {
            let json = fs::read(f)
                .context(format!("Failed to read config from {:?}", f))?;
            serde_json::from_slice(&json)
                .context(format!("Malformed config in {:?}", f))
        },
        None => Ok(Config::default()),
    }
}

/// Loads one TSK from every given file.
fn load_keys<'a, I>(files: I) -> Result<Vec<KeyInfo>>
    where I: Iterator<Item=&'a str>
{
    let mut keys = vec![];
    for (i, f) in files.enumerate() {
        let cert = Cert::from_file(f)
            .context(format!("Failed to load key from file {:?}", f))?;
        if ! cert.is_tsk() {
            return Err(anyhow::anyhow!(
                "Cert in file {:?} does not contain secret keys", f));
        }
        let armored = String::from_utf8(cert.as_tsk().armored().to_vec()?)?;
        keys.push(mail::keys::key_info(&armored, i == 0)?);
    }
    Ok(keys)
}

/// Loads a cert from every given file.
fn load_contacts<'a, I>(files: I) -> Result<Vec<Contact>>
    where I: Iterator<Item=&'a str>
{
    let mut contacts = vec![];
    for f in files {
        let cert = Cert::from_file(f)
            .context(format!("Failed to load cert from file {:?}", f))?;
        let armored = String::from_utf8(cert.armored().to_vec()?)?;
        contacts.push(mail::keys::contact(&armored)?);
    }
    Ok(contacts)
}

/// Reads a password from the first line of a file.
fn load_password(f: Option<&str>) -> Result<Option<Password>> {
    match f {
        Some(f) => {
            let text = fs::read_to_string(f)
                .context(format!("Failed to read password from {:?}", f))?;
            let line = text.lines().next().unwrap_or("");
            Ok(Some(line.into()))
        },
        None => Ok(None),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = sqm_cli::build().get_matches();
    let force = matches.is_present("force");
    let mut config = load_config(matches.value_of("config"))?;
    if let Some(hosts) = matches.values_of("password-host") {
        config.password_message_hosts = hosts.map(Into::into).collect();
    }

    match matches.subcommand() {
        ("scan", Some(m)) => {
            let input = read_input(m.value_of("input"))?;
            let mut output = io::stdout();
            commands::scan(&config, &input, &mut output,
                           m.is_present("content"))?;
        },
        ("clip", Some(m)) => {
            let input = read_input(m.value_of("input"))?;
            commands::clip(&input, &mut io::stdout())?;
        },
        ("decrypt", Some(m)) => {
            let input = read_input(m.value_of("input"))?;
            let mut output = create_or_stdout(m.value_of("output"), force)?;
            let keys = m.values_of("secret-key-file")
                .map(load_keys)
                .unwrap_or(Ok(vec![]))?;
            let contacts = m.values_of("sender-cert-file")
                .map(load_contacts)
                .unwrap_or(Ok(vec![]))?;
            let passphrase = load_password(m.value_of("passphrase-file"))?;
            let password = load_password(m.value_of("password-file"))?;
            commands::decrypt(&config, &input, &mut output,
                              keys, contacts, passphrase, password,
                              ! m.is_present("batch"))?;
        },
        ("verify", Some(m)) => {
            let input = read_input(m.value_of("input"))?;
            let mut output = create_or_stdout(m.value_of("output"), force)?;
            let detached = match m.value_of("detached") {
                Some(f) => Some(fs::read(f)
                                .context("Failed to read detached signature")?),
                None => None,
            };
            let contacts = m.values_of("sender-cert-file")
                .map(load_contacts)
                .unwrap_or(Ok(vec![]))?;
            commands::verify(&config, &input, detached.as_deref(),
                             &mut output, contacts)?;
        },
        _ => unreachable!(),
    }

    Ok(())
}
