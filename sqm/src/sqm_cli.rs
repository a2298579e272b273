/// Command-line parser for sqm.

use clap::{App, Arg, AppSettings, SubCommand};

pub fn build() -> App<'static, 'static> {
    configure(App::new("sqm"))
}

/// Defines the CLI.
pub fn configure(app: App<'static, 'static>) -> App<'static, 'static> {
    app
        .version(env!("CARGO_PKG_VERSION"))
        .about("Finds, decrypts and verifies OpenPGP data in mail.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("force")
             .short("f").long("force")
             .help("Overwrite existing files"))
        .arg(Arg::with_name("config")
             .long("config").value_name("FILE")
             .help("Reads tunables from a JSON file"))
        .arg(Arg::with_name("password-host")
             .long("password-host").value_name("HOST")
             .multiple(true).number_of_values(1)
             .help("Recognizes password protected messages hosted at HOST \
                    (can be given multiple times, replaces the configured \
                    hosts)"))

        .subcommand(SubCommand::with_name("scan")
                    .display_order(100)
                    .about("Lists the armored blocks in a text")
                    .arg(Arg::with_name("input")
                         .value_name("FILE")
                         .help("Sets the input file to use"))
                    .arg(Arg::with_name("content")
                         .long("content")
                         .help("Prints the content of every block, \
                                with armor repaired")))

        .subcommand(SubCommand::with_name("clip")
                    .display_order(110)
                    .about("Prints the first armored message, signature \
                            or certificate in a text")
                    .arg(Arg::with_name("input")
                         .value_name("FILE")
                         .help("Sets the input file to use")))

        .subcommand(SubCommand::with_name("decrypt")
                    .display_order(200)
                    .about("Decrypts the first message in a text")
                    .arg(Arg::with_name("input")
                         .value_name("FILE")
                         .help("Sets the input file to use"))
                    .arg(Arg::with_name("output")
                         .short("o").long("output").value_name("FILE")
                         .help("Sets the output file to use"))
                    .arg(Arg::with_name("secret-key-file")
                         .long("recipient-key").value_name("KEY")
                         .multiple(true).number_of_values(1)
                         .help("Secret key to decrypt with, given as a file \
                                (can be given multiple times)"))
                    .arg(Arg::with_name("sender-cert-file")
                         .long("signer-cert").value_name("CERT")
                         .multiple(true).number_of_values(1)
                         .help("The sender's certificate to verify signatures \
                                with, given as a file \
                                (can be given multiple times)"))
                    .arg(Arg::with_name("passphrase-file")
                         .long("passphrase-file").value_name("FILE")
                         .help("Reads the passphrase of the secret keys \
                                from a file"))
                    .arg(Arg::with_name("password-file")
                         .long("password-file").value_name("FILE")
                         .help("Decrypts using the message password read \
                                from a file instead of a key"))
                    .arg(Arg::with_name("batch")
                         .long("batch")
                         .help("Never prompts for passphrases")))

        .subcommand(SubCommand::with_name("verify")
                    .display_order(210)
                    .about("Verifies the first signed message in a text")
                    .arg(Arg::with_name("input")
                         .value_name("FILE")
                         .help("Sets the input file to use"))
                    .arg(Arg::with_name("output")
                         .short("o").long("output").value_name("FILE")
                         .help("Writes the signed content to a file"))
                    .arg(Arg::with_name("detached")
                         .long("detached").value_name("SIG")
                         .help("Verifies a detached signature"))
                    .arg(Arg::with_name("sender-cert-file")
                         .long("signer-cert").value_name("CERT")
                         .multiple(true).number_of_values(1)
                         .help("The sender's certificate to verify signatures \
                                with, given as a file \
                                (can be given multiple times)")))
}
