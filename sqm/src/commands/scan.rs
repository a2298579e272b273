use std::io::Write;

use sequoia_mail as mail;
use mail::normalize::{self, normalize};
use mail::scan::Scanner;
use mail::{Config, Result};

/// Lists the blocks in `input`, one per line.
pub fn scan(config: &Config, input: &[u8], output: &mut dyn Write,
            content: bool)
            -> Result<()>
{
    let text = String::from_utf8_lossy(input);
    let scan = Scanner::new(config)?.scan(&text)?;

    for block in &scan.blocks {
        writeln!(output, "{}\t{}..{}{}", block.kind,
                 block.span.start, block.span.end,
                 if block.complete { "" } else { "\tincomplete" })?;
        if content {
            writeln!(output, "{}", normalize(&block.content, block.kind))?;
        }
    }

    Ok(())
}

/// Prints the first armored message, signature or certificate.
pub fn clip(input: &[u8], output: &mut dyn Write) -> Result<()> {
    let text = String::from_utf8_lossy(input);
    match normalize::clip(&text) {
        Some(block) => writeln!(output, "{}", block)?,
        None => return Err(anyhow::anyhow!("No armored block found")),
    }
    Ok(())
}
