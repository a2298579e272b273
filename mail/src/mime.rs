//! Picking OpenPGP content out of MIME messages.
//!
//! Parsing MIME is the caller's business.  This module takes the
//! resulting tree of [`MimeNode`]s and decides which part is the
//! text body, which the HTML body, whether there is a detached
//! signature, and how every other part should be treated.
//!
//! # Example
//!
//! ```
//! use sequoia_mail::Config;
//! use sequoia_mail::mime::{self, MimeNode, TreatAs};
//!
//! let tree = MimeNode::multipart("multipart/mixed", vec![
//!     MimeNode::leaf("text/plain", "Hi, see attached."),
//!     MimeNode::leaf("application/octet-stream", vec![0u8; 512])
//!         .with_header("Content-Disposition",
//!                      "attachment; filename=\"report.pdf.pgp\""),
//! ]);
//!
//! let content = mime::extract(&tree, None, &Config::default());
//! assert_eq!(content.text.as_deref(), Some("Hi, see attached."));
//! assert_eq!(content.attachments[0].treat_as, TreatAs::Encrypted);
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use crate::normalize::normalize;
use crate::scan::{Block, Kind, Scanner};
use crate::{Config, Result};

/// A node of a parsed MIME tree.
///
/// Bodies have their content transfer encoding removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeNode {
    /// The node's headers, in order.
    pub headers: Vec<(String, String)>,
    /// The decoded body of a leaf.
    pub body: Vec<u8>,
    /// The parts of a multipart node.
    pub children: Vec<MimeNode>,
}

impl MimeNode {
    /// Creates a leaf with the given content type.
    pub fn leaf<B: Into<Vec<u8>>>(content_type: &str, body: B) -> Self {
        MimeNode {
            headers: vec![("Content-Type".into(), content_type.into())],
            body: body.into(),
            children: Vec::new(),
        }
    }

    /// Creates a multipart node.
    pub fn multipart(content_type: &str, children: Vec<MimeNode>) -> Self {
        MimeNode {
            headers: vec![("Content-Type".into(), content_type.into())],
            body: Vec::new(),
            children,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the value of the first header called `name`.
    ///
    /// Header names are compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the lower-cased media type, without parameters.
    ///
    /// Nodes without a content type are `text/plain`.
    pub fn content_type(&self) -> String {
        self.header("Content-Type")
            .and_then(|v| v.split(';').next())
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| ! t.is_empty())
            .unwrap_or_else(|| "text/plain".into())
    }

    /// Returns the file name.
    ///
    /// This is the `filename` parameter of the disposition, or the
    /// legacy `name` parameter of the content type.
    pub fn filename(&self) -> Option<String> {
        self.header("Content-Disposition")
            .and_then(|v| parameter(v, "filename"))
            .or_else(|| self.header("Content-Type")
                     .and_then(|v| parameter(v, "name")))
            .filter(|n| ! n.is_empty())
    }

    /// Returns whether the part is meant to be displayed inline.
    pub fn is_inline(&self) -> bool {
        self.header("Content-Disposition")
            .map(|v| v.trim_start().to_ascii_lowercase().starts_with("inline"))
            .unwrap_or(false)
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Returns the value of a header parameter.
fn parameter(value: &str, name: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|p| {
        let mut kv = p.splitn(2, '=');
        let key = kv.next()?.trim();
        let value = kv.next()?.trim();
        if key.eq_ignore_ascii_case(name) {
            Some(value.trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Converts HTML bodies to text.
///
/// Used when a message has an HTML body but no text body.
pub trait HtmlToText {
    /// Returns the text rendition of `html`.
    fn html_to_text(&self, html: &str) -> String;
}

impl<F: Fn(&str) -> String> HtmlToText for F {
    fn html_to_text(&self, html: &str) -> String {
        self(html)
    }
}

/// How an attachment should be handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TreatAs {
    /// Not shown at all.
    ///
    /// E.g. the version part of a PGP/MIME message.
    Hidden,
    /// A detached signature.
    Signature,
    /// An armored message to be decrypted and shown inline.
    Message,
    /// An encrypted file.
    Encrypted,
    /// A public key to be offered for import.
    PublicKey,
    /// An ordinary attachment.
    Standard,
}

/// Files that are never shown.
const HIDDEN_NAMES: &[&str] = &[
    "PGPexch.htm.pgp",
    "PGPMIME version identification",
    "Version.txt",
];

/// Files that hold the encrypted message body.
const MESSAGE_NAMES: &[&str] = &[
    "message",
    "msg.asc",
    "message.asc",
    "encrypted.asc",
    "encrypted.eml.pgp",
    "Message.pgp",
];

lazy_static! {
    static ref ENCRYPTED_NAME: Regex =
        Regex::new(r"(\.pgp$)|(\.gpg$)|(\.[a-zA-Z0-9]{3,4}\.asc$)").unwrap();
    static ref KEYID_NAME: Regex =
        Regex::new(r"^(0|0x)?[A-F0-9]{8}([A-F0-9]{8})?.*\.asc$").unwrap();
    static ref NAMED_KEY: Regex =
        Regex::new(r"[A-F0-9]{8}.*\.asc$").unwrap();
}

/// Decides how an attachment is handled.
///
/// The first matching rule wins.  Rules look at the file name, the
/// content type, the size and the disposition.
pub fn treat_as(name: Option<&str>, content_type: &str, size: usize,
                inline: bool, config: &Config)
                -> TreatAs
{
    let name = name.unwrap_or("");

    if HIDDEN_NAMES.contains(&name) {
        TreatAs::Hidden
    } else if name == "signature.asc"
        || content_type == "application/pgp-signature"
    {
        TreatAs::Signature
    } else if name.is_empty() && ! content_type.starts_with("image/") {
        // PGP/MIME control parts and their kin.
        if size < config.hidden_attachment_max_size {
            TreatAs::Hidden
        } else {
            TreatAs::Message
        }
    } else if MESSAGE_NAMES.contains(&name) {
        TreatAs::Message
    } else if ENCRYPTED_NAME.is_match(name) {
        TreatAs::Encrypted
    } else if KEYID_NAME.is_match(name) {
        TreatAs::PublicKey
    } else if name.to_lowercase().contains("public") && NAMED_KEY.is_match(name)
    {
        TreatAs::PublicKey
    } else if name.ends_with(".asc") && size < config.asc_message_max_size
        && ! inline
    {
        TreatAs::Message
    } else {
        TreatAs::Standard
    }
}

/// A part that is not one of the bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// The file name, if any.
    pub name: Option<String>,
    /// The media type.
    pub content_type: String,
    /// Whether the part is marked inline.
    pub inline: bool,
    /// The decoded content.
    pub data: Vec<u8>,
    /// How to handle the part.
    pub treat_as: TreatAs,
}

impl Attachment {
    fn new(part: Part, config: &Config) -> Self {
        let treat_as = treat_as(part.name.as_deref(), &part.content_type,
                                part.data.len(), part.inline, config);
        Attachment {
            name: part.name,
            content_type: part.content_type,
            inline: part.inline,
            data: part.data,
            treat_as,
        }
    }

    /// Returns the attachment as block, if it is armored text.
    ///
    /// Public keys and armored messages qualify.
    pub fn block(&self) -> Option<Block> {
        let kind = match self.treat_as {
            TreatAs::PublicKey => Kind::PublicKey,
            TreatAs::Message | TreatAs::Encrypted => Kind::Message,
            _ => return None,
        };

        let text = std::str::from_utf8(&self.data).ok()?;
        let header = kind.begin()?;
        if ! text.trim_start().starts_with(header) {
            return None;
        }

        Some(Block {
            kind,
            content: normalize(text, kind),
            complete: true,
            span: 0..0,
        })
    }
}

/// What [`extract`] found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeContent {
    /// The text body.
    pub text: Option<String>,
    /// The HTML body.
    pub html: Option<String>,
    /// The detached signature over the signed part.
    pub signature: Option<String>,
    /// All other parts, in document order.
    pub attachments: Vec<Attachment>,
}

impl MimeContent {
    /// Returns the blocks of the text body followed by the armored
    /// attachments.
    ///
    /// Blocks from attachments have an empty span: they are not part
    /// of the scanned text.
    pub fn blocks(&self, scanner: &Scanner) -> Result<Vec<Block>> {
        let mut blocks = match &self.text {
            Some(text) => scanner.scan(text)?.blocks,
            None => Vec::new(),
        };
        blocks.extend(self.attachments.iter().filter_map(Attachment::block));
        Ok(blocks)
    }
}

/// A leaf, before classification.
#[derive(Clone, Debug)]
struct Part {
    name: Option<String>,
    content_type: String,
    inline: bool,
    data: Vec<u8>,
}

impl Part {
    fn new(node: &MimeNode) -> Self {
        Part {
            name: node.filename(),
            content_type: node.content_type(),
            inline: node.is_inline(),
            data: node.body.clone(),
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// What a subtree contributes.
#[derive(Clone, Debug, Default)]
struct Partial {
    text: Option<Part>,
    html: Option<Part>,
    signature: Option<Part>,
    attachments: Vec<Part>,
}

impl Partial {
    fn of(node: &MimeNode) -> Self {
        if ! node.is_leaf() {
            return node.children.iter()
                .map(Partial::of)
                .fold(Partial::default(), Partial::merge);
        }

        let part = Part::new(node);
        let mut partial = Partial::default();
        match part.content_type.as_str() {
            "application/pgp-signature" => partial.signature = Some(part),
            "text/plain" if part.name.is_none() => partial.text = Some(part),
            "text/html" if part.name.is_none() => partial.html = Some(part),
            _ => partial.attachments.push(part),
        }
        partial
    }

    /// Combines two siblings.
    ///
    /// The earlier sibling's bodies win, a later body of the same
    /// kind is demoted to an attachment.
    fn merge(self, later: Partial) -> Partial {
        let mut attachments = self.attachments;
        let mut first = |mine: Option<Part>, theirs: Option<Part>| {
            match (mine, theirs) {
                (Some(mine), Some(theirs)) => {
                    attachments.push(theirs);
                    Some(mine)
                },
                (mine, theirs) => mine.or(theirs),
            }
        };

        let text = first(self.text, later.text);
        let html = first(self.html, later.html);
        let signature = first(self.signature, later.signature);
        attachments.extend(later.attachments);

        Partial { text, html, signature, attachments }
    }
}

/// Extracts bodies, signature and attachments from a MIME tree.
///
/// The first text/plain and text/html leaves without a file name
/// become the bodies, the first application/pgp-signature leaf the
/// signature.  If there is an HTML body but no text body and
/// `html_to_text` is given, the text body is derived from the HTML
/// body.
pub fn extract(root: &MimeNode, html_to_text: Option<&dyn HtmlToText>,
               config: &Config)
               -> MimeContent
{
    let partial = Partial::of(root);

    let html = partial.html.as_ref().map(Part::text);
    let text = partial.text.as_ref().map(Part::text).or_else(|| {
        let convert = html_to_text?;
        html.as_deref().map(|h| convert.html_to_text(h))
    });

    MimeContent {
        text,
        html,
        signature: partial.signature.as_ref().map(Part::text),
        attachments: partial.attachments.into_iter()
            .map(|p| Attachment::new(p, config))
            .collect(),
    }
}
