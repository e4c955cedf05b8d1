//! Outgoing message composition

use crate::{parse_header, MimeError, MimeResult};
use lettre::{
    address::Envelope,
    message::{
        header::{ContentType, HeaderName, HeaderValue},
        Attachment, Mailbox, MultiPart, SinglePart,
    },
    Address,
};
use tracing::debug;

/// An attachment to include in an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    /// Filename to display
    pub filename: String,
    /// MIME type (e.g., "application/pdf")
    pub mime_type: String,
    /// Raw file data
    pub data: Vec<u8>,
}

/// An image referenced from the HTML body through `cid:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Content-ID without angle brackets
    pub content_id: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Message priority, written as `X-Priority`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    High,
    Low,
}

impl Priority {
    fn header_value(&self) -> Option<&'static str> {
        match self {
            Priority::Normal => None,
            Priority::High => Some("1"),
            Priority::Low => Some("5"),
        }
    }

    /// Read an `X-Priority` value ("1 (Highest)", "5", ...)
    pub fn from_header(value: &str) -> Self {
        match value.trim().chars().next() {
            Some('1') | Some('2') => Priority::High,
            Some('4') | Some('5') => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

/// Email message to compose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// From address, either "addr" or "Name <addr>"
    pub from: String,
    /// To addresses
    pub to: Vec<String>,
    /// CC addresses
    pub cc: Vec<String>,
    /// BCC addresses
    pub bcc: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: Option<String>,
    /// HTML body
    pub html_body: Option<String>,
    /// In-Reply-To header
    pub in_reply_to: Option<String>,
    /// References header
    pub references: Vec<String>,
    /// File attachments
    pub attachments: Vec<OutgoingAttachment>,
    /// Images embedded in the HTML body
    pub images: Vec<InlineImage>,
    pub priority: Priority,
}

impl OutgoingMessage {
    /// Create a new message builder
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Add a To recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a CC recipient
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a BCC recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Set the plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Set the In-Reply-To header
    pub fn reply_to_message(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }

    /// Add a reference
    pub fn reference(mut self, message_id: impl Into<String>) -> Self {
        self.references.push(message_id.into());
        self
    }

    /// Add an attachment
    pub fn attachment(mut self, filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachments.push(OutgoingAttachment {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    /// Add an inline image
    pub fn image(mut self, content_id: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.images.push(InlineImage {
            content_id: content_id.into(),
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the message has at least one recipient of any kind
    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

fn mailbox(address: &str) -> MimeResult<Mailbox> {
    address
        .parse()
        .map_err(|e| MimeError::InvalidAddress(format!("{}: {}", address, e)))
}

fn content_type(mime_type: &str) -> MimeResult<ContentType> {
    // Unknown types fall back to application/octet-stream
    mime_type
        .parse::<ContentType>()
        .or_else(|_| ContentType::parse("application/octet-stream"))
        .map_err(|e| MimeError::MessageBuildError(e.to_string()))
}

/// Build a lettre Message from OutgoingMessage.
///
/// The Bcc header is kept in the output; stripping it is the send queue's job.
pub fn build_lettre_message(msg: &OutgoingMessage) -> MimeResult<lettre::Message> {
    let from_mailbox = mailbox(&msg.from)?;

    let mut builder = lettre::Message::builder()
        .from(from_mailbox.clone())
        .subject(msg.subject.clone())
        .keep_bcc();

    for to in &msg.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &msg.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &msg.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }

    // Drafts may have no recipients yet; lettre still wants an envelope
    if !msg.has_recipients() {
        let address: Address = from_mailbox.email.clone();
        let envelope = Envelope::new(Some(address.clone()), vec![address])
            .map_err(|e| MimeError::MessageBuildError(e.to_string()))?;
        builder = builder.envelope(envelope);
    }

    if let Some(ref reply_to) = msg.in_reply_to {
        builder = builder.in_reply_to(reply_to.clone());
    }
    if !msg.references.is_empty() {
        builder = builder.references(msg.references.join(" "));
    }
    if let Some(value) = msg.priority.header_value() {
        builder = builder.raw_header(HeaderValue::new(
            HeaderName::new_from_ascii_str("X-Priority"),
            value.to_string(),
        ));
    }

    let text = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(msg.text_body.clone().unwrap_or_default());
    let mut body_part = MultiPart::alternative().singlepart(text);

    if let Some(ref html) = msg.html_body {
        let html_part = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(html.clone());
        if msg.images.is_empty() {
            body_part = body_part.singlepart(html_part);
        } else {
            let mut related = MultiPart::related().singlepart(html_part);
            for image in &msg.images {
                related = related.singlepart(
                    Attachment::new_inline(image.content_id.clone())
                        .body(image.data.clone(), content_type(&image.mime_type)?),
                );
            }
            body_part = body_part.multipart(related);
        }
    }

    // Images without an HTML body to reference them travel as inline parts
    let loose_images: &[InlineImage] = if msg.html_body.is_none() {
        &msg.images
    } else {
        &[]
    };

    let message = if msg.attachments.is_empty() && loose_images.is_empty() {
        builder
            .multipart(body_part)
            .map_err(|e| MimeError::MessageBuildError(e.to_string()))?
    } else {
        let mut mixed = MultiPart::mixed().multipart(body_part);

        for image in loose_images {
            mixed = mixed.singlepart(
                Attachment::new_inline(image.content_id.clone())
                    .body(image.data.clone(), content_type(&image.mime_type)?),
            );
        }
        for att in &msg.attachments {
            let attachment = Attachment::new(att.filename.clone())
                .body(att.data.clone(), content_type(&att.mime_type)?);
            mixed = mixed.singlepart(attachment);
        }

        builder
            .multipart(mixed)
            .map_err(|e| MimeError::MessageBuildError(e.to_string()))?
    };

    Ok(message)
}

/// Compose a complete message: raw RFC 5322 bytes plus the header a store
/// would index it under. The header is not attached to any folder yet.
pub fn compose(msg: &OutgoingMessage) -> MimeResult<modest_store::Message> {
    let raw = build_lettre_message(msg)?.formatted();
    let header = parse_header(&raw)?;
    debug!(
        "Composed message {:?} ({} bytes, {} attachments)",
        header.subject,
        raw.len(),
        msg.attachments.len()
    );
    Ok(modest_store::Message::new(header, raw))
}
