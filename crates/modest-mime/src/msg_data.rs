//! Reading composed messages back: header indexing, draft decomposition and
//! part size probing.

use crate::{InlineImage, MimeError, MimeResult, OutgoingAttachment, OutgoingMessage, Priority};
use chrono::{DateTime, Utc};
use mail_parser::{Addr, Address, MessageParser, MimeHeaders};
use modest_store::{EmailAddress, HeaderId, MessageFlags, MessageHeader};

/// Everything the composer needs to show a message for editing.
///
/// Every field is owned; releasing the data is simply dropping it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgData {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub plain_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
    pub images: Vec<InlineImage>,
    pub priority: Priority,
}

impl MsgData {
    /// Turn edited data back into a message to compose
    pub fn into_outgoing(self) -> OutgoingMessage {
        OutgoingMessage {
            from: self.from.unwrap_or_default(),
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            subject: self.subject.unwrap_or_default(),
            text_body: self.plain_body,
            html_body: self.html_body,
            attachments: self.attachments,
            images: self.images,
            priority: self.priority,
            ..Default::default()
        }
    }
}

fn display_addr(addr: &Addr) -> Option<String> {
    let email = addr.address.as_ref()?;
    Some(match &addr.name {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, email),
        _ => email.to_string(),
    })
}

fn addresses(address: Option<&Address>) -> Vec<String> {
    match address {
        Some(Address::List(addrs)) => addrs.iter().filter_map(display_addr).collect(),
        Some(Address::Group(groups)) => groups
            .iter()
            .flat_map(|g| g.addresses.iter())
            .filter_map(display_addr)
            .collect(),
        None => Vec::new(),
    }
}

fn first_address(address: Option<&Address>) -> Option<EmailAddress> {
    let addr = match address? {
        Address::List(addrs) => addrs.first()?,
        Address::Group(groups) => groups.first()?.addresses.first()?,
    };
    Some(EmailAddress::new(
        addr.name.as_ref().map(|n| n.to_string()),
        addr.address.as_ref()?.to_string(),
    ))
}

/// Value of a top-level header, read straight from the raw header block
fn raw_header_value<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
}

fn mime_type_of(part: &mail_parser::MessagePart<'_>) -> String {
    MimeHeaders::content_type(part)
        .map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Build the header a store indexes a raw message under
pub fn parse_header(raw: &[u8]) -> MimeResult<MessageHeader> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MimeError::ParseError("not an RFC 5322 message".to_string()))?;

    let date_sent = message
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);
    let message_id = message.message_id().map(String::from);

    Ok(MessageHeader {
        id: HeaderId::new(),
        folder: None,
        uid: message_id.clone().unwrap_or_default(),
        message_id,
        subject: message.subject().map(String::from),
        from: first_address(message.from()),
        to: addresses(message.to())
            .into_iter()
            .map(|a| EmailAddress::new(None, a))
            .collect(),
        date_sent,
        size: raw.len() as u64,
        flags: MessageFlags::default(),
    })
}

/// Decompose a message (typically a draft) into editable data
pub fn get_msg_data(raw: &[u8]) -> MimeResult<MsgData> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MimeError::ParseError("not an RFC 5322 message".to_string()))?;

    let mut data = MsgData {
        from: addresses(message.from()).into_iter().next(),
        to: addresses(message.to()),
        cc: addresses(message.cc()),
        bcc: addresses(message.bcc()),
        subject: message.subject().map(String::from),
        plain_body: message.body_text(0).map(|s| s.into_owned()),
        html_body: message.body_html(0).map(|s| s.into_owned()),
        priority: raw_header_value(&String::from_utf8_lossy(raw), "X-Priority")
            .map(Priority::from_header)
            .unwrap_or_default(),
        ..Default::default()
    };

    // Parts with a Content-ID are inline resources, the rest are attachments
    for part in message.attachments() {
        let mime_type = mime_type_of(part);
        let contents = part.contents().to_vec();
        if let Some(cid) = part.content_id() {
            data.images.push(InlineImage {
                content_id: cid.trim_start_matches('<').trim_end_matches('>').to_string(),
                mime_type,
                data: contents,
            });
            continue;
        }
        data.attachments.push(OutgoingAttachment {
            filename: part.attachment_name().unwrap_or("attachment").to_string(),
            mime_type,
            data: contents,
        });
    }

    Ok(data)
}

/// Decoded size in bytes of the `index`-th attachment or inline part
pub fn attachment_size(raw: &[u8], index: usize) -> MimeResult<u64> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MimeError::ParseError("not an RFC 5322 message".to_string()))?;
    let size = message
        .attachments()
        .nth(index)
        .map(|part| part.contents().len() as u64);
    size.ok_or(MimeError::PartNotFound(index))
}
