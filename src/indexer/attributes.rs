//! Mail attribute extraction
//!
//! Maps a loaded `(mail, body, files)` triple onto the tokenizer's lazy
//! attribute-text producers. Each logical attribute carries a distinct tag
//! that ends up in every posting derived from it.

use crate::core::AttributeText;
use crate::types::{Mail, MailAddress, MailBody, MailFile};

/// Attribute tags, bound statically at schema level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MailAttribute {
    Subject = 0,
    ToRecipients = 1,
    CcRecipients = 2,
    BccRecipients = 3,
    Sender = 4,
    Body = 5,
    Attachments = 6,
}

impl MailAttribute {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

fn join_recipients(recipients: &[MailAddress]) -> String {
    recipients
        .iter()
        .map(MailAddress::display)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the attribute-text producers for one mail.
pub fn mail_attributes(mail: &Mail, body: MailBody, files: Vec<MailFile>) -> Vec<AttributeText> {
    let subject = mail.subject.clone();
    let to = join_recipients(&mail.to_recipients);
    let cc = join_recipients(&mail.cc_recipients);
    let bcc = join_recipients(&mail.bcc_recipients);
    let sender = mail
        .sender
        .as_ref()
        .map(MailAddress::display)
        .unwrap_or_default();

    vec![
        AttributeText::new(MailAttribute::Subject.tag(), move || subject),
        AttributeText::new(MailAttribute::ToRecipients.tag(), move || to),
        AttributeText::new(MailAttribute::CcRecipients.tag(), move || cc),
        AttributeText::new(MailAttribute::BccRecipients.tag(), move || bcc),
        AttributeText::new(MailAttribute::Sender.tag(), move || sender),
        AttributeText::new(MailAttribute::Body.tag(), move || {
            html2text::from_read(body.text.as_bytes(), 80)
        }),
        AttributeText::new(MailAttribute::Attachments.tag(), move || {
            files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
    ]
}
