use std::path::Path;

use nemea_wire::{BlacklistCatalog, BlacklistEntry, BlacklistId};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlacklistXmlError {
    #[error("reading blacklist config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing blacklist config: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("parsing blacklist config: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("blacklist entry missing required attribute `{0}`")]
    MissingAttr(&'static str),
    #[error("blacklist id `{0}` is not a valid index")]
    InvalidId(String),
}

/// Parses the blacklist catalog XML (§6) into a [`BlacklistCatalog`].
///
/// Expected shape:
/// ```xml
/// <blacklists>
///   <blacklist id="1" name="feodo" category="Intrusion.Botnet.Feodo" source="https://..."/>
///   ...
/// </blacklists>
/// ```
/// The `id` attribute is the 1-indexed position in the 64-bit bitmap, not
/// the bit value itself; [`BlacklistId::from_index`] performs the shift.
pub fn load(path: &Path) -> Result<BlacklistCatalog, BlacklistXmlError> {
    let raw = std::fs::read_to_string(path)?;
    parse(&raw)
}

fn parse(xml: &str) -> Result<BlacklistCatalog, BlacklistXmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) if tag.name().as_ref() == b"blacklist" => {
                let mut id = None;
                let mut name = None;
                let mut category = None;
                let mut source = None;
                for attr in tag.attributes() {
                    let attr = attr?;
                    let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
                    match attr.key.as_ref() {
                        b"id" => id = Some(value),
                        b"name" => name = Some(value),
                        b"category" => category = Some(value),
                        b"source" => source = Some(value),
                        _ => {}
                    }
                }
                let id_str = id.ok_or(BlacklistXmlError::MissingAttr("id"))?;
                let index: u32 = id_str
                    .parse()
                    .map_err(|_| BlacklistXmlError::InvalidId(id_str.clone()))?;
                if index == 0 || index > 64 {
                    return Err(BlacklistXmlError::InvalidId(id_str));
                }
                entries.push(BlacklistEntry {
                    id: BlacklistId::from_index(index),
                    name: name.ok_or(BlacklistXmlError::MissingAttr("name"))?,
                    category: category.ok_or(BlacklistXmlError::MissingAttr("category"))?,
                    source: source.ok_or(BlacklistXmlError::MissingAttr("source"))?,
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(BlacklistCatalog { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_and_shifts_bitmap() {
        let xml = r#"<?xml version="1.0"?>
        <blacklists>
            <blacklist id="1" name="feodo" category="Intrusion.Botnet.Feodo" source="https://a.invalid" />
            <blacklist id="3" name="sinkhole" category="Intrusion.Botnet.Sinkhole" source="https://b.invalid" />
        </blacklists>"#;
        let catalog = parse(xml).unwrap();
        assert_eq!(catalog.entries.len(), 2);
        assert_eq!(catalog.entries[0].id, BlacklistId(1));
        assert_eq!(catalog.entries[1].id, BlacklistId(4));
    }

    #[test]
    fn botnet_category_feeds_activation_set() {
        let xml = r#"<blacklists>
            <blacklist id="1" name="feodo" category="Intrusion.Botnet.Feodo" source="https://a.invalid" />
            <blacklist id="2" name="spam" category="Abuse.Spam" source="https://c.invalid" />
        </blacklists>"#;
        let catalog = parse(xml).unwrap();
        let botnet = catalog.botnet_ids();
        assert!(botnet.contains(&BlacklistId(1)));
        assert_eq!(botnet.len(), 1);
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let xml = r#"<blacklists><blacklist id="1" name="feodo" /></blacklists>"#;
        assert!(parse(xml).is_err());
    }
}
