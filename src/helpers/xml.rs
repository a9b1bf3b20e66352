//! XML reading utilities shared by the xlsx and ods readers.
//!
//! [`XmlReader`] owns its event buffer so callers can loop with
//! [`match_xml_events!`](crate::match_xml_events) without juggling lifetimes,
//! and the helper traits read attributes and text runs into owned values.

use crate::error::SheetTablesError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Wraps `buf_reader`; empty elements are expanded into start/end pairs and text is kept untrimmed.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event, `None` at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SheetTablesError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(SheetTablesError::XmlError(error)),
        }
    }
}

pub(crate) trait XmlAttributeHelper<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, SheetTablesError>;

    fn parse_value<T: FromStr>(&self) -> Result<T, SheetTablesError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, SheetTablesError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, SheetTablesError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => SheetTablesError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => SheetTablesError::StringEncodingError(error),
            })
    }
}

/// Attribute lookup by qualified name (`r`, `table:name`, ...).
pub(crate) trait XmlNodeHelper<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetTablesError>;

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, SheetTablesError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetTablesError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, SheetTablesError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Appends text runs and entity references to a value being assembled.
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), SheetTablesError>;

    /// Resolves `&amp;`-style entities and `&#...;` character references.
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetTablesError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), SheetTablesError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SheetTablesError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Loops over the events of an [`XmlReader`] until end of document, matching each against the given arms.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
