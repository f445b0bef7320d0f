//! Thin quick-xml wrapper used by the workbook reader.
use crate::source::SourceError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;

/// Streaming reader that reuses one event buffer.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
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

    /// Next event, or `None` at the end of the document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SourceError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Unescaped attribute value by name.
pub(crate) fn attribute<'a>(event: &'a BytesStart<'a>, name: &str) -> Result<Option<Cow<'a, str>>, SourceError> {
    match event.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?)),
        None => Ok(None),
    }
}

/// Appends the character an entity or character reference stands for.
pub(crate) fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), SourceError> {
    let raw = reference.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        };
        match code.ok().and_then(char::from_u32) {
            Some(character) => text.push(character),
            None => return Err(SourceError::XmlEntityError(raw.to_string())),
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        return Err(SourceError::XmlEntityError(raw.to_string()));
    }
    Ok(())
}

/// Loops over the events of an [`XmlReader`], ignoring unmatched ones.
macro_rules! for_each_xml_event {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}

pub(crate) use for_each_xml_event;
