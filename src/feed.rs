//! Streaming extraction of `<item>` records from RSS documents.
//!
//! The parser does not validate against any RSS schema: it walks the XML
//! event stream, picks up `title`, `link` and `pubDate` children of every
//! `item` element and stops as soon as the item cap is reached.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;

pub const NO_TITLE: &str = "No Title";
pub const UNKNOWN_DATE: &str = "Unknown Date";

/// One `<item>` as it appeared in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Raw `pubDate` text, never parsed
    pub published: String,
    pub image_url: Option<String>,
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
    image_url: Option<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, element: &str, text: &str) {
        let slot = match element {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "pubDate" => &mut self.published,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn take_image(&mut self, e: &BytesStart) {
        if self.image_url.is_some() {
            return;
        }
        let name = e.name();
        let name = String::from_utf8_lossy(name.as_ref());

        let mut url = None;
        let mut media_type = None;
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            match attr.key.as_ref() {
                b"url" => url = Some(value),
                b"type" | b"medium" => media_type = Some(value),
                _ => {}
            }
        }

        let is_image = match &*name {
            "media:thumbnail" => true,
            "media:content" | "enclosure" => media_type
                .as_deref()
                .map(|t| t.starts_with("image"))
                .unwrap_or(name == "media:content"),
            _ => false,
        };
        if is_image {
            self.image_url = url;
        }
    }

    fn build(self) -> FeedEntry {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        FeedEntry {
            title: non_blank(self.title).unwrap_or_else(|| NO_TITLE.to_string()),
            link: non_blank(self.link).filter(|l| is_web_url(l)).unwrap_or_default(),
            published: non_blank(self.published).unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            image_url: non_blank(self.image_url).filter(|u| is_web_url(u)),
        }
    }
}

/// Only absolute http(s) URLs are rendered as links or images.
fn is_web_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extract up to `max_items` entries from a feed document, in document order.
pub fn parse_items(xml: &[u8], max_items: usize) -> Result<Vec<FeedEntry>, ParseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    if max_items == 0 {
        return Ok(entries);
    }

    let mut buf = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    // Path of open elements below the current <item>
    let mut item_path: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut saw_element = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                saw_element = true;
                depth += 1;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

                match current.as_mut() {
                    Some(builder) => {
                        builder.take_image(&e);
                        item_path.push(name);
                    }
                    None if name == "item" => {
                        current = Some(EntryBuilder::default());
                        item_path.clear();
                    }
                    None => {}
                }
            }
            Event::Empty(e) => {
                saw_element = true;
                if let Some(builder) = current.as_mut() {
                    builder.take_image(&e);
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if current.is_some()
                    && item_path.pop().is_none()
                    && e.name().as_ref() == b"item"
                {
                    if let Some(builder) = current.take() {
                        entries.push(builder.build());
                    }
                    if entries.len() >= max_items {
                        break;
                    }
                }
            }
            Event::Text(e) => {
                if let (Some(builder), [element]) = (current.as_mut(), item_path.as_slice()) {
                    let text = e.unescape().map_err(|err| ParseError::Xml {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    builder.push_text(element, &text);
                }
            }
            Event::CData(e) => {
                if let (Some(builder), [element]) = (current.as_mut(), item_path.as_slice()) {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    builder.push_text(element, &text);
                }
            }
            Event::Eof => {
                if !saw_element {
                    return Err(ParseError::Empty);
                }
                if depth > 0 {
                    return Err(ParseError::Truncated(depth));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}
