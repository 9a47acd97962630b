//! Raw feed parsing and internal entry-payload construction.
//!
//! The Store only ever sees the internal `<entry>` XML payload produced by
//! [`build_entry_payload`] — never the raw feed bytes a source returns. This
//! keeps the Store decoder-agnostic: it has no idea whether a source speaks
//! RSS 2.0, Atom, or anything else.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

/// Fields lifted out of one `<item>`/`<entry>` element in a raw feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssItemFields {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub author: Option<String>,
}

/// Parse every `<item>` (RSS) or `<entry>` (Atom) element out of raw feed XML.
pub fn parse_feed_items(xml: &str) -> Result<Vec<RssItemFields>, String> {
    let doc = Document::parse(xml).map_err(|e| e.to_string())?;

    let items: Vec<RssItemFields> = doc
        .descendants()
        .filter(|n| n.is_element() && (n.tag_name().name() == "item" || n.tag_name().name() == "entry"))
        .map(|node| {
            let child_text = |name: &str| -> Option<String> {
                node.children()
                    .find(|c| c.is_element() && c.tag_name().name() == name)
                    .and_then(|c| c.text())
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
            };

            let link = child_text("link").or_else(|| {
                // Atom stores the href as an attribute rather than text.
                node.children()
                    .find(|c| c.is_element() && c.tag_name().name() == "link")
                    .and_then(|c| c.attribute("href"))
                    .map(|s| s.to_string())
            });

            RssItemFields {
                guid: child_text("guid").or_else(|| child_text("id")),
                title: child_text("title"),
                link,
                summary: child_text("description").or_else(|| child_text("summary")),
                published: child_text("pubDate").or_else(|| child_text("published")),
                updated: child_text("updated"),
                author: child_text("author"),
            }
        })
        .collect();

    Ok(items)
}

/// The guid is the item's identity within its source: the feed's own guid if
/// present, else the link. An item with neither is skipped by the caller.
pub fn extract_guid(fields: &RssItemFields) -> Option<String> {
    fields.guid.clone().or_else(|| fields.link.clone())
}

fn write_child(writer: &mut Writer<&mut Vec<u8>>, tag: &str, value: &str) -> Result<(), String> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(|e| e.to_string())?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| e.to_string())?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| e.to_string())
}

/// Build the internal `<entry>` payload the Store stores for one item.
pub fn build_entry_payload(fields: &RssItemFields) -> Result<String, String> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);

    writer
        .write_event(Event::Start(BytesStart::new("entry")))
        .map_err(|e| e.to_string())?;

    if let Some(id) = &fields.guid {
        write_child(&mut writer, "id", id)?;
    }
    if let Some(title) = &fields.title {
        write_child(&mut writer, "title", title)?;
    }
    if let Some(link) = &fields.link {
        write_child(&mut writer, "link", link)?;
    }
    if let Some(summary) = &fields.summary {
        write_child(&mut writer, "summary", summary)?;
    }
    if let Some(published) = &fields.published {
        write_child(&mut writer, "published", published)?;
    }
    if let Some(updated) = &fields.updated {
        write_child(&mut writer, "updated", updated)?;
    }
    if let Some(author) = &fields.author {
        write_child(&mut writer, "author", author)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .map_err(|e| e.to_string())?;

    String::from_utf8(buf).map_err(|e| e.to_string())
}
