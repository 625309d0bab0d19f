// src/ingest/parser.rs
//! Tolerant feed-item extraction.
//!
//! Feeds disagree on markup: RSS 2.0 wraps entries in `<item>`, Atom in
//! `<entry>`, and the field tags inside differ again (plain text, CDATA,
//! escaped HTML, `<link href="..."/>`). The reader walks the event stream,
//! treats both block tags uniformly, and takes the first matching
//! alternative per field. Parsing is best-effort: a damaged document yields
//! the items extracted before the damage, never an error.

use once_cell::sync::OnceCell;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use regex::Regex;

use crate::ingest::types::FeedItem;

/// Descriptions are capped at this many characters after markup stripping.
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Field alternatives in preference order; a lower rank wins regardless of
/// document order.
fn description_rank(tag: &str) -> Option<u8> {
    match tag {
        "description" => Some(0),
        "summary" => Some(1),
        "content" => Some(2),
        _ => None,
    }
}

fn date_rank(tag: &str) -> Option<u8> {
    match tag {
        "pubdate" => Some(0),
        "published" => Some(1),
        "updated" => Some(2),
        _ => None,
    }
}

fn is_field_tag(tag: &str) -> bool {
    matches!(tag, "title" | "link") || description_rank(tag).is_some() || date_rank(tag).is_some()
}

#[derive(Default)]
struct ItemDraft {
    title: String,
    link_text: String,
    link_href: String,
    description: Option<(u8, String)>,
    date: Option<(u8, String)>,
}

impl ItemDraft {
    fn offer(&mut self, tag: &str, raw: &str) {
        match tag {
            "title" => {
                if self.title.trim().is_empty() {
                    self.title = raw.trim().to_string();
                }
            }
            "link" => {
                if self.link_text.trim().is_empty() {
                    self.link_text = raw.trim().to_string();
                }
            }
            _ => {
                if let Some(rank) = description_rank(tag) {
                    let better = self.description.as_ref().map_or(true, |(r, _)| rank < *r);
                    if better && !raw.trim().is_empty() {
                        self.description = Some((rank, raw.to_string()));
                    }
                } else if let Some(rank) = date_rank(tag) {
                    let better = self.date.as_ref().map_or(true, |(r, _)| rank < *r);
                    if better && !raw.trim().is_empty() {
                        self.date = Some((rank, raw.trim().to_string()));
                    }
                }
            }
        }
    }

    fn finish(self, source: &str) -> Option<FeedItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            // Title is the only required field.
            return None;
        }
        let link = if self.link_text.is_empty() {
            self.link_href
        } else {
            self.link_text
        };
        let description = self
            .description
            .map(|(_, text)| clean_description(&text))
            .unwrap_or_default();
        let pub_date = self.date.map(|(_, text)| text).unwrap_or_default();
        Some(FeedItem {
            title,
            link,
            description,
            pub_date,
            source: source.to_string(),
        })
    }
}

/// Extract every well-formed item block from a feed body.
pub fn parse_feed_items(body: &str, source: &str) -> Vec<FeedItem> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut draft: Option<ItemDraft> = None;
    // Lowercased local name of the field currently being captured.
    let mut capture: Option<String> = None;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = local_tag(e.name());
                match draft.as_mut() {
                    None => {
                        if tag == "item" || tag == "entry" {
                            draft = Some(ItemDraft::default());
                        }
                    }
                    Some(d) => {
                        if capture.is_none() && is_field_tag(&tag) {
                            if tag == "link" && d.link_href.is_empty() {
                                if let Some(href) = href_attr(&e) {
                                    d.link_href = href;
                                }
                            }
                            capture = Some(tag);
                            buf.clear();
                        }
                        // Markup nested inside a captured field is dropped;
                        // its text still accumulates below.
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = local_tag(e.name());
                if let Some(d) = draft.as_mut() {
                    if tag == "link" && d.link_href.is_empty() {
                        if let Some(href) = href_attr(&e) {
                            d.link_href = href;
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if capture.is_some() {
                    if let Ok(text) = t.unescape() {
                        buf.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if capture.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let tag = local_tag(e.name());
                if capture.as_deref() == Some(tag.as_str()) {
                    if let Some(d) = draft.as_mut() {
                        d.offer(&tag, &buf);
                    }
                    capture = None;
                    buf.clear();
                } else if tag == "item" || tag == "entry" {
                    if let Some(item) = draft.take().and_then(|d| d.finish(source)) {
                        items.push(item);
                    }
                    capture = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    source,
                    kept = items.len(),
                    "feed markup error, keeping items parsed so far"
                );
                break;
            }
            Ok(_) => {}
        }
    }

    items
}

fn local_tag(name: QName) -> String {
    String::from_utf8_lossy(name.local_name().as_ref()).to_ascii_lowercase()
}

fn href_attr(e: &BytesStart) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Decode entities, strip embedded markup, collapse whitespace, cap length.
pub fn clean_description(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    if out.chars().count() > MAX_DESCRIPTION_CHARS {
        out = out.chars().take(MAX_DESCRIPTION_CHARS).collect();
    }
    out
}
