//! Minimal RSS 2.0 reader producing [`RawEntry`] values.
//!
//! Only the item fields the pipeline consumes are extracted; everything else
//! in the document is skipped.

use hl_core::{Error, MediaObject, RawEntry, Result};
use tracing::debug;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    PubDate,
    Link,
    Description,
    Category,
}

impl ItemField {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"pubDate" => Some(Self::PubDate),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"category" => Some(Self::Category),
            _ => None,
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Text content with HTML5 entities resolved. Undecodable text is kept raw so
/// one item cannot fail the document.
fn text_content(e: &BytesText<'_>) -> String {
    match e.unescape_with(resolve_html5_entity) {
        Ok(value) => value.into_owned(),
        Err(err) => {
            debug!("Keeping raw text, unescape failed: {}", err);
            String::from_utf8_lossy(e).into_owned()
        }
    }
}

fn media_object(element: &BytesStart<'_>) -> MediaObject {
    MediaObject {
        medium: attribute(element, b"medium"),
        url: attribute(element, b"url"),
    }
}

/// Parse an RSS document into its items, in document order.
pub fn parse_rss(xml: &str) -> Result<Vec<RawEntry>> {
    // Fields are trimmed once at their end tag, so whitespace between text
    // and CDATA inside a field survives.
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut seen_channel = false;
    let mut current: Option<RawEntry> = None;
    let mut field: Option<ItemField> = None;
    let mut text = String::new();
    let mut category_term: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"rss" | b"channel" => seen_channel = true,
                b"item" => current = Some(RawEntry::default()),
                b"media:content" => {
                    if let Some(entry) = current.as_mut() {
                        entry.media.push(media_object(e));
                    }
                }
                name if current.is_some() => {
                    if let Some(f) = ItemField::from_tag(name) {
                        field = Some(f);
                        text.clear();
                        if f == ItemField::Category {
                            category_term = attribute(e, b"term");
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    match e.name().as_ref() {
                        b"media:content" => entry.media.push(media_object(e)),
                        b"category" => entry.tags.extend(attribute(e, b"term")),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if field.is_some() {
                    text.push_str(&text_content(e));
                }
            }
            Ok(Event::CData(ref e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                } else if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    if ItemField::from_tag(name.as_ref()) == Some(f) {
                        let value = std::mem::take(&mut text).trim().to_string();
                        match f {
                            ItemField::Title => entry.title = Some(value),
                            ItemField::PubDate => entry.published = Some(value),
                            ItemField::Link => entry.link = Some(value),
                            ItemField::Description => entry.summary = Some(value),
                            ItemField::Category => {
                                let term = category_term.take();
                                if !value.is_empty() {
                                    entry.tags.push(value);
                                } else if let Some(term) = term {
                                    entry.tags.push(term);
                                }
                            }
                        }
                        field = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::FeedFormat(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_channel {
        return Err(Error::FeedFormat("document has no <rss> or <channel> element".to_string()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Top Stories</title>
    <link>https://news.test/</link>
    <item>
      <title><![CDATA[Markets rally as rates hold]]></title>
      <pubDate>Fri, 01 Mar 2024 09:15:00 +0530</pubDate>
      <link>https://news.test/markets</link>
      <description>Stocks &amp; bonds rose.</description>
      <category>Business</category>
      <category term="Economy"/>
      <media:content medium="video" url="https://cdn.test/clip.mp4"/>
      <media:content medium="image" url="https://cdn.test/markets.jpg"></media:content>
    </item>
    <item>
      <title>  Storm warning issued  </title>
      <link></link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_items_in_order() {
        let entries = parse_rss(FEED).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title.as_deref(), Some("Markets rally as rates hold"));
        assert_eq!(first.published.as_deref(), Some("Fri, 01 Mar 2024 09:15:00 +0530"));
        assert_eq!(first.link.as_deref(), Some("https://news.test/markets"));
        assert_eq!(first.summary.as_deref(), Some("Stocks & bonds rose."));
        assert_eq!(first.tags, vec!["Business".to_string(), "Economy".to_string()]);
        assert_eq!(first.media.len(), 2);
        assert_eq!(first.media[1].medium.as_deref(), Some("image"));
        assert_eq!(first.media[1].url.as_deref(), Some("https://cdn.test/markets.jpg"));
    }

    #[test]
    fn test_channel_fields_are_not_items() {
        let entries = parse_rss(FEED).unwrap();
        assert!(entries.iter().all(|e| e.title.as_deref() != Some("Top Stories")));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let entries = parse_rss(FEED).unwrap();
        let second = &entries[1];
        assert_eq!(second.title.as_deref(), Some("Storm warning issued"));
        assert_eq!(second.link.as_deref(), Some(""));
        assert_eq!(second.published, None);
        assert!(second.media.is_empty());
    }

    #[test]
    fn test_html_entities_do_not_fail_the_feed() {
        let xml = r#"<rss><channel>
            <item><title>Good story</title><link>https://news.test/good</link></item>
            <item>
              <title>Bad&nbsp;story &rsquo;24</title>
              <link>https://news.test/bad</link>
              <description>Prices&nbsp;&mdash; up &#8364;5 &amp; climbing</description>
            </item>
            <item><title>Broken &unknownentity; title</title><link>https://news.test/broken</link></item>
        </channel></rss>"#;

        let entries = parse_rss(xml).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title.as_deref(), Some("Good story"));
        assert_eq!(entries[1].title.as_deref(), Some("Bad\u{a0}story \u{2019}24"));
        assert_eq!(entries[1].summary.as_deref(), Some("Prices\u{a0}\u{2014} up \u{20ac}5 & climbing"));
        assert_eq!(entries[2].title.as_deref(), Some("Broken &unknownentity; title"));
        assert_eq!(entries[2].link.as_deref(), Some("https://news.test/broken"));
    }

    #[test]
    fn test_text_and_cdata_keep_their_spacing() {
        let xml = "<rss><channel><item>\n<title>\n  Rates <![CDATA[rise]]> again\n</title>\n</item></channel></rss>";
        let entries = parse_rss(xml).unwrap();
        assert_eq!(entries[0].title.as_deref(), Some("Rates rise again"));
    }

    #[test]
    fn test_empty_channel() {
        let entries = parse_rss("<rss><channel><title>x</title></channel></rss>").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_non_rss_document_is_format_error() {
        assert!(matches!(parse_rss("<html><body/></html>"), Err(Error::FeedFormat(_))));
        assert!(matches!(parse_rss("<rss><channel></item>"), Err(Error::FeedFormat(_))));
    }
}
