use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Extensions the crawler knows how to turn into text.
#[cfg(not(feature = "pdf"))]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "xml", "xhtml"];
#[cfg(feature = "pdf")]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "xml", "xhtml", "pdf"];

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
}

pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Read `path` and return its character content, dispatching on extension.
pub fn extract_text(path: &Path) -> Result<String> {
    match extension(path).as_deref() {
        Some("txt" | "md") => read_plain(path),
        Some("xml" | "xhtml") => read_xml(path),
        #[cfg(feature = "pdf")]
        Some("pdf") => read_pdf(path),
        Some(other) => bail!("unsupported file extension .{other} for {}", path.display()),
        None => bail!("no file extension on {}", path.display()),
    }
}

fn read_plain(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("could not read file {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_xml(path: &Path) -> Result<String> {
    let content = read_plain(path)?;
    xml_character_data(&content).with_context(|| format!("error parsing XML file {}", path.display()))
}

/// Concatenate every text and CDATA node, each followed by a space.
pub fn xml_character_data(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(text) => match text.unescape() {
                Ok(s) => out.push_str(&s),
                // entities like &nbsp; are undeclared in plain XML
                Err(_) => out.push_str(&String::from_utf8_lossy(&text)),
            },
            Event::CData(data) => out.push_str(&String::from_utf8_lossy(&data)),
            Event::Eof => break,
            _ => continue,
        }
        out.push(' ');
    }
    Ok(out)
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<String> {
    use anyhow::anyhow;

    let mut doc = pdf_oxide::PdfDocument::open(path)
        .map_err(|e| anyhow!("could not open PDF file {}: {e}", path.display()))?;
    let pages = doc.page_count().map_err(|e| anyhow!("could not count pages in {}: {e}", path.display()))?;
    let mut out = String::new();
    for page in 0..pages {
        let text = doc
            .extract_text(page)
            .map_err(|e| anyhow!("could not extract text from page {} in {}: {e}", page + 1, path.display()))?;
        out.push_str(&text);
        out.push(' ');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_keeps_only_character_data() {
        let text = xml_character_data("<doc><title>Hello</title><p>big <b>world</b></p><![CDATA[raw <x>]]></doc>").unwrap();
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, vec!["Hello", "big", "world", "raw", "<x>"]);
    }

    #[test]
    fn xml_unescapes_entities() {
        let text = xml_character_data("<p>fish &amp; chips</p>").unwrap();
        assert_eq!(text.trim(), "fish & chips");
    }

    #[test]
    fn mismatched_tags_fail() {
        assert!(xml_character_data("<a><b>text</a>").is_err());
    }

    #[test]
    fn supported_extensions_ignore_case() {
        assert!(is_supported(Path::new("notes/README.MD")));
        assert!(is_supported(Path::new("page.xhtml")));
        assert!(!is_supported(Path::new("image.png")));
        assert!(!is_supported(Path::new("Makefile")));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = extract_text(Path::new("archive.zip")).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
