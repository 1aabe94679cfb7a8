use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tagshelf_domain::Dimensions;

static IMAGE_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Image size\s*:\s*(\d+)\s*x\s*(\d+)\s*$").expect("failed to build regex")
});
static SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<dc:subject\b[^>]*>(.*?)</dc:subject>").expect("failed to build regex")
});
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<rdf:li\b[^>]*?(?:/>|>(.*?)</rdf:li>)").expect("failed to build regex")
});

/// First `Image size : W x H` line of `exiv2 -p s`; unknown when absent.
pub fn parse_image_size(summary: &str) -> Dimensions {
    IMAGE_SIZE
        .captures(summary)
        .and_then(|captures| {
            let width = captures.get(1)?.as_str().parse().ok()?;
            let height = captures.get(2)?.as_str().parse().ok()?;
            Some(Dimensions::new(width, height))
        })
        .unwrap_or(Dimensions::UNKNOWN)
}

/// Trimmed, non-empty `dc:subject` bag items of an `exiv2 -p X` packet.
pub fn parse_xmp_subjects(packet: &str) -> Result<BTreeSet<String>, String> {
    let packet = packet.trim();
    if packet.is_empty() {
        return Ok(BTreeSet::new());
    }
    if !packet.contains("rdf:RDF") {
        return Err("xmp packet has no rdf:RDF element".to_string());
    }

    let mut tags = BTreeSet::new();
    for subject in SUBJECT.captures_iter(packet) {
        let Some(body) = subject.get(1) else {
            continue;
        };
        for item in LIST_ITEM.captures_iter(body.as_str()) {
            let text = item.get(1).map(|text| text.as_str()).unwrap_or_default();
            let tag = unescape_xml(text.trim());
            if !tag.is_empty() {
                tags.insert(tag);
            }
        }
    }
    Ok(tags)
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
