use anyhow::{Context, Result};

use crate::Record;

/// Flatten every `<element>` directly under the document root into a record
/// of `child tag -> child text`. Children without text are skipped; document
/// order is kept.
pub fn parse_records(body: &str, element: &str) -> Result<Vec<Record>> {
    let doc = roxmltree::Document::parse(body).context("malformed xml")?;

    let records = doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.has_tag_name(element))
        .map(|node| {
            node.children()
                .filter(|c| c.is_element())
                .filter_map(|c| {
                    let text = c.text()?;
                    if text.is_empty() {
                        return None;
                    }
                    Some((c.tag_name().name().to_string(), text.to_string()))
                })
                .collect::<Record>()
        })
        .collect();

    Ok(records)
}
