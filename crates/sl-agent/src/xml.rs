//! Small helpers for the XML documents the coordinator returns

/// Text of the first element named `tag`, trimmed.
///
/// `Ok(None)` means the document parsed but has no such element.
pub(crate) fn element_text(xml: &str, tag: &str) -> Result<Option<String>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let text = doc
        .descendants()
        .find(|node| node.is_element() && node.has_tag_name(tag))
        .map(|node| node.text().unwrap_or("").trim().to_string());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_nested_element() {
        let xml = "<slaveInfo><swarmSecret> abc </swarmSecret></slaveInfo>";
        assert_eq!(
            element_text(xml, "swarmSecret").unwrap(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_missing_element_is_none() {
        assert_eq!(element_text("<a><b/></a>", "c").unwrap(), None);
    }

    #[test]
    fn test_empty_element_is_empty_string() {
        assert_eq!(element_text("<a><b/></a>", "b").unwrap(), Some(String::new()));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(element_text("<a><b></a>", "b").is_err());
        assert!(element_text("", "b").is_err());
    }
}
