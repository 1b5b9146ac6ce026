use std::collections::HashSet;

/// Strips all HTML tags from input, keeping the text content.
/// Used for reasons, notes and report details, which are stored as plain text.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Strips markup and surrounding whitespace; `None` when nothing is left.
pub fn clean_optional_text(input: Option<&str>) -> Option<String> {
    input
        .map(|text| strip_all_html(text.trim()).trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(strip_all_html("<b>spam</b> link"), "spam link");
        assert_eq!(strip_all_html("<script>alert(1)</script>ok"), "ok");
    }

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(clean_optional_text(Some("   ")), None);
        assert_eq!(clean_optional_text(Some("<i></i>")), None);
        assert_eq!(clean_optional_text(Some(" fine ")), Some("fine".to_string()));
        assert_eq!(clean_optional_text(None), None);
    }
}
