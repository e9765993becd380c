//! Tag-filtered extraction of the planning response.

use regex_lite::Regex;

/// Split a comma-separated tag list, trimming and dropping empties.
pub fn parse_tag_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collect every `<tag>…</tag>` span for each tag, in tag order then in order
/// of appearance. Returns `None` when nothing matched, in which case the
/// caller keeps the whole response.
pub fn extract_tagged(response: &str, tags: &[String]) -> Option<String> {
    let mut fragments: Vec<&str> = Vec::new();

    for tag in tags {
        let escaped = regex_lite::escape(tag);
        let pattern = format!("(?is)<{escaped}>.*?</{escaped}>");
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "Skipping unusable extraction tag");
                continue;
            }
        };
        fragments.extend(re.find_iter(response).map(|m| m.as_str()));
    }

    if fragments.is_empty() {
        None
    } else {
        Some(fragments.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &str) -> Vec<String> {
        parse_tag_list(list)
    }

    #[test]
    fn tag_list_is_trimmed_and_filtered() {
        assert_eq!(tags(" plot , ,scene,"), vec!["plot", "scene"]);
        assert!(tags("").is_empty());
        assert!(tags(" , ").is_empty());
    }

    #[test]
    fn extracts_in_configured_order() {
        let out = extract_tagged("<a>X</a>mid<b>Y</b>", &tags("a,b"));
        assert_eq!(out.as_deref(), Some("<a>X</a>\n\n<b>Y</b>"));
    }

    #[test]
    fn tag_order_beats_appearance_order() {
        let out = extract_tagged("<a>X</a>mid<b>Y</b>", &tags("b,a"));
        assert_eq!(out.as_deref(), Some("<b>Y</b>\n\n<a>X</a>"));
    }

    #[test]
    fn no_configured_tags_keeps_full_response() {
        assert_eq!(extract_tagged("<a>X</a>mid<b>Y</b>", &[]), None);
    }

    #[test]
    fn no_match_keeps_full_response() {
        assert_eq!(extract_tagged("plain text", &tags("plot")), None);
    }

    #[test]
    fn matching_is_case_insensitive_multiline_and_non_greedy() {
        let response = "<Plot>line1\nline2</PLOT> gap <plot>second</plot>";
        let out = extract_tagged(response, &tags("plot"));
        assert_eq!(out.as_deref(), Some("<Plot>line1\nline2</PLOT>\n\n<plot>second</plot>"));
    }

    #[test]
    fn tag_names_are_escaped() {
        let out = extract_tagged("<a.b>hit</a.b><axb>miss</axb>", &tags("a.b"));
        assert_eq!(out.as_deref(), Some("<a.b>hit</a.b>"));
    }
}
