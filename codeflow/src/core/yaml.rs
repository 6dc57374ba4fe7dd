//! Fenced YAML extraction for LLM replies.

const FENCE: &str = "```";

/// Return the YAML payload of an LLM reply.
///
/// Preference order: a ```` ```yaml ```` fence, then ```` ```yml ````, then any bare fence.
/// Replies without a fence are treated as raw YAML. An unterminated fence runs to the end
/// of the reply.
pub(crate) fn extract_yaml_block(reply: &str) -> &str {
    ["```yaml", "```yml", FENCE]
        .into_iter()
        .find_map(|opener| fenced_body(reply, opener))
        .unwrap_or_else(|| reply.trim())
}

fn fenced_body<'a>(reply: &'a str, opener: &str) -> Option<&'a str> {
    let start = reply.find(opener)? + opener.len();
    let after_opener = &reply[start..];
    // The remainder of the opener line is a language tag, never payload.
    let body = &after_opener[after_opener.find('\n')? + 1..];
    let end = body.find(FENCE).unwrap_or(body.len());
    Some(body[..end].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_yaml_fence_over_bare_fence() {
        let reply = "Some prose\n```\nnot: this\n```\n```yaml\ntool: finish\n```";
        assert_eq!(extract_yaml_block(reply), "tool: finish");
    }

    #[test]
    fn accepts_yml_fence() {
        let reply = "```yml\na: 1\n```";
        assert_eq!(extract_yaml_block(reply), "a: 1");
    }

    #[test]
    fn bare_fence_skips_language_tag() {
        let reply = "```text\na: 1\n```";
        assert_eq!(extract_yaml_block(reply), "a: 1");
    }

    #[test]
    fn unfenced_reply_is_used_whole() {
        assert_eq!(extract_yaml_block("  tool: finish\n"), "tool: finish");
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let reply = "```yaml\ntool: list_dir\nparams: {}\n";
        assert_eq!(extract_yaml_block(reply), "tool: list_dir\nparams: {}");
    }

    /// Leading indentation of the first payload line is significant YAML structure.
    #[test]
    fn keeps_leading_indentation() {
        let reply = "```yaml\n  a: 1\n  b: 2\n```";
        assert_eq!(extract_yaml_block(reply), "  a: 1\n  b: 2");
    }
}
