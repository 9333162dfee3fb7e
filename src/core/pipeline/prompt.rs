use crate::core::agent::Agent;

const CONTEXT_SEPARATOR: &str = "\n---\n";

/// The fixed user instruction sent with every generation call.
pub const USER_INSTRUCTION: &str = "Write a single post under 280 characters. Avoid bracketed \
     quotes like [this], and do not start or end with a quotation mark.";

/// Compose the (system, user) instruction pair for one cycle.
///
/// Pure and deterministic: the same agent config and context always
/// produce byte-identical output. Conditional clauses are the
/// name-mention instruction and, when context items exist, a block
/// that quotes them with a paraphrase-only instruction.
pub fn build_instructions(agent: &Agent, context: &[String]) -> (String, String) {
    let mut system = format!(
        "You are an AI social media agent.\n\
         Agent name: {}\n\
         Personality: {}\n\
         Posting Style: {}\n\
         Writing Style: {}\n\n\
         If there are any topics or words to avoid, they are mentioned in the personality.\n\
         Keep the final post under 280 characters.\n",
        agent.name,
        agent.personality,
        agent.posting_style,
        agent.writing_style.as_str(),
    );

    if agent.mention_name {
        system.push_str(&format!(
            "Include the agent name (\"{}\") in the post text when appropriate.\n",
            agent.name
        ));
    } else {
        system.push_str("Do NOT mention the agent name in the post.\n");
    }

    if !context.is_empty() {
        system.push_str(&format!(
            "\nYou have read the following posts about {}:\n{}\n\
             Incorporate relevant insights from these posts, but do NOT copy them verbatim.\n\
             Keep the final post under 280 characters.\n",
            agent.topic,
            context.join(CONTEXT_SEPARATOR),
        ));
    }

    (system, USER_INSTRUCTION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::WritingStyle;

    fn agent() -> Agent {
        let mut a = Agent::new("agent_1".to_string());
        a.name = "Nova".to_string();
        a.personality = "dry wit, loves markets".to_string();
        a.posting_style = "hot takes".to_string();
        a.writing_style = WritingStyle::Lowercase;
        a.topic = "#Bitcoin".to_string();
        a
    }

    #[test]
    fn same_input_is_byte_identical() {
        let a = agent();
        let ctx = vec!["one".to_string(), "two".to_string()];
        assert_eq!(build_instructions(&a, &ctx), build_instructions(&a, &ctx));
    }

    #[test]
    fn embeds_config_and_length_constraint() {
        let (system, user) = build_instructions(&agent(), &[]);
        assert!(system.contains("Agent name: Nova"));
        assert!(system.contains("Personality: dry wit, loves markets"));
        assert!(system.contains("Posting Style: hot takes"));
        assert!(system.contains("Writing Style: lowercase"));
        assert!(system.contains("under 280 characters"));
        assert!(user.contains("under 280 characters"));
        assert!(user.contains("do not start or end with a quotation mark"));
    }

    #[test]
    fn mention_flag_toggles_name_clause() {
        let mut a = agent();
        a.mention_name = true;
        let (with_mention, _) = build_instructions(&a, &[]);
        assert!(with_mention.contains("Include the agent name (\"Nova\")"));
        assert!(!with_mention.contains("Do NOT mention"));

        a.mention_name = false;
        let (without_mention, _) = build_instructions(&a, &[]);
        assert!(without_mention.contains("Do NOT mention the agent name"));
        assert!(!without_mention.contains("Include the agent name"));
    }

    #[test]
    fn context_block_appears_only_with_items() {
        let a = agent();
        let (empty_ctx, _) = build_instructions(&a, &[]);
        assert!(!empty_ctx.contains("You have read"));

        let ctx = vec![
            "btc ripping".to_string(),
            "fees are low".to_string(),
            "halving soon".to_string(),
        ];
        let (with_ctx, _) = build_instructions(&a, &ctx);
        assert!(with_ctx.contains("You have read the following posts about #Bitcoin:"));
        assert!(with_ctx.contains("btc ripping\n---\nfees are low\n---\nhalving soon"));
        assert!(with_ctx.contains("do NOT copy them verbatim"));
    }
}
