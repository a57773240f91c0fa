//! Recursion library: call/return bookkeeping on the register prefix.
//!
//! A sub-graph call leaves `ENTRY RETURN CONTINUATION rest` on the stack.
//! The entry node pushes a pull-stop, an exit node pushes a pull. These
//! topics unwind everything between the two and turn the outcome into a
//! success or failure marker for the caller.

use crate::core::config::CompilerConfig;
use crate::core::instruction::{fall_through, set_register};
use crate::schema::template::{Category, Element, Pattern, PatternToken, Topic};

/// The fixed set of bookkeeping topics; its size does not depend on the graph.
pub fn generate(config: &CompilerConfig) -> Vec<Topic> {
    let m = &config.markers;
    let reg = config.register.as_str();
    let rest = |index: usize| Element::TopicStar { index };

    vec![
        // Exit reached: the sub-graph succeeded.
        rewrite(
            Pattern::words(&[&m.pull, &m.pull_stop]).then(PatternToken::Caret),
            vec![text(&format!("{} ", m.success)), rest(1)],
            reg,
            true,
        ),
        // Drop one untried alternative between the pull and its pull-stop.
        rewrite(
            Pattern::words(&[&m.pull])
                .then(PatternToken::Star)
                .then(PatternToken::Caret),
            vec![text(&format!("{} ", m.pull)), rest(2)],
            reg,
            true,
        ),
        // Top-level network finished without a pull-stop below.
        rewrite(Pattern::words(&[&m.pull]), vec![text(&m.success)], reg, true),
        // Every alternative of the top-level network failed.
        rewrite(Pattern::words(&[&m.pull_stop]), vec![text(&m.fail)], reg, true),
        // Every alternative of a called network failed.
        rewrite(
            Pattern::words(&[&m.pull_stop, &m.ret]).then(PatternToken::Caret),
            vec![text(&format!("{} ", m.fail)), rest(1)],
            reg,
            true,
        ),
        // Return to the caller's continuation.
        rewrite(
            Pattern::words(&[&m.success, &m.ret]).then(PatternToken::Caret),
            vec![rest(1)],
            reg,
            true,
        ),
        // Discard the caller's continuation; its siblings are next.
        rewrite(
            Pattern::words(&[&m.fail])
                .then(PatternToken::Star)
                .then(PatternToken::Caret),
            vec![rest(2)],
            reg,
            true,
        ),
        // Conversation over; the next utterance starts again.
        rewrite(Pattern::words(&[&m.success]), Vec::new(), reg, false),
        rewrite(Pattern::words(&[&m.fail]), Vec::new(), reg, false),
    ]
}

fn text(s: &str) -> Element {
    Element::Text(s.to_string())
}

fn rewrite(topic: Pattern, value: Vec<Element>, register: &str, proceed: bool) -> Topic {
    let mut template = vec![set_register(register, value)];
    if proceed {
        template.push(fall_through());
    }
    Topic {
        name: topic,
        categories: vec![Category::new(Pattern::any(), template)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulate::{Conversation, Machine};
    use crate::schema::template::CompiledSystem;

    /// The library plus topics that stop on anything else.
    fn machine_system() -> CompiledSystem {
        let config = CompilerConfig::default();
        let mut topics = generate(&config);
        topics.push(Topic {
            name: Pattern::register_front("X"),
            categories: vec![Category::new(
                Pattern::any(),
                vec![Element::Text("stopped at X".to_string())],
            )],
        });
        topics.push(Topic {
            name: Pattern::default_scope(),
            categories: vec![Category::new(
                Pattern::any(),
                vec![Element::Text("idle".to_string())],
            )],
        });
        CompiledSystem { topics }
    }

    fn run(register: &str) -> Conversation {
        let system = machine_system();
        let machine = Machine::new(&system);
        let mut conversation = Conversation::with_register("topic", register, 1);
        machine.respond(&mut conversation, "anything").unwrap();
        conversation
    }

    #[test]
    fn fixed_size() {
        let config = CompilerConfig::default();
        assert_eq!(generate(&config).len(), 9);
    }

    #[test]
    fn pull_then_pull_stop_succeeds() {
        let conversation = run("PULL PULLSTOP X");
        assert_eq!(conversation.trace()[0], "SUCCESS X");
    }

    #[test]
    fn lone_pull_stop_fails() {
        let conversation = run("PULLSTOP");
        assert_eq!(conversation.trace()[0], "FAIL");
        // The failure ends the conversation.
        assert_eq!(conversation.register(), "");
    }

    #[test]
    fn pull_discards_untried_alternatives() {
        let conversation = run("PULL alt1 alt2 PULLSTOP RETURN k_RETURNED X");
        assert_eq!(
            conversation.trace(),
            &[
                "PULL alt2 PULLSTOP RETURN k_RETURNED X".to_string(),
                "PULL PULLSTOP RETURN k_RETURNED X".to_string(),
                "SUCCESS RETURN k_RETURNED X".to_string(),
                "k_RETURNED X".to_string(),
            ]
        );
    }

    #[test]
    fn failed_call_drops_continuation() {
        let conversation = run("PULLSTOP RETURN k_RETURNED X");
        assert_eq!(
            conversation.trace(),
            &["FAIL k_RETURNED X".to_string(), "X".to_string()]
        );
        assert_eq!(conversation.register(), "X");
    }
}
