//! Reference simulator for compiled systems.
//!
//! Executes topics and categories the way a pattern-matching runtime would,
//! close enough to exercise the generated machine in tests and in the
//! preview tool. All per-conversation state (the register included) lives in
//! an explicit `Conversation` value.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use crate::core::config::CompilerConfig;
use crate::schema::template::{Category, CompiledSystem, Element, Pattern, PatternToken};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no category matches input '{input}' with register '{register}'")]
    NoMatch { input: String, register: String },
    #[error("self-invocation nested deeper than {0} levels")]
    RecursionLimit(usize),
}

/// Default bound on nested `<srai>` calls within one turn.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// State owned by one conversation: predicates, the last reply, the RNG.
#[derive(Debug, Clone)]
pub struct Conversation {
    register_name: String,
    predicates: FxHashMap<String, String>,
    that: String,
    rng: StdRng,
    trace: Vec<String>,
}

impl Conversation {
    pub fn new(config: &CompilerConfig, seed: u64) -> Self {
        Self::with_register(&config.register, "", seed)
    }

    /// Start from an explicit register value.
    pub fn with_register(register_name: &str, value: &str, seed: u64) -> Self {
        let mut predicates = FxHashMap::default();
        predicates.insert(register_name.to_string(), value.to_string());
        Self {
            register_name: register_name.to_string(),
            predicates,
            that: String::new(),
            rng: StdRng::seed_from_u64(seed),
            trace: Vec::new(),
        }
    }

    /// Current value of the register.
    pub fn register(&self) -> &str {
        self.predicate(&self.register_name).unwrap_or("")
    }

    pub fn predicate(&self, name: &str) -> Option<&str> {
        self.predicates.get(name).map(String::as_str)
    }

    pub fn set_predicate(&mut self, name: &str, value: &str) {
        let value = collapse(value);
        if name == self.register_name {
            self.trace.push(value.clone());
        }
        self.predicates.insert(name.to_string(), value);
    }

    /// The last reply.
    pub fn that(&self) -> &str {
        &self.that
    }

    /// Every value written to the register, oldest first.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }
}

/// Wildcard captures of a matched category.
#[derive(Debug, Default)]
struct Captures {
    stars: Vec<String>,
    topic_stars: Vec<String>,
}

/// Runs utterances through a compiled system.
pub struct Machine<'a> {
    system: &'a CompiledSystem,
    max_depth: usize,
}

impl<'a> Machine<'a> {
    pub fn new(system: &'a CompiledSystem) -> Self {
        Self {
            system,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Process one user utterance and return the reply.
    pub fn respond(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<String, SimulationError> {
        let input = normalize_input(input);
        let output = self.invoke(conversation, &input, &input, 0)?;
        let reply = collapse(&output);
        conversation.that = reply.clone();
        Ok(reply)
    }

    fn invoke(
        &self,
        conversation: &mut Conversation,
        text: &str,
        user_input: &str,
        depth: usize,
    ) -> Result<String, SimulationError> {
        if depth > self.max_depth {
            return Err(SimulationError::RecursionLimit(self.max_depth));
        }

        let (category, captures) =
            self.select(text, conversation)
                .ok_or_else(|| SimulationError::NoMatch {
                    input: text.to_string(),
                    register: conversation.register().to_string(),
                })?;
        trace!(
            depth,
            input = text,
            register = conversation.register(),
            pattern = %category.pattern,
            "category matched"
        );

        self.eval_all(&category.template, &captures, conversation, user_input, depth)
    }

    /// Pick the category a graphmaster would reach first: input, then that,
    /// then topic, literal words before `^` before `*`, shorter wildcard
    /// captures first.
    fn select(&self, text: &str, conversation: &Conversation) -> Option<(&'a Category, Captures)> {
        let input: Vec<&str> = text.split_whitespace().collect();
        let that: Vec<&str> = conversation.that.split_whitespace().collect();
        let topic: Vec<&str> = conversation.register().split_whitespace().collect();

        let mut best: Option<(Vec<(u8, usize)>, &'a Category, Captures)> = None;
        for topic_def in &self.system.topics {
            let Some((topic_key, topic_stars)) = match_pattern(&topic_def.name, &topic) else {
                continue;
            };
            for category in &topic_def.categories {
                let Some((mut key, stars)) = match_pattern(&category.pattern, &input) else {
                    continue;
                };
                key.push((0, 0));
                match &category.that {
                    Some(pattern) => match match_pattern(pattern, &that) {
                        Some((that_key, _)) => key.extend(that_key),
                        None => continue,
                    },
                    None => key.push((PatternToken::Star.priority(), that.len())),
                }
                key.push((0, 0));
                key.extend(topic_key.iter().copied());

                let better = match &best {
                    Some((best_key, _, _)) => key < *best_key,
                    None => true,
                };
                if better {
                    let captures = Captures {
                        stars,
                        topic_stars: topic_stars.clone(),
                    };
                    best = Some((key, category, captures));
                }
            }
        }
        best.map(|(_, category, captures)| (category, captures))
    }

    fn eval_all(
        &self,
        elements: &[Element],
        captures: &Captures,
        conversation: &mut Conversation,
        user_input: &str,
        depth: usize,
    ) -> Result<String, SimulationError> {
        let mut out = String::new();
        for element in elements {
            out.push_str(&self.eval(element, captures, conversation, user_input, depth)?);
        }
        Ok(out)
    }

    fn eval(
        &self,
        element: &Element,
        captures: &Captures,
        conversation: &mut Conversation,
        user_input: &str,
        depth: usize,
    ) -> Result<String, SimulationError> {
        let value = match element {
            Element::Text(text) | Element::Code(text) => text.clone(),
            Element::Srai(children) => {
                let text = self.eval_all(children, captures, conversation, user_input, depth)?;
                // Sentences from separate categories are joined by a space.
                let reply = self.invoke(conversation, &collapse(&text), user_input, depth + 1)?;
                format!(" {} ", reply)
            }
            Element::Think(children) => {
                self.eval_all(children, captures, conversation, user_input, depth)?;
                String::new()
            }
            Element::Set { name, value } => {
                let value = self.eval_all(value, captures, conversation, user_input, depth)?;
                conversation.set_predicate(name, &value);
                collapse(&value)
            }
            Element::Get { name } => conversation.predicate(name).unwrap_or("").to_string(),
            Element::Star { index } => capture(&captures.stars, *index),
            Element::TopicStar { index } => capture(&captures.topic_stars, *index),
            Element::Input => user_input.to_string(),
            Element::Random(branches) => {
                if branches.is_empty() {
                    String::new()
                } else {
                    let pick = conversation.rng.gen_range(0..branches.len());
                    self.eval_all(&branches[pick], captures, conversation, user_input, depth)?
                }
            }
            Element::Condition { name, branches } => {
                let current = conversation.predicate(name).unwrap_or("").to_string();
                let words: Vec<&str> = current.split_whitespace().collect();
                let chosen = branches.iter().find(|b| match &b.value {
                    Some(pattern) => match_pattern(pattern, &words).is_some(),
                    None => true,
                });
                match chosen {
                    Some(branch) => {
                        self.eval_all(&branch.body, captures, conversation, user_input, depth)?
                    }
                    None => String::new(),
                }
            }
        };
        Ok(value)
    }
}

fn capture(captures: &[String], index: usize) -> String {
    index
        .checked_sub(1)
        .and_then(|i| captures.get(i))
        .cloned()
        .unwrap_or_default()
}

/// Match `pattern` against `words`, returning the priority key and the
/// wildcard captures of the first match in search order.
pub fn match_pattern(pattern: &Pattern, words: &[&str]) -> Option<(Vec<(u8, usize)>, Vec<String>)> {
    let mut key = Vec::new();
    let mut captures = Vec::new();
    if search(&pattern.tokens, words, &mut key, &mut captures) {
        Some((key, captures))
    } else {
        None
    }
}

fn search(
    tokens: &[PatternToken],
    words: &[&str],
    key: &mut Vec<(u8, usize)>,
    captures: &mut Vec<String>,
) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return words.is_empty();
    };

    match token {
        PatternToken::Word(expected) => {
            let Some((first, remaining)) = words.split_first() else {
                return false;
            };
            if first.to_uppercase() != expected.to_uppercase() {
                return false;
            }
            key.push((token.priority(), 1));
            if search(rest, remaining, key, captures) {
                return true;
            }
            key.pop();
            false
        }
        PatternToken::Star | PatternToken::Caret => {
            let min = if *token == PatternToken::Star { 1 } else { 0 };
            for taken in min..=words.len() {
                key.push((token.priority(), taken));
                captures.push(words[..taken].join(" "));
                if search(rest, &words[taken..], key, captures) {
                    return true;
                }
                key.pop();
                captures.pop();
            }
            false
        }
    }
}

/// Trim and collapse runs of whitespace.
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip punctuation from user input, the way runtimes normalize utterances.
pub fn normalize_input(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::template::{Category, ConditionBranch, Topic};

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    fn category(pattern: &str, template: Vec<Element>) -> Category {
        Category::new(Pattern::parse(pattern).unwrap(), template)
    }

    fn text(s: &str) -> Element {
        Element::Text(s.to_string())
    }

    #[test]
    fn star_needs_one_word_caret_none() {
        assert!(match_pattern(&Pattern::parse("A *").unwrap(), &words("A")).is_none());
        assert!(match_pattern(&Pattern::parse("A ^").unwrap(), &words("A")).is_some());
    }

    #[test]
    fn captures_are_minimal_first() {
        let (_, caps) =
            match_pattern(&Pattern::parse("PULL * ^").unwrap(), &words("PULL a b c")).unwrap();
        assert_eq!(caps, vec!["a".to_string(), "b c".to_string()]);
    }

    #[test]
    fn words_match_case_insensitively() {
        assert!(match_pattern(&Pattern::parse("hello *").unwrap(), &words("HELLO there")).is_some());
    }

    #[test]
    fn literal_beats_wildcard() {
        let system = CompiledSystem {
            topics: vec![Topic {
                name: Pattern::default_scope(),
                categories: vec![
                    category("*", vec![text("star")]),
                    category("HELLO", vec![text("literal")]),
                ],
            }],
        };
        let machine = Machine::new(&system);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        assert_eq!(machine.respond(&mut conv, "hello").unwrap(), "literal");
        assert_eq!(machine.respond(&mut conv, "bye").unwrap(), "star");
    }

    #[test]
    fn longer_exact_list_beats_greedy_star() {
        let system = CompiledSystem {
            topics: vec![Topic {
                name: Pattern::default_scope(),
                categories: vec![
                    category("R *", vec![text("one")]),
                    category("R * * *", vec![text("three")]),
                ],
            }],
        };
        let machine = Machine::new(&system);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        assert_eq!(machine.respond(&mut conv, "R a b c").unwrap(), "three");
        assert_eq!(machine.respond(&mut conv, "R a b").unwrap(), "one");
    }

    #[test]
    fn topic_specific_beats_default() {
        let system = CompiledSystem {
            topics: vec![
                Topic {
                    name: Pattern::default_scope(),
                    categories: vec![category("*", vec![text("default")])],
                },
                Topic {
                    name: Pattern::register_front("GO"),
                    categories: vec![category("*", vec![text("go topic")])],
                },
            ],
        };
        let machine = Machine::new(&system);
        let mut conv = Conversation::with_register("topic", "GO STOP", 0);
        assert_eq!(machine.respond(&mut conv, "x").unwrap(), "go topic");
        let mut conv = Conversation::with_register("topic", "STOP GO", 0);
        assert_eq!(machine.respond(&mut conv, "x").unwrap(), "default");
    }

    #[test]
    fn srai_set_get_and_stars() {
        let system = CompiledSystem {
            topics: vec![Topic {
                name: Pattern::default_scope(),
                categories: vec![
                    category(
                        "MY NAME IS *",
                        vec![
                            Element::Think(vec![Element::Set {
                                name: "name".to_string(),
                                value: vec![Element::Star { index: 1 }],
                            }]),
                            Element::Srai(vec![text("GREET")]),
                        ],
                    ),
                    category(
                        "GREET",
                        vec![
                            text("Hello "),
                            Element::Get {
                                name: "name".to_string(),
                            },
                        ],
                    ),
                ],
            }],
        };
        let machine = Machine::new(&system);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        let reply = machine.respond(&mut conv, "My name is Ada Lovelace.").unwrap();
        assert_eq!(reply, "Hello Ada Lovelace");
        assert_eq!(conv.predicate("name"), Some("Ada Lovelace"));
        assert_eq!(conv.that(), "Hello Ada Lovelace");
    }

    #[test]
    fn condition_picks_first_matching_branch() {
        let system = CompiledSystem {
            topics: vec![Topic {
                name: Pattern::default_scope(),
                categories: vec![category(
                    "*",
                    vec![Element::Condition {
                        name: "mood".to_string(),
                        branches: vec![
                            ConditionBranch {
                                value: Some(Pattern::parse("happy").unwrap()),
                                body: vec![text("yay")],
                            },
                            ConditionBranch {
                                value: None,
                                body: vec![text("meh")],
                            },
                        ],
                    }],
                )],
            }],
        };
        let machine = Machine::new(&system);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        assert_eq!(machine.respond(&mut conv, "hi").unwrap(), "meh");
        conv.set_predicate("mood", "HAPPY");
        assert_eq!(machine.respond(&mut conv, "hi").unwrap(), "yay");
    }

    #[test]
    fn runaway_self_invocation_is_bounded() {
        let system = CompiledSystem {
            topics: vec![Topic {
                name: Pattern::default_scope(),
                categories: vec![category("*", vec![Element::Srai(vec![Element::Input])])],
            }],
        };
        let machine = Machine::new(&system).with_max_depth(16);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        assert!(matches!(
            machine.respond(&mut conv, "loop"),
            Err(SimulationError::RecursionLimit(16))
        ));
    }

    #[test]
    fn no_match_is_reported() {
        let system = CompiledSystem::default();
        let machine = Machine::new(&system);
        let mut conv = Conversation::new(&CompilerConfig::default(), 0);
        assert!(matches!(
            machine.respond(&mut conv, "hello"),
            Err(SimulationError::NoMatch { .. })
        ));
    }

    #[test]
    fn register_writes_are_traced() {
        let mut conv = Conversation::with_register("topic", "A", 0);
        conv.set_predicate("topic", "  B   A ");
        conv.set_predicate("other", "x");
        assert_eq!(conv.trace(), &["B A".to_string()]);
        assert_eq!(conv.register(), "B A");
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_input("Hello, world!  How's it?"), "Hello world How's it");
    }
}
