//! Arc processor: one topic (two for sub-graph calls) per arc.
//!
//! A topic is selected while the arc's name is the register's front token.
//! A guard that holds replaces that token with the target node's token; a
//! guard that fails pops it. Either way the utterance is re-dispatched, so
//! whatever is now on top takes over.

use crate::core::config::CompilerConfig;
use crate::core::instruction::{self, fall_through, Instruction};
use crate::core::pipeline::CompileError;
use crate::schema::naming::NamingAuthority;
use crate::schema::network::{Arc, ArcKind, Network};
use crate::schema::template::{Category, ConditionBranch, Element, Pattern, Topic};

/// What an arc needs to know about its surroundings.
pub struct ArcContext<'a> {
    pub config: &'a CompilerConfig,
    pub names: &'a dyn NamingAuthority,
    pub network: &'a Network,
}

impl ArcContext<'_> {
    fn target_token(&self, arc: &Arc) -> String {
        self.names.node_token(&self.network.name, &arc.target)
    }

    fn lower(&self, instruction: Instruction) -> Element {
        instruction.lower(self.config)
    }
}

/// Compile one arc into its topics.
pub fn process(arc: &Arc, ctx: &ArcContext<'_>) -> Result<Vec<Topic>, CompileError> {
    let topic_name = Pattern::register_front(&arc.name);
    let target = ctx.target_token(arc);

    let topics = match &arc.kind {
        ArcKind::Pattern {
            code,
            pattern,
            that,
        } => {
            let pattern = parse(arc, pattern)?;
            let that = that.as_deref().map(|t| parse(arc, t)).transpose()?;

            let mut success = taken(code, ctx.lower(Instruction::replace(&target)));
            success.push(fall_through());

            let catches_everything = that.is_none() && pattern == Pattern::any();
            let mut categories = vec![Category {
                pattern,
                that,
                template: success,
            }];
            if !catches_everything {
                categories.push(Category::new(
                    Pattern::any(),
                    vec![ctx.lower(Instruction::Pop), fall_through()],
                ));
            }
            vec![Topic {
                name: topic_name,
                categories,
            }]
        }
        ArcKind::PredicateTest {
            code,
            predicate,
            expected,
        } => {
            let expected = parse(arc, expected)?;
            let template = vec![
                Element::Condition {
                    name: predicate.clone(),
                    branches: vec![
                        ConditionBranch {
                            value: Some(expected),
                            body: taken(code, ctx.lower(Instruction::replace(&target))),
                        },
                        ConditionBranch {
                            value: None,
                            body: vec![ctx.lower(Instruction::Pop)],
                        },
                    ],
                },
                fall_through(),
            ];
            vec![single(topic_name, template)]
        }
        ArcKind::CodeTest {
            code,
            tested_code,
            expected,
        } => {
            let expected = parse(arc, expected)?;
            let scratch = &ctx.config.markers.testing;
            let clear = Element::Think(vec![Element::Set {
                name: scratch.clone(),
                value: Vec::new(),
            }]);

            let mut on_match = vec![clear.clone()];
            on_match.extend(taken(code, ctx.lower(Instruction::replace(&target))));

            let template = vec![
                // Run the tested code exactly once.
                Element::Think(vec![Element::Set {
                    name: scratch.clone(),
                    value: vec![Element::Code(tested_code.trim().to_string())],
                }]),
                Element::Condition {
                    name: scratch.clone(),
                    branches: vec![
                        ConditionBranch {
                            value: Some(expected),
                            body: on_match,
                        },
                        ConditionBranch {
                            value: None,
                            body: vec![clear, ctx.lower(Instruction::Pop)],
                        },
                    ],
                },
                fall_through(),
            ];
            vec![single(topic_name, template)]
        }
        ArcKind::Recurent {
            code,
            return_code,
            entry,
        } => {
            let continuation = ctx.names.continuation_token(&arc.name);
            let entry_token = ctx.names.node_token(&entry.network, &entry.node);

            let mut dive = taken(
                code,
                ctx.lower(Instruction::Replace(vec![
                    entry_token,
                    ctx.config.markers.ret.clone(),
                    continuation.clone(),
                ])),
            );
            dive.push(fall_through());

            let mut resume = taken(return_code, ctx.lower(Instruction::replace(&target)));
            resume.push(fall_through());

            vec![
                single(topic_name, dive),
                single(Pattern::register_front(&continuation), resume),
            ]
        }
        ArcKind::Transition { code } => {
            let mut template = taken(code, ctx.lower(Instruction::replace(&target)));
            template.push(fall_through());
            vec![single(topic_name, template)]
        }
    };

    Ok(topics)
}

fn parse(arc: &Arc, pattern: &str) -> Result<Pattern, CompileError> {
    Pattern::parse(pattern).map_err(|source| CompileError::Pattern {
        arc: arc.name.clone(),
        source,
    })
}

/// Designer code followed by the register update of a taken arc.
fn taken(code: &str, update: Element) -> Vec<Element> {
    let mut elements: Vec<Element> = instruction::code(code).into_iter().collect();
    elements.push(update);
    elements
}

fn single(name: Pattern, template: Vec<Element>) -> Topic {
    Topic {
        name,
        categories: vec![Category::new(Pattern::any(), template)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instruction::set_register;
    use crate::schema::naming::SystemNames;
    use crate::schema::network::{Dispatch, EntryRef, Interaction, NetworkSystem, Node};

    fn make_system(kind: ArcKind) -> NetworkSystem {
        let mut net = Network::new("main");
        net.nodes
            .push(Node::new("a", Interaction::Input, Dispatch::Ordered));
        net.nodes
            .push(Node::new("b", Interaction::Input, Dispatch::Ordered));
        net.arcs.push(Arc::new("go", 1, "a", "b", kind));
        NetworkSystem {
            networks: vec![net],
            main: None,
        }
    }

    fn compile(kind: ArcKind) -> Vec<Topic> {
        let system = make_system(kind);
        let config = CompilerConfig::default();
        let names = SystemNames::build(&system, &config.continuation_suffix).unwrap();
        let network = &system.networks[0];
        let ctx = ArcContext {
            config: &config,
            names: &names,
            network,
        };
        process(&network.arcs[0], &ctx).unwrap()
    }

    fn replace_with_target() -> Element {
        set_register(
            "topic",
            vec![
                Element::Text("main_b ".to_string()),
                Element::TopicStar { index: 1 },
            ],
        )
    }

    fn pop() -> Element {
        set_register("topic", vec![Element::TopicStar { index: 1 }])
    }

    #[test]
    fn pattern_has_success_and_fallback() {
        let topics = compile(ArcKind::Pattern {
            code: "Hi!".to_string(),
            pattern: "HELLO *".to_string(),
            that: Some("HOW ARE YOU".to_string()),
        });
        assert_eq!(topics.len(), 1);
        let topic = &topics[0];
        assert_eq!(topic.name.to_string(), "go ^");
        assert_eq!(topic.categories.len(), 2);

        let success = &topic.categories[0];
        assert_eq!(success.pattern.to_string(), "HELLO *");
        assert_eq!(success.that.as_ref().unwrap().to_string(), "HOW ARE YOU");
        assert_eq!(
            success.template,
            vec![
                Element::Code("Hi!".to_string()),
                replace_with_target(),
                fall_through()
            ]
        );

        let fallback = &topic.categories[1];
        assert_eq!(fallback.pattern, Pattern::any());
        assert_eq!(fallback.template, vec![pop(), fall_through()]);
    }

    #[test]
    fn catch_all_pattern_has_no_fallback() {
        let topics = compile(ArcKind::Pattern {
            code: String::new(),
            pattern: "*".to_string(),
            that: None,
        });
        assert_eq!(topics[0].categories.len(), 1);
    }

    #[test]
    fn bad_pattern_reports_arc() {
        let system = make_system(ArcKind::Pattern {
            code: String::new(),
            pattern: "   ".to_string(),
            that: None,
        });
        let config = CompilerConfig::default();
        let names = SystemNames::build(&system, "_R").unwrap();
        let ctx = ArcContext {
            config: &config,
            names: &names,
            network: &system.networks[0],
        };
        let err = process(&system.networks[0].arcs[0], &ctx).unwrap_err();
        assert!(matches!(err, CompileError::Pattern { arc, .. } if arc == "go"));
    }

    #[test]
    fn predicate_test_branches_on_predicate() {
        let topics = compile(ArcKind::PredicateTest {
            code: String::new(),
            predicate: "mood".to_string(),
            expected: "HAPPY".to_string(),
        });
        let template = &topics[0].categories[0].template;
        assert_eq!(template.len(), 2);
        match &template[0] {
            Element::Condition { name, branches } => {
                assert_eq!(name, "mood");
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].value, Some(Pattern::words(&["HAPPY"])));
                assert_eq!(branches[0].body, vec![replace_with_target()]);
                assert_eq!(branches[1].value, None);
                assert_eq!(branches[1].body, vec![pop()]);
            }
            other => panic!("expected condition, got {:?}", other),
        }
        assert_eq!(template[1], fall_through());
    }

    #[test]
    fn code_test_caches_and_clears_scratch() {
        let topics = compile(ArcKind::CodeTest {
            code: String::new(),
            tested_code: "<get name=\"count\"/>".to_string(),
            expected: "3".to_string(),
        });
        let template = &topics[0].categories[0].template;
        assert_eq!(
            template[0],
            Element::Think(vec![Element::Set {
                name: "TESTING".to_string(),
                value: vec![Element::Code("<get name=\"count\"/>".to_string())],
            }])
        );

        // The tested code appears exactly once.
        let mut code_count = 0;
        for element in template {
            element.walk(&mut |e| {
                if matches!(e, Element::Code(_)) {
                    code_count += 1;
                }
            });
        }
        assert_eq!(code_count, 1);

        let clear = Element::Think(vec![Element::Set {
            name: "TESTING".to_string(),
            value: Vec::new(),
        }]);
        match &template[1] {
            Element::Condition { name, branches } => {
                assert_eq!(name, "TESTING");
                assert_eq!(branches[0].body[0], clear);
                assert_eq!(branches[1].body, vec![clear.clone(), pop()]);
            }
            other => panic!("expected condition, got {:?}", other),
        }
    }

    #[test]
    fn recurent_dives_and_resumes() {
        let topics = compile(ArcKind::Recurent {
            code: String::new(),
            return_code: "Back.".to_string(),
            entry: EntryRef {
                network: "sub".to_string(),
                node: "start".to_string(),
            },
        });
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name.to_string(), "go ^");
        assert_eq!(
            topics[0].categories[0].template,
            vec![
                set_register(
                    "topic",
                    vec![
                        Element::Text("sub_start RETURN go_RETURNED ".to_string()),
                        Element::TopicStar { index: 1 },
                    ]
                ),
                fall_through()
            ]
        );
        assert_eq!(topics[1].name.to_string(), "go_RETURNED ^");
        assert_eq!(
            topics[1].categories[0].template,
            vec![
                Element::Code("Back.".to_string()),
                replace_with_target(),
                fall_through()
            ]
        );
    }

    #[test]
    fn transition_always_taken() {
        let topics = compile(ArcKind::Transition {
            code: String::new(),
        });
        assert_eq!(
            topics[0].categories[0].template,
            vec![replace_with_target(), fall_through()]
        );
    }
}
