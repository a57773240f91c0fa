//! Randomize library: weighted sampling without replacement, as categories.
//!
//! `RANDOMIZE a a b` picks one of its words uniformly, shuffles the remaining
//! words by calling itself, and finally pushes the picked word, so the first
//! draw ends up on top of the stack. Only the drawn occurrence is removed; an
//! arc listed several times stays in the pool for later draws.
//!
//! The categories live in the `RANDOMIZE ^` topic. The caller pushes the
//! marker before the first call and the innermost call pops it, so the
//! library is only reachable while a draw is in progress.

use crate::core::config::{CompilerConfig, Limits};
use crate::core::instruction::set_register;
use crate::core::pipeline::CompileError;
use crate::schema::naming::NamingAuthority;
use crate::schema::template::{Category, Element, Pattern, PatternToken, Topic, WILDCARD_TOKENS};

/// The library topic: one category per candidate-list length, 0 through P × B.
pub fn generate(
    config: &CompilerConfig,
    limits: Limits,
    names: &dyn NamingAuthority,
) -> Result<Topic, CompileError> {
    let marker = &config.markers.randomize;
    if names.is_taken(marker) {
        return Err(CompileError::MarkerCollision {
            marker: "randomize",
            name: marker.clone(),
        });
    }
    // Wildcard words would break the structural matching below.
    for token in WILDCARD_TOKENS {
        if names.is_taken(token) || marker == token {
            return Err(CompileError::MarkerCollision {
                marker: "wildcard",
                name: token.to_string(),
            });
        }
    }

    Ok(Topic {
        name: Pattern::register_front(marker),
        categories: (0..=limits.capacity())
            .map(|len| category(marker, &config.register, len))
            .collect(),
    })
}

/// The category handling lists of exactly `len` words.
///
/// Lengths 0 and 1 end the recursion and drop the marker from the register.
pub fn category(marker: &str, register: &str, len: usize) -> Category {
    let mut pattern = Pattern::words(&[marker]);
    for _ in 0..len {
        pattern = pattern.then(PatternToken::Star);
    }

    let below_marker = Element::TopicStar { index: 1 };
    let template = match len {
        0 => vec![set_register(register, vec![below_marker])],
        1 => vec![set_register(
            register,
            vec![
                Element::Star { index: 1 },
                Element::Text(" ".to_string()),
                below_marker,
            ],
        )],
        _ => {
            let branches = (1..=len)
                .map(|picked| {
                    let mut call = vec![Element::Text(marker.to_string())];
                    for rest in (1..=len).filter(|&i| i != picked) {
                        call.push(Element::Text(" ".to_string()));
                        call.push(Element::Star { index: rest });
                    }
                    vec![
                        Element::Think(vec![Element::Srai(call)]),
                        push_star(register, picked),
                    ]
                })
                .collect();
            vec![Element::Random(branches)]
        }
    };

    Category::new(pattern, template)
}

fn push_star(register: &str, index: usize) -> Element {
    set_register(
        register,
        vec![
            Element::Star { index },
            Element::Text(" ".to_string()),
            Element::Get {
                name: register.to_string(),
            },
        ],
    )
}
