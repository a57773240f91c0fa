//! Register instructions shared by the node and arc processors, and their
//! lowering to template elements.
//!
//! Every category that touches the register lives in a topic named
//! `TOKEN ^`, so `<topicstar/>` is always the stack below the front token.

use crate::core::config::CompilerConfig;
use crate::schema::template::Element;

/// A mutation of the virtual stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Drop the front token (the one that selected the current topic).
    Pop,
    /// Prepend tokens; the first one ends up on top.
    Push(Vec<String>),
    /// Drop the front token, then prepend tokens.
    Replace(Vec<String>),
    /// Let the randomize library shuffle tokens onto the stack. The library
    /// runs under its own register token.
    Randomize(Vec<String>),
}

impl Instruction {
    pub fn push(token: &str) -> Self {
        Self::Push(vec![token.to_string()])
    }

    pub fn replace(token: &str) -> Self {
        Self::Replace(vec![token.to_string()])
    }

    /// Tokens this instruction adds to the stack, if any.
    pub fn tokens(&self) -> &[String] {
        match self {
            Self::Pop => &[],
            Self::Push(tokens) | Self::Replace(tokens) | Self::Randomize(tokens) => tokens,
        }
    }

    /// Lower to a single template element.
    pub fn lower(&self, config: &CompilerConfig) -> Element {
        let register = &config.register;
        match self {
            Self::Pop => set_register(register, vec![Element::TopicStar { index: 1 }]),
            Self::Push(tokens) => set_register(
                register,
                vec![
                    Element::Text(format!("{} ", tokens.join(" "))),
                    Element::Get {
                        name: register.clone(),
                    },
                ],
            ),
            Self::Replace(tokens) => set_register(
                register,
                vec![
                    Element::Text(format!("{} ", tokens.join(" "))),
                    Element::TopicStar { index: 1 },
                ],
            ),
            Self::Randomize(tokens) => {
                let marker = &config.markers.randomize;
                let mut call = marker.clone();
                for token in tokens {
                    call.push(' ');
                    call.push_str(token);
                }
                // The marker selects the library topic; the library pops it.
                Element::Think(vec![
                    Element::Set {
                        name: register.clone(),
                        value: vec![
                            Element::Text(format!("{} ", marker)),
                            Element::Get {
                                name: register.clone(),
                            },
                        ],
                    },
                    Element::Srai(vec![Element::Text(call)]),
                ])
            }
        }
    }
}

/// Lower a sequence of instructions, in order.
pub fn lower_all(instructions: &[Instruction], config: &CompilerConfig) -> Vec<Element> {
    instructions.iter().map(|i| i.lower(config)).collect()
}

/// `<think><set name="register">value</set></think>`
pub fn set_register(register: &str, value: Vec<Element>) -> Element {
    Element::Think(vec![Element::Set {
        name: register.to_string(),
        value,
    }])
}

/// Re-run the current utterance against whatever topic is now on top.
pub fn fall_through() -> Element {
    Element::Srai(vec![Element::Input])
}

/// Designer code, or nothing when the code is blank.
pub fn code(text: &str) -> Option<Element> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(Element::Code(trimmed.to_string()))
    }
}
