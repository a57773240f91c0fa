//! Abstract target-language trees: patterns, template elements, categories and topics.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("wildcard character inside word '{0}'")]
    EmbeddedWildcard(String),
}

/// Characters the target language treats as wildcards.
pub const WILDCARD_TOKENS: &[&str] = &["*", "_", "^", "#", "$"];

/// A single element of a match pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternToken {
    /// A literal word, compared case-insensitively.
    Word(String),
    /// One or more words (`*`, `_`).
    Star,
    /// Zero or more words (`^`, `#`).
    Caret,
}

impl PatternToken {
    /// Matching priority; lower values are tried first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Word(_) => 1,
            Self::Caret => 2,
            Self::Star => 3,
        }
    }
}

/// A parsed match pattern: a sequence of words and wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub tokens: Vec<PatternToken>,
}

impl Pattern {
    /// Parse a pattern string.
    ///
    /// Syntax:
    /// - `*` / `_` → `Star` (one or more words)
    /// - `^` / `#` → `Caret` (zero or more words)
    /// - anything else → `Word`
    ///
    /// A wildcard character glued to a word (`HEL*O`) is rejected.
    pub fn parse(input: &str) -> Result<Pattern, PatternError> {
        let mut tokens = Vec::new();
        for word in input.split_whitespace() {
            let token = match word {
                "*" | "_" => PatternToken::Star,
                "^" | "#" => PatternToken::Caret,
                // Underscores are legal inside names, only bare `_` is a wildcard.
                _ if word.contains(['*', '^', '#']) => {
                    return Err(PatternError::EmbeddedWildcard(word.to_string()));
                }
                _ => PatternToken::Word(word.to_string()),
            };
            tokens.push(token);
        }

        if tokens.is_empty() {
            return Err(PatternError::Empty);
        }

        Ok(Pattern { tokens })
    }

    /// Pattern matching any non-empty input: `*`.
    pub fn any() -> Pattern {
        Pattern {
            tokens: vec![PatternToken::Star],
        }
    }

    /// Scope of categories declared outside any topic: `^`.
    pub fn default_scope() -> Pattern {
        Pattern {
            tokens: vec![PatternToken::Caret],
        }
    }

    /// A literal word sequence.
    pub fn words<S: AsRef<str>>(words: &[S]) -> Pattern {
        Pattern {
            tokens: words
                .iter()
                .map(|w| PatternToken::Word(w.as_ref().to_string()))
                .collect(),
        }
    }

    /// Topic name selecting a register whose front token is `token`: `TOKEN ^`.
    pub fn register_front(token: &str) -> Pattern {
        Pattern {
            tokens: vec![PatternToken::Word(token.to_string()), PatternToken::Caret],
        }
    }

    /// Append a token, builder style.
    pub fn then(mut self, token: PatternToken) -> Pattern {
        self.tokens.push(token);
        self
    }

    /// True for the single-wildcard scope used by topic-less categories.
    pub fn is_catch_all(&self) -> bool {
        matches!(
            self.tokens.as_slice(),
            [PatternToken::Caret] | [PatternToken::Star]
        )
    }

    /// Number of literal words in this pattern.
    pub fn word_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, PatternToken::Word(_)))
            .count()
    }

    /// Number of wildcards in this pattern.
    pub fn wildcard_count(&self) -> usize {
        self.tokens.len() - self.word_count()
    }

    /// Literal words of this pattern in order.
    pub fn literal_words(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            PatternToken::Word(w) => Some(w.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                PatternToken::Word(w) => f.write_str(w)?,
                PatternToken::Star => f.write_str("*")?,
                PatternToken::Caret => f.write_str("^")?,
            }
        }
        Ok(())
    }
}

/// One `<li>` of a `<condition>`. `value: None` is the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBranch {
    pub value: Option<Pattern>,
    pub body: Vec<Element>,
}

/// A node of a template tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    /// Literal text, escaped on output.
    Text(String),
    /// Designer-authored markup, emitted verbatim.
    Code(String),
    /// Recursive self-invocation with the evaluated children as input.
    Srai(Vec<Element>),
    /// Evaluate children, discard their output.
    Think(Vec<Element>),
    /// Assign a predicate.
    Set { name: String, value: Vec<Element> },
    /// Read a predicate.
    Get { name: String },
    /// Input wildcard capture, 1-based.
    Star { index: usize },
    /// Topic wildcard capture, 1-based.
    TopicStar { index: usize },
    /// The current user utterance.
    Input,
    /// Uniform choice between the listed branches.
    Random(Vec<Vec<Element>>),
    /// Branch on a predicate value; the first matching branch runs.
    Condition {
        name: String,
        branches: Vec<ConditionBranch>,
    },
}

impl Element {
    /// Visit this element and all of its descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        visit(self);
        match self {
            Self::Srai(children) | Self::Think(children) | Self::Set { value: children, .. } => {
                for child in children {
                    child.walk(visit);
                }
            }
            Self::Random(items) => {
                for child in items.iter().flatten() {
                    child.walk(visit);
                }
            }
            Self::Condition { branches, .. } => {
                for child in branches.iter().flat_map(|b| b.body.iter()) {
                    child.walk(visit);
                }
            }
            Self::Text(_)
            | Self::Code(_)
            | Self::Get { .. }
            | Self::Star { .. }
            | Self::TopicStar { .. }
            | Self::Input => {}
        }
    }
}

/// A pattern/response rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub pattern: Pattern,
    pub that: Option<Pattern>,
    pub template: Vec<Element>,
}

impl Category {
    pub fn new(pattern: Pattern, template: Vec<Element>) -> Self {
        Self {
            pattern,
            that: None,
            template,
        }
    }

    /// True if any element of the template satisfies `pred`.
    pub fn template_contains(&self, pred: impl Fn(&Element) -> bool) -> bool {
        let mut found = false;
        for element in &self.template {
            element.walk(&mut |e| {
                if pred(e) {
                    found = true;
                }
            });
        }
        found
    }
}

/// A group of categories selected by the register's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: Pattern,
    pub categories: Vec<Category>,
}

/// Output of the compiler: topics in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompiledSystem {
    pub topics: Vec<Topic>,
}

impl CompiledSystem {
    /// Find the topic whose name is exactly `name` (as rendered).
    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name.to_string() == name)
    }

    /// Find the topic keyed by a register front token (`TOKEN ^`).
    pub fn topic_for_token(&self, token: &str) -> Option<&Topic> {
        let name = Pattern::register_front(token);
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn category_count(&self) -> usize {
        self.topics.iter().map(|t| t.categories.len()).sum()
    }

    /// All categories paired with their topic name.
    pub fn categories(&self) -> impl Iterator<Item = (&Pattern, &Category)> {
        self.topics
            .iter()
            .flat_map(|t| t.categories.iter().map(move |c| (&t.name, c)))
    }
}
