//! AIML serialization of compiled systems.
//!
//! Output is fully determined by the input tree and the options: topics and
//! categories keep their order, namespace declarations are sorted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::schema::template::{Category, CompiledSystem, Element, Pattern, Topic};

fn default_version() -> String {
    "2.0".to_string()
}

/// Knobs for the emitted markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Namespace prefix put on every element (`aiml:category`).
    #[serde(default)]
    pub prefix: Option<String>,
    /// `xmlns` declarations on the root element, prefix → URI. The empty
    /// prefix declares the default namespace.
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            namespaces: BTreeMap::new(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AimlRenderer {
    options: RenderOptions,
}

impl AimlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a whole document.
    pub fn render(&self, system: &CompiledSystem) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = write!(
            out,
            "<{} version=\"{}\"",
            self.tag("aiml"),
            escape(&self.options.version)
        );
        for (prefix, uri) in &self.options.namespaces {
            if prefix.is_empty() {
                let _ = write!(out, " xmlns=\"{}\"", escape(uri));
            } else {
                let _ = write!(out, " xmlns:{}=\"{}\"", prefix, escape(uri));
            }
        }
        out.push_str(">\n");

        for topic in &system.topics {
            self.render_topic(&mut out, topic);
        }

        let _ = writeln!(out, "</{}>", self.tag("aiml"));
        out
    }

    fn render_topic(&self, out: &mut String, topic: &Topic) {
        // Categories outside any topic element live in the default scope.
        if topic.name.is_catch_all() {
            for category in &topic.categories {
                self.render_category(out, category, 1);
            }
            return;
        }

        let _ = writeln!(
            out,
            "  <{} name=\"{}\">",
            self.tag("topic"),
            escape(&topic.name.to_string())
        );
        for category in &topic.categories {
            self.render_category(out, category, 2);
        }
        let _ = writeln!(out, "  </{}>", self.tag("topic"));
    }

    fn render_category(&self, out: &mut String, category: &Category, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{}<{}>", indent, self.tag("category"));
        self.render_pattern(out, "pattern", &category.pattern, depth + 1);
        if let Some(that) = &category.that {
            self.render_pattern(out, "that", that, depth + 1);
        }
        let _ = writeln!(
            out,
            "{}  <{}>{}</{}>",
            indent,
            self.tag("template"),
            self.render_elements(&category.template),
            self.tag("template")
        );
        let _ = writeln!(out, "{}</{}>", indent, self.tag("category"));
    }

    fn render_pattern(&self, out: &mut String, name: &str, pattern: &Pattern, depth: usize) {
        let _ = writeln!(
            out,
            "{}<{}>{}</{}>",
            "  ".repeat(depth),
            self.tag(name),
            escape(&pattern.to_string()),
            self.tag(name)
        );
    }

    /// Render a template body on a single line.
    pub fn render_elements(&self, elements: &[Element]) -> String {
        let mut out = String::new();
        for element in elements {
            self.render_element(&mut out, element);
        }
        out
    }

    fn render_element(&self, out: &mut String, element: &Element) {
        match element {
            Element::Text(text) => out.push_str(&escape(text)),
            Element::Code(code) => out.push_str(code),
            Element::Srai(children) => self.wrap(out, "srai", "", children),
            Element::Think(children) => self.wrap(out, "think", "", children),
            Element::Set { name, value } => {
                self.wrap(out, "set", &format!(" name=\"{}\"", escape(name)), value)
            }
            Element::Get { name } => {
                let _ = write!(out, "<{} name=\"{}\"/>", self.tag("get"), escape(name));
            }
            Element::Star { index } => self.indexed(out, "star", *index),
            Element::TopicStar { index } => self.indexed(out, "topicstar", *index),
            Element::Input => {
                let _ = write!(out, "<{}/>", self.tag("input"));
            }
            Element::Random(branches) => {
                let _ = write!(out, "<{}>", self.tag("random"));
                for branch in branches {
                    self.wrap(out, "li", "", branch);
                }
                let _ = write!(out, "</{}>", self.tag("random"));
            }
            Element::Condition { name, branches } => {
                let _ = write!(out, "<{} name=\"{}\">", self.tag("condition"), escape(name));
                for branch in branches {
                    let attrs = match &branch.value {
                        Some(value) => format!(" value=\"{}\"", escape(&value.to_string())),
                        None => String::new(),
                    };
                    self.wrap(out, "li", &attrs, &branch.body);
                }
                let _ = write!(out, "</{}>", self.tag("condition"));
            }
        }
    }

    fn wrap(&self, out: &mut String, name: &str, attrs: &str, children: &[Element]) {
        let tag = self.tag(name);
        let _ = write!(out, "<{}{}>", tag, attrs);
        for child in children {
            self.render_element(out, child);
        }
        let _ = write!(out, "</{}>", tag);
    }

    fn indexed(&self, out: &mut String, name: &str, index: usize) {
        if index <= 1 {
            let _ = write!(out, "<{}/>", self.tag(name));
        } else {
            let _ = write!(out, "<{} index=\"{}\"/>", self.tag(name), index);
        }
    }

    fn tag(&self, name: &str) -> String {
        match &self.options.prefix {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_string(),
        }
    }
}

/// Escape text for element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::template::ConditionBranch;

    fn text(s: &str) -> Element {
        Element::Text(s.to_string())
    }

    #[test]
    fn escapes_text_but_not_code() {
        let renderer = AimlRenderer::default();
        let rendered = renderer.render_elements(&[
            text("a < b & \"c\""),
            Element::Code("<b>bold</b>".to_string()),
        ]);
        assert_eq!(rendered, "a &lt; b &amp; &quot;c&quot;<b>bold</b>");
    }

    #[test]
    fn nested_elements() {
        let renderer = AimlRenderer::default();
        let rendered = renderer.render_elements(&[Element::Think(vec![Element::Set {
            name: "topic".to_string(),
            value: vec![
                text("go "),
                Element::TopicStar { index: 1 },
                Element::Star { index: 2 },
            ],
        }])]);
        assert_eq!(
            rendered,
            "<think><set name=\"topic\">go <topicstar/><star index=\"2\"/></set></think>"
        );
    }

    #[test]
    fn random_and_condition() {
        let renderer = AimlRenderer::default();
        let rendered = renderer.render_elements(&[
            Element::Random(vec![vec![text("a")], vec![text("b")]]),
            Element::Condition {
                name: "mood".to_string(),
                branches: vec![
                    ConditionBranch {
                        value: Some(Pattern::parse("HAPPY").unwrap()),
                        body: vec![text("yes")],
                    },
                    ConditionBranch {
                        value: None,
                        body: vec![Element::Srai(vec![Element::Input])],
                    },
                ],
            },
        ]);
        assert_eq!(
            rendered,
            "<random><li>a</li><li>b</li></random>\
             <condition name=\"mood\"><li value=\"HAPPY\">yes</li>\
             <li><srai><input/></srai></li></condition>"
        );
    }

    #[test]
    fn topics_and_default_scope() {
        let system = CompiledSystem {
            topics: vec![
                Topic {
                    name: Pattern::register_front("go"),
                    categories: vec![Category {
                        pattern: Pattern::parse("HELLO *").unwrap(),
                        that: Some(Pattern::parse("HI").unwrap()),
                        template: vec![text("x")],
                    }],
                },
                Topic {
                    name: Pattern::default_scope(),
                    categories: vec![Category::new(Pattern::any(), Vec::new())],
                },
            ],
        };
        let rendered = AimlRenderer::default().render(&system);
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<aiml version=\"2.0\">\n  <topic name=\"go ^\">\n    <category>\n      <pattern>HELLO *</pattern>\n      <that>HI</that>\n      <template>x</template>\n    </category>\n  </topic>\n  <category>\n    <pattern>*</pattern>\n    <template></template>\n  </category>\n</aiml>\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn prefix_and_namespaces() {
        let mut namespaces = BTreeMap::new();
        namespaces.insert("aiml".to_string(), "http://alicebot.org/2001/AIML".to_string());
        namespaces.insert("".to_string(), "urn:default".to_string());
        let renderer = AimlRenderer::new(RenderOptions {
            prefix: Some("aiml".to_string()),
            namespaces,
            version: "1.0.1".to_string(),
        });
        let rendered = renderer.render(&CompiledSystem::default());
        assert!(rendered.contains(
            "<aiml:aiml version=\"1.0.1\" xmlns=\"urn:default\" xmlns:aiml=\"http://alicebot.org/2001/AIML\">"
        ));
        assert!(rendered.ends_with("</aiml:aiml>\n"));
        assert_eq!(
            renderer.render_elements(&[Element::Input]),
            "<aiml:input/>"
        );
    }
}
