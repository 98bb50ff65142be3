//! Prompt scaffolding shared by all stages.
//!
//! Every prompt is an ordered list of segments: task description, taxonomy
//! listing, worked examples, output instruction, and the live input. The
//! taxonomy listing always comes from [`crate::taxonomy`] so every stage sees
//! the same definition.

use crate::taxonomy;

/// A worked example shown to the oracle before the live input.
#[derive(Debug, Clone, Copy)]
pub struct FewShot {
    pub input_heading: &'static str,
    pub input: &'static [&'static str],
    pub output_heading: &'static str,
    pub output: &'static [&'static str],
}

impl FewShot {
    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(self.input_heading);
        out.push('\n');
        for line in self.input {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(self.output_heading);
        out.push('\n');
        for line in self.output {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Builder for an ordered list of prompt segments.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    segments: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(mut self, text: impl Into<String>) -> Self {
        self.segments.push(text.into());
        self
    }

    /// Add both taxonomy listings.
    pub fn taxonomy(self) -> Self {
        self.entity_listing().relation_listing()
    }

    pub fn entity_listing(self) -> Self {
        self.segment(taxonomy::render_entity_listing())
    }

    pub fn relation_listing(self) -> Self {
        self.segment(taxonomy::render_relation_listing())
    }

    pub fn examples(mut self, examples: &[FewShot]) -> Self {
        self.segments.push("Here are a few examples:\n".to_string());
        self.segments.extend(examples.iter().map(FewShot::render));
        self
    }

    /// The live input, one line per item.
    pub fn input<S: AsRef<str>>(self, lines: &[S]) -> Self {
        let mut text = String::from("Input text:\n");
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        self.segment(text)
    }

    pub fn build(self) -> Vec<String> {
        self.segments
    }
}

/// Make a free-form revision hint safe to place inside a prompt.
///
/// Whitespace runs (including newlines) collapse to single spaces so the hint
/// cannot forge extra prompt lines, and the result is cut to `max_chars`
/// characters. Blank hints count as absent.
pub fn sanitize_context(context: Option<&str>, max_chars: usize) -> Option<String> {
    let collapsed = context?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let char_count = collapsed.chars().count();
    if char_count > max_chars {
        tracing::warn!(
            original_chars = char_count,
            max_chars,
            "Revision context truncated"
        );
        return Some(collapsed.chars().take(max_chars).collect());
    }

    Some(collapsed)
}
