// Prompt building
// Substitutes context and question into a template

#[cfg(test)]
mod tests;

use crate::{RagError, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context_text}";
pub const QUESTION_PLACEHOLDER: &str = "{question_text}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "
Answer the following QUESTION based on the CONTEXT_TEXT provided. If you do not know the answer and the CONTEXT_TEXT say \"I don't know\".

CONTEXT_TEXT:
{context_text}

QUESTION:
{question_text}

ANSWER:
";

/// A template known to contain both placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    #[inline]
    pub fn new(template: &str) -> Result<Self> {
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::Template(format!(
                    "template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Replace every placeholder occurrence in one pass over the template.
    /// Placeholder tokens inside `context` or `question` are left as is.
    #[inline]
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        loop {
            let next = [
                (rest.find(CONTEXT_PLACEHOLDER), CONTEXT_PLACEHOLDER, context),
                (rest.find(QUESTION_PLACEHOLDER), QUESTION_PLACEHOLDER, question),
            ]
            .into_iter()
            .filter_map(|(pos, token, value)| pos.map(|pos| (pos, token, value)))
            .min_by_key(|(pos, _, _)| *pos);

            let Some((pos, token, value)) = next else {
                out.push_str(rest);
                return out;
            };
            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + token.len()..];
        }
    }
}

impl Default for PromptTemplate {
    #[inline]
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Validate `template` and fill it with `context` and `question`.
#[inline]
pub fn build(template: &str, context: &str, question: &str) -> Result<String> {
    Ok(PromptTemplate::new(template)?.render(context, question))
}
