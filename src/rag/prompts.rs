//! Prompt templates for RAG answer generation

use std::collections::HashMap;

/// Template for generating prompts
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template with variables
    #[must_use]
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        let mut result = self.template.clone();
        for var in &self.variables {
            if let Some(value) = values.get(var) {
                result = result.replace(&format!("{{{{{var}}}}}"), value);
            }
        }
        result
    }

    /// Get required variables
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Extract variable names from template
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next(); // skip second '{'
            let mut var_name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch == '}' {
                    chars.next();
                    if chars.peek() == Some(&'}') {
                        chars.next();
                        break;
                    }
                } else {
                    var_name.push(ch);
                    chars.next();
                }
            }
            if !var_name.is_empty() && !variables.contains(&var_name) {
                variables.push(var_name);
            }
        }
    }

    variables
}

/// Standard prompt templates for the civic assistant
pub struct CivicPrompts;

impl CivicPrompts {
    /// Question answering over retrieved civic context.
    ///
    /// The fixed system instructions describe the platform so the assistant
    /// can answer confidently; anything not covered by the retrieved context
    /// must be declared unavailable rather than invented.
    #[must_use]
    pub fn answer_question() -> PromptTemplate {
        PromptTemplate::new(
            r"You are the assistant of a civic-issue reporting platform. Citizens report issues (potholes, flooding, waste, broken streetlights), reports are verified and automatically routed to the best-fit responding organization, and volunteers update progress until resolution.

Use the retrieved context below to answer the user's question.

Rules:
1. Answer directly and confidently; do not mention that context was retrieved
2. If the answer is not covered by the context, say the information is not available
3. When referencing a specific organization or report, mention its name or id
4. Be concise

Context:
{{context}}

User question:
{{question}}

Answer:",
        )
    }
}
