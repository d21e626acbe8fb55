//! Prompt construction for the language model.
//!
//! Retrieved text is always injected as a delimited block so the model can
//! tell reference material apart from the question.

use answerdesk_core::message::Message;

const ASSISTANT_INSTRUCTION: &str = "You are a helpful help-desk assistant. \
Answer the user's question clearly and concisely. If you are not sure, say so.";

const CODE_INSTRUCTION: &str = "You are a helpful programming assistant. \
Provide a clear, well-commented code solution and explain the important steps.";

const MATH_INSTRUCTION: &str = "You are a helpful assistant specializing in calculations \
and mathematics. Give a step-by-step solution with clear explanations.";

const AUGMENT_INSTRUCTION: &str = "You are a helpful help-desk assistant. \
Rephrase the reference answer below so it directly addresses the user's question. \
You may reorganize or expand the wording, but do not add facts that the reference \
answer does not support.";

const HINT_INSTRUCTION: &str = "The following reference text may or may not be relevant. \
Use it only if it actually answers the question; otherwise ignore it.";

/// How retrieved text is offered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole<'a> {
    /// No retrieved context.
    None,
    /// A trusted answer the model must rephrase without adding facts.
    Authoritative(&'a str),
    /// A weak match the model is free to ignore.
    Hint(&'a str),
}

/// The flavour of question, used to pick a system instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    General,
    Code,
    Math,
}

impl QuestionKind {
    pub fn detect(query: &str) -> Self {
        let lower = query.to_lowercase();
        if lower.contains("python") || lower.contains("code") {
            QuestionKind::Code
        } else if lower.contains("calculate") || lower.contains("math") {
            QuestionKind::Math
        } else {
            QuestionKind::General
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            QuestionKind::General => ASSISTANT_INSTRUCTION,
            QuestionKind::Code => CODE_INSTRUCTION,
            QuestionKind::Math => MATH_INSTRUCTION,
        }
    }
}

fn reference_block(text: &str) -> String {
    format!("<reference>\n{}\n</reference>", text.trim())
}

/// Build the message exchange for one generation call.
pub fn build(query: &str, context: ContextRole<'_>) -> Vec<Message> {
    let query = query.trim();
    match context {
        ContextRole::Authoritative(answer) => vec![
            Message::system(format!("{AUGMENT_INSTRUCTION}\n\n{}", reference_block(answer))),
            Message::user(query),
        ],
        ContextRole::Hint(text) => {
            let kind = QuestionKind::detect(query);
            vec![
                Message::system(format!(
                    "{}\n\n{HINT_INSTRUCTION}\n{}",
                    kind.instruction(),
                    reference_block(text)
                )),
                Message::user(query),
            ]
        }
        ContextRole::None => vec![
            Message::system(QuestionKind::detect(query).instruction()),
            Message::user(query),
        ],
    }
}
