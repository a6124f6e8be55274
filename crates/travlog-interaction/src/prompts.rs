//! Prompt templates for the grading and generation capabilities.
//!
//! One named minijinja template per capability. The templates encode the
//! semantic contract of each call: graders must answer with a JSON object
//! carrying a single `score` of `yes` or `no`; generators and the rewriter
//! answer with plain text.

use minijinja::Environment;
use once_cell::sync::Lazy;
use travlog_core::{Result, TravlogError};

const CHAT_VS_DOCS: &str = "\
You are a grader deciding whether a question can be answered from the chat \
history alone or needs document-based information.

Question: {{ question }}
Chat History:
{{ history }}

Answer 'yes' when the chat history alone suffices: greetings and small talk, \
questions about the previous conversation, meta-questions about the \
assistant, or clarifications of earlier answers. Answer 'no' when new \
factual information is required: brand new topics, first-time product \
queries, or follow-ups that need facts not previously discussed.

Respond with a JSON object with a single key 'score' and the value 'yes' or \
'no', without any explanation.";

const CHAT_TYPE: &str = "\
You are a grader deciding whether a chat-anchored question additionally \
needs document context.

Question: {{ question }}
Chat History:
{{ history }}

Answer 'no' when the chat history alone is enough: greetings, recalling \
earlier conversation, clarifying a previous answer. Answer 'yes' when the \
question builds on the conversation but needs new facts, such as a \
comparative follow-up about a product that was not yet discussed.

Respond with a JSON object with a single key 'score' and the value 'yes' or \
'no', without any explanation.";

const GRADE_DOCUMENT: &str = "\
You are an evaluator assessing whether a retrieved document is relevant to \
a question.

Question: {{ question }}
Retrieved document: {{ document }}

Consider direct topical relevance, whether product details are specific to \
the product being asked about, and whether a comparative follow-up can be \
answered from the document.

Respond with a JSON object with a single key 'score' and the value 'yes' or \
'no', without any explanation.";

const GENERATE: &str = "\
You are TravelLogger, a helpful assistant for question-answering about \
travel card products. Please answer in Korean. Use the retrieved context to \
answer the question; if you don't know the answer, say that you don't know. \
Use five sentences maximum and keep the answer concise. When reading \
tables, never confuse columns and rows.

Question: {{ question }}
Context: {{ context }}
Answer:";

const CHAT_GENERATE: &str = "\
You are TravelLogger (트래블로거), a friendly AI assistant for travel card \
conversations. Always respond in Korean. For greetings, introduce yourself \
as 트래블로거 and offer to help. When asked about the previous \
conversation, answer directly and accurately from the history. Keep \
responses to five sentences at most.

Chat History:
{{ history }}
Question: {{ question }}
Answer:";

const GRADE_HALLUCINATION: &str = "\
You are a grader assessing whether a generated answer is grounded in the \
provided documents or the conversation history.

Documents:
{{ documents }}
Chat History:
{{ history }}
Generated answer: {{ generation }}

Answer 'yes' when every claim in the answer is supported by the documents \
or the history, 'no' otherwise.

Respond with a JSON object with a single key 'score' and the value 'yes' or \
'no', without any explanation.";

const GRADE_ANSWER: &str = "\
You are a grader assessing whether an answer addresses the question asked.

Question: {{ question }}
Answer: {{ generation }}

Respond with a JSON object with a single key 'score' and the value 'yes' or \
'no', without any explanation.";

const REWRITE: &str = "\
You are a question rewriter producing a self-contained search query from a \
possibly context-dependent follow-up question.

Question: {{ question }}
Card type: {{ card_type }}
Product name: {{ product_name }}
Chat History:
{{ history }}

Rewrite the question so it can be understood without the conversation. Keep \
the original language. When the card type or product name is not '정보없음', \
include it in the rewritten question. Respond with the rewritten question \
only, without any explanation.";

static ENVIRONMENT: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    for (name, template) in [
        ("chat_vs_docs", CHAT_VS_DOCS),
        ("chat_type", CHAT_TYPE),
        ("grade_document", GRADE_DOCUMENT),
        ("generate", GENERATE),
        ("chat_generate", CHAT_GENERATE),
        ("grade_hallucination", GRADE_HALLUCINATION),
        ("grade_answer", GRADE_ANSWER),
        ("rewrite", REWRITE),
    ] {
        env.add_template(name, template)
            .expect("prompt templates are static and must parse");
    }
    env
});

/// Renders the named capability template with the given variables.
pub fn render(name: &'static str, ctx: minijinja::Value) -> Result<String> {
    let template = ENVIRONMENT
        .get_template(name)
        .map_err(|err| TravlogError::internal(format!("unknown prompt template: {err}")))?;
    template
        .render(ctx)
        .map_err(|err| TravlogError::internal(format!("prompt render failed for {name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_templates_render() {
        let cases: &[(&'static str, minijinja::Value)] = &[
            (
                "chat_vs_docs",
                context! { question => "안녕", history => "" },
            ),
            ("chat_type", context! { question => "그럼?", history => "h" }),
            (
                "grade_document",
                context! { question => "연회비?", document => "약관" },
            ),
            (
                "generate",
                context! { question => "연회비?", context => "약관" },
            ),
            (
                "chat_generate",
                context! { question => "안녕", history => "h" },
            ),
            (
                "grade_hallucination",
                context! { documents => "d", history => "h", generation => "g" },
            ),
            (
                "grade_answer",
                context! { question => "q", generation => "g" },
            ),
            (
                "rewrite",
                context! {
                    question => "그럼 skypass는?",
                    card_type => "정보없음",
                    product_name => "트래블로그",
                    history => "h",
                },
            ),
        ];

        for (name, ctx) in cases {
            let rendered = render(name, ctx.clone()).unwrap();
            assert!(!rendered.is_empty(), "{name} rendered empty");
        }
    }

    #[test]
    fn test_rewrite_carries_hints_verbatim() {
        let rendered = render(
            "rewrite",
            context! {
                question => "연회비?",
                card_type => "Prestige",
                product_name => "정보없음",
                history => "",
            },
        )
        .unwrap();

        assert!(rendered.contains("Card type: Prestige"));
        assert!(rendered.contains("Product name: 정보없음"));
    }
}
