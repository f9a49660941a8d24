//! Prompt templates.
//!
//! Templates are plain strings with `{name}` placeholders. Rendering is a
//! single left-to-right pass, so placeholder text that appears inside a
//! substituted value (a question containing `{context}`, say) is left alone.

/// Default term-extraction template. Placeholder: `{question}`.
pub const DEFAULT_TERMS_TEMPLATE: &str = "Extract the names of classes, functions and \
methods mentioned in the question below. Return them as a single comma-separated \
list with no other text. If there are none, return an empty string.\n\
Question: {question}";

/// Default answer template. Placeholders: `{question}`, `{context}`.
pub const DEFAULT_ANSWER_TEMPLATE: &str = "You are an assistant for question-answering \
tasks. Use the following pieces of retrieved context to answer the question. If you \
don't know the answer, just say that you don't know. Please add to the output python \
code snippets and for create spark session please use ScaleDPSession and read files \
using `spark.read`.\nQuestion: {question} \nContext: {context} \nAnswer:";

/// Substitute `{name}` placeholders from `vars`.
///
/// Unknown placeholders and unmatched braces are copied through unchanged.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Names of placeholders in `required` that `template` does not contain.
pub fn missing_placeholders<'a>(template: &str, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .filter(|name| !template.contains(&format!("{{{name}}}")))
        .copied()
        .collect()
}
