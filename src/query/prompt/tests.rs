use super::*;

#[test]
fn fills_both_placeholders() {
    let prompt = build("CONTEXT:\n{context_text}\nQ:{question_text}", "X", "Y")
        .expect("template is valid");
    assert_eq!(prompt, "CONTEXT:\nX\nQ:Y");
}

#[test]
fn missing_placeholder_is_an_error() {
    assert!(matches!(
        build("Q: {question_text}", "X", "Y"),
        Err(RagError::Template(_))
    ));
    assert!(matches!(
        build("C: {context_text}", "X", "Y"),
        Err(RagError::Template(_))
    ));
    assert!(matches!(build("", "X", "Y"), Err(RagError::Template(_))));
}

#[test]
fn substituted_values_are_not_reexpanded() {
    let template = PromptTemplate::new("{context_text} | {question_text}").expect("valid");
    let prompt = template.render("mentions {question_text}", "what is {context_text}?");
    assert_eq!(prompt, "mentions {question_text} | what is {context_text}?");
}

#[test]
fn repeated_placeholders_are_all_replaced() {
    let template =
        PromptTemplate::new("{question_text}\n{context_text}\n{question_text}").expect("valid");
    assert_eq!(template.render("C", "Q"), "Q\nC\nQ");
}

#[test]
fn default_template_renders() {
    let template = PromptTemplate::default();
    assert_eq!(template.as_str(), DEFAULT_PROMPT_TEMPLATE);

    let prompt = template.render("Canvas is billed per hour.", "How is Canvas billed?");
    assert!(prompt.contains("CONTEXT_TEXT:\nCanvas is billed per hour.\n"));
    assert!(prompt.contains("QUESTION:\nHow is Canvas billed?\n"));
    assert!(prompt.ends_with("ANSWER:\n"));
    assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
}

#[test]
fn empty_values_are_allowed() {
    assert_eq!(
        build("[{context_text}][{question_text}]", "", "").expect("valid"),
        "[][]"
    );
}
