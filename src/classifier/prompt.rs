//! Fixed prompt template for capture classification.

const TEMPLATE_HEAD: &str = "\
Analyze the text below and turn it into something worth saving.
Decide whether it is best stored as a single note (\"NOTE\") or as a checklist (\"LIST\").

Rules:
1. If the text enumerates separate items (shopping, tasks, things to pack), use \"LIST\" and put each item in its own string.
2. If the text is continuous prose, use \"NOTE\".
3. Write a short but descriptive title based on the content.
4. Drop greetings and filler addressed to the assistant (\"hi bot\", \"save this\", \"remember\").
5. Answer in the same language as the text.
6. Return ONLY a JSON object with exactly the keys \"title\", \"type\" and \"content\". No prose, no code fences.
   \"content\" is a string for NOTE and an array of strings for LIST.

Text:
<<<
";

const TEMPLATE_TAIL: &str = "
>>>
";

/// Embed `text` verbatim in the classification prompt.
pub fn build_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(TEMPLATE_HEAD.len() + text.len() + TEMPLATE_TAIL.len());
    prompt.push_str(TEMPLATE_HEAD);
    prompt.push_str(text);
    prompt.push_str(TEMPLATE_TAIL);
    prompt
}
