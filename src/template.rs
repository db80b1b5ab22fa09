//! Request templates for single and batched evaluations.

use crate::checklist::{item_names, CHECKLIST, FEEDBACK_KEY};

/// Role-setting instruction sent as the system message.
pub const SYSTEM_PROMPT: &str = "너는 교사처럼 프롬프트를 평가하는 역할을 맡았어.";

/// Field carrying the ordinal marker in batched answers.
pub const ORDINAL_KEY: &str = "id";

/// Renders the user message for a single prompt.
pub fn render_single(prompt: &str) -> String {
    format!(
        "다음은 학생이 작성한 AI 프롬프트입니다:\n\
         <<<\n{prompt}\n>>>\n\n\
         이 프롬프트를 아래의 {count}가지 항목에 따라 0(아니다)/1(그렇다)로 평가해주세요.\n\n\
         {criteria}\n\n\
         답변은 다른 설명 없이 다음 형식의 JSON 객체 하나로만 출력해주세요:\n\
         {shape}",
        count = CHECKLIST.len(),
        criteria = render_criteria(),
        shape = render_object_shape(None),
    )
}

/// Renders one user message covering several prompts, each behind an ordinal marker.
pub fn render_batch<S: AsRef<str>>(prompts: &[S]) -> String {
    let mut listing = String::new();
    for (idx, prompt) in prompts.iter().enumerate() {
        listing.push_str(&format!("[{}]\n{}\n\n", idx + 1, prompt.as_ref()));
    }
    format!(
        "다음은 학생들이 작성한 AI 프롬프트 {total}개입니다. 각 프롬프트 앞에는 [번호]가 붙어 있습니다.\n\n\
         {listing}\
         각 프롬프트를 아래의 {count}가지 항목에 따라 0(아니다)/1(그렇다)로 평가해주세요.\n\n\
         {criteria}\n\n\
         답변은 다른 설명 없이 프롬프트 순서대로 {total}개의 객체를 담은 JSON 배열 하나로만 출력해주세요. \
         각 객체의 \"{ORDINAL_KEY}\"에는 해당 프롬프트의 번호를 넣어주세요:\n\
         [{shape}, ...]",
        total = prompts.len(),
        count = CHECKLIST.len(),
        criteria = render_criteria(),
        shape = render_object_shape(Some(1)),
    )
}

fn render_criteria() -> String {
    let mut lines = vec![item_names(", ")];
    for item in CHECKLIST.iter() {
        lines.push(format!("- {}: {}", item.name, item.description));
    }
    lines.join("\n")
}

fn render_object_shape(ordinal: Option<usize>) -> String {
    let mut fields = Vec::with_capacity(CHECKLIST.len() + 2);
    if let Some(ordinal) = ordinal {
        fields.push(format!("  \"{ORDINAL_KEY}\": {ordinal}"));
    }
    for item in CHECKLIST.iter() {
        fields.push(format!("  \"{}\": 0 또는 1", item.name));
    }
    fields.push(format!(
        "  \"{FEEDBACK_KEY}\": \"학생에게 줄 1~2문장 피드백\""
    ));
    format!("{{\n{}\n}}", fields.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_template_mentions_every_item() {
        let rendered = render_single("요약해줘");
        assert!(rendered.contains("요약해줘"));
        for item in CHECKLIST.iter() {
            assert!(rendered.contains(item.name), "missing {}", item.name);
        }
        assert!(rendered.contains(FEEDBACK_KEY));
    }

    #[test]
    fn empty_prompt_still_renders_full_template() {
        let rendered = render_single("");
        assert!(rendered.contains("<<<\n\n>>>"));
        assert!(rendered.contains(FEEDBACK_KEY));
    }

    #[test]
    fn batch_template_numbers_prompts_in_order() {
        let rendered = render_batch(&["first", "second", "third"]);
        let a = rendered.find("[1]\nfirst").unwrap();
        let b = rendered.find("[2]\nsecond").unwrap();
        let c = rendered.find("[3]\nthird").unwrap();
        assert!(a < b && b < c);
        assert!(rendered.contains("3개"));
        assert!(rendered.contains("\"id\""));
    }
}
