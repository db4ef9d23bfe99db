//! 各节点的固定提示词与拼装

use crate::memory::{Message, Role};
use crate::retriever::Passage;

pub const REWRITE_SYSTEM: &str = "You are a helpful assistant that rephrases the user's question to be a standalone question optimized for retrieval.";

pub const GRADE_SYSTEM: &str =
    "Grade if the document is relevant to the user question. Answer Yes or No.";

pub const REFINE_SYSTEM: &str = "You are a helpful assistant that slightly refines the user's question to improve retrieval results.";

pub const CANNOT_ANSWER_MESSAGE: &str = "Sorry, I couldn't find an answer.";

pub const OFF_TOPIC_MESSAGE: &str = "That question is off-topic for this case study.";

/// 主题范围（与具体药品无关的章节描述）
pub const TOPIC_SECTIONS: &[&str] = &[
    "Overview of the medical document",
    "Indications and clinical use of biologic treatments",
    "Dosage and administration details of biologics",
    "Comparative analysis between biologic therapies",
    "Scientific references and clinical study sources",
];

/// 改写：system + 最近短期记忆 + 原始问题
pub fn rewrite(context: &[Message], question: &str) -> Vec<Message> {
    let mut msgs = Vec::with_capacity(context.len() + 2);
    msgs.push(Message::system(REWRITE_SYSTEM));
    msgs.extend(context.iter().cloned());
    msgs.push(Message::user(question));
    msgs
}

pub fn classifier_system() -> String {
    let sections = TOPIC_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a strict Yes/No classifier.\n\
         Determine if the user's question relates to **any** of the following topics based on a medical summary document:\n\n\
         {sections}\n\n\
         Only respond with 'Yes' or 'No'. Do not explain or elaborate."
    )
}

pub fn classify(rephrased_question: &str) -> Vec<Message> {
    vec![
        Message::system(classifier_system()),
        Message::user(rephrased_question),
    ]
}

pub fn grade(rephrased_question: &str, passage: &Passage) -> Vec<Message> {
    vec![
        Message::system(GRADE_SYSTEM),
        Message::user(format!("Q: {}\nDoc: {}", rephrased_question, passage.text)),
    ]
}

pub fn refine(rephrased_question: &str) -> Vec<Message> {
    vec![
        Message::system(REFINE_SYSTEM),
        Message::user(format!(
            "Original question: {}\n\nRefine it:",
            rephrased_question
        )),
    ]
}

/// 生成：单条 user 消息，内含对话历史、段落上下文与问题
pub fn generate(history: &[Message], documents: &[Passage], question: &str) -> Vec<Message> {
    let history = history
        .iter()
        .map(|m| {
            let who = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("{}: {}", who, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let context = documents
        .iter()
        .map(|d| format!("[{}] {}", d.source, d.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![Message::user(format!(
        "Answer the question based on the following context and the Chathistory. \
         Especially take the latest question into consideration:\n\n\
         Chathistory: {history}\n\n\
         Context: {context}\n\n\
         Question: {question}\n"
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_lists_all_sections() {
        let system = classifier_system();
        for (i, s) in TOPIC_SECTIONS.iter().enumerate() {
            assert!(system.contains(&format!("{}. {}", i + 1, s)));
        }
        assert!(system.ends_with("Do not explain or elaborate."));
    }

    #[test]
    fn test_rewrite_places_context_between_system_and_question() {
        let ctx = vec![Message::user("q1"), Message::assistant("a1")];
        let prompt = rewrite(&ctx, "and for kids?");
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].role, Role::System);
        assert_eq!(prompt[1].content, "q1");
        assert_eq!(prompt[3].content, "and for kids?");
    }

    #[test]
    fn test_generate_includes_history_context_and_question() {
        let prompt = generate(
            &[Message::user("q1"), Message::assistant("a1")],
            &[Passage::new("70 mg monthly", "label/page_2")],
            "Aimovig dose?",
        );
        assert_eq!(prompt.len(), 1);
        let body = &prompt[0].content;
        assert!(body.contains("User: q1\nAssistant: a1"));
        assert!(body.contains("[label/page_2] 70 mg monthly"));
        assert!(body.contains("Question: Aimovig dose?"));
    }

    #[test]
    fn test_grade_prompt_format() {
        let prompt = grade("rq", &Passage::new("text", "s"));
        assert_eq!(prompt[1].content, "Q: rq\nDoc: text");
    }
}
