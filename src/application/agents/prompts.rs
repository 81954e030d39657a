//! Prompt 模板
//!
//! 每个 Agent 的系统指令与用户提示词。结构化 Agent 的提示词会说明
//! 期望的 JSON 结构，但解析端不依赖模型一定遵守

use std::fmt::Write;

use super::{BookBrief, ChapterAssignment, ResearchAnswer};
use crate::domain::outline::{BookOutline, ChapterOutline};

pub const RESEARCH_SYSTEM: &str = "You are a meticulous research assistant for book authors. \
You identify the questions an author must answer before outlining a book, and you turn \
answers into a concise research brief.";

pub const OUTLINER_SYSTEM: &str = "You are an experienced book architect. You design chapter \
structures with a clear progression, and you always answer with a single JSON object and \
nothing else.";

pub const WRITER_SYSTEM: &str = "You are a professional author. You write complete, polished \
chapter prose that follows the given outline and keeps continuity with earlier chapters.";

pub const EDITOR_SYSTEM: &str = "You are a senior line editor. You improve clarity, flow and \
style while preserving the author's voice and every factual claim. You return only the \
revised text.";

pub const CRITIC_SYSTEM: &str = "You are a demanding literary critic. You score drafts \
honestly on a 1-10 scale and always answer with a single JSON object and nothing else.";

/// 段落与句子节奏约定（仅作为提示词内容，不做程序校验）
pub const STYLE_CONTRACT: &str = "Style rules:\n\
- Paragraphs of 2 to 5 sentences; never a wall of text.\n\
- Vary sentence length; follow a long sentence with a short one.\n\
- Open the chapter with a concrete scene, question or claim, not a summary.\n\
- End the chapter with a line that pulls the reader into the next one.\n\
- No headings inside the chapter body unless the outline lists sections.";

fn brief_block(brief: &BookBrief) -> String {
    let mut block = format!(
        "Book type: {}\nTitle: {}\nDescription: {}",
        brief.book_type, brief.title, brief.description
    );
    if let Some(audience) = &brief.target_audience {
        let _ = write!(block, "\nTarget audience: {}", audience);
    }
    block
}

fn outline_block(outline: &BookOutline) -> String {
    serde_json::to_string_pretty(outline).unwrap_or_default()
}

fn chapter_block(chapter: &ChapterOutline) -> String {
    let mut block = format!("Chapter {}: {}\nSummary: {}", chapter.number, chapter.title, chapter.summary);
    if !chapter.key_points.is_empty() {
        block.push_str("\nKey points:");
        for point in &chapter.key_points {
            let _ = write!(block, "\n- {}", point);
        }
    }
    if !chapter.sections.is_empty() {
        block.push_str("\nSections:");
        for section in &chapter.sections {
            let _ = write!(block, "\n{} {} ({} words)", section.id, section.title, section.estimated_word_count);
            if !section.summary.is_empty() {
                let _ = write!(block, ": {}", section.summary);
            }
        }
    }
    block
}

pub fn research_questions(brief: &BookBrief) -> String {
    format!(
        "{}\n\nList exactly five questions the author should answer before outlining this book. \
Respond with JSON: {{\"questions\": [{{\"id\": \"q1\", \"question\": \"...\", \"purpose\": \"...\"}}]}}",
        brief_block(brief)
    )
}

pub fn compile_research(brief: &BookBrief, answers: &[ResearchAnswer]) -> String {
    let mut prompt = format!("{}\n\nAuthor answers:", brief_block(brief));
    for answer in answers {
        let _ = write!(prompt, "\nQ: {}\nA: {}", answer.question, answer.answer);
    }
    prompt.push_str(
        "\n\nWrite a research brief covering the core thesis, audience needs, key themes, \
and open points the outline must address.",
    );
    prompt
}

pub fn generate_outline(brief: &BookBrief, research: Option<&str>, chapter_count: Option<u32>) -> String {
    let mut prompt = brief_block(brief);
    if let Some(research) = research {
        let _ = write!(prompt, "\n\nResearch brief:\n{}", research);
    }
    match chapter_count {
        Some(count) => {
            let _ = write!(prompt, "\n\nDesign an outline with exactly {} chapters.", count);
        }
        None => prompt.push_str("\n\nDesign an outline with as many chapters as the book needs."),
    }
    prompt.push_str(
        "\nRespond with JSON: {\"chapters\": [{\"number\": 1, \"title\": \"...\", \"summary\": \"...\", \
\"keyPoints\": [\"...\"], \"sections\": [{\"id\": \"1.1\", \"title\": \"...\", \"summary\": \"...\", \
\"estimatedWordCount\": 800}]}]}",
    );
    prompt
}

pub fn refine_outline(outline: &BookOutline, feedback: &str) -> String {
    format!(
        "Current outline:\n{}\n\nAuthor feedback:\n{}\n\nRevise the outline to address the feedback. \
Respond with the full revised outline in the same JSON shape.",
        outline_block(outline),
        feedback
    )
}

pub fn table_of_contents(outline: &BookOutline) -> String {
    format!(
        "Outline:\n{}\n\nProduce a polished table of contents for this outline. Keep the chapter order. \
Respond with JSON: {{\"entries\": [{{\"number\": 1, \"title\": \"...\", \"sections\": [\"...\"]}}]}}",
        outline_block(outline)
    )
}

pub fn write_chapter(assignment: &ChapterAssignment) -> String {
    let mut prompt = format!("Book type: {}", assignment.book_type);
    if let Some(title) = &assignment.book_title {
        let _ = write!(prompt, "\nBook title: {}", title);
    }
    if let Some(outline) = &assignment.outline {
        prompt.push_str("\n\nBook outline:");
        for chapter in outline.chapters() {
            let _ = write!(prompt, "\n{}. {}", chapter.number, chapter.title);
        }
    }
    if !assignment.previous_chapters.is_empty() {
        prompt.push_str("\n\nPrevious chapters:");
        for summary in &assignment.previous_chapters {
            let _ = write!(prompt, "\nChapter {} ({}): {}", summary.number, summary.title, summary.summary);
        }
    }
    let _ = write!(prompt, "\n\nWrite this chapter in full:\n{}", chapter_block(&assignment.chapter));
    let _ = write!(prompt, "\n\n{}", STYLE_CONTRACT);
    if let Some(notes) = &assignment.style_notes {
        let _ = write!(prompt, "\nAdditional style notes: {}", notes);
    }
    prompt
}

pub fn edit_chapter(content: &str, feedback: Option<&str>, chapter: Option<&ChapterOutline>) -> String {
    let mut prompt = String::new();
    if let Some(chapter) = chapter {
        let _ = write!(prompt, "Chapter brief:\n{}\n\n", chapter_block(chapter));
    }
    match feedback {
        Some(feedback) => {
            let _ = write!(prompt, "Critic feedback to address:\n{}\n\n", feedback);
        }
        None => prompt.push_str("Improve the draft for clarity, flow and style.\n\n"),
    }
    let _ = write!(prompt, "Draft:\n{}", content);
    prompt
}

pub fn inline_edit(selection: &str, instruction: &str, context: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(context) = context {
        let _ = write!(prompt, "Surrounding text:\n{}\n\n", context);
    }
    let _ = write!(
        prompt,
        "Instruction: {}\n\nRewrite only this passage and return only the rewritten passage:\n{}",
        instruction, selection
    );
    prompt
}

pub fn evaluate(content: &str, chapter: Option<&ChapterOutline>) -> String {
    let mut prompt = String::new();
    if let Some(chapter) = chapter {
        let _ = write!(prompt, "Chapter brief:\n{}\n\n", chapter_block(chapter));
    }
    let _ = write!(
        prompt,
        "Draft:\n{}\n\nScore the draft from 1 to 10 on clarity, coherence, engagement, style and structure, \
then give concrete feedback the editor can act on. Respond with JSON: \
{{\"scores\": {{\"clarity\": 7, \"coherence\": 7, \"engagement\": 7, \"style\": 7, \"structure\": 7}}, \
\"feedback\": \"...\"}}",
        content
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_prompt_includes_continuity_and_style() {
        let mut chapter = ChapterOutline::new("The Turn", "Everything changes");
        chapter.number = 2;
        chapter.key_points = vec!["betrayal".into()];
        let assignment = ChapterAssignment {
            book_type: "novel".into(),
            book_title: Some("Tides".into()),
            outline: None,
            chapter,
            previous_chapters: vec![crate::domain::outline::ChapterSummary {
                number: 1,
                title: "Calm".into(),
                summary: "A quiet harbour".into(),
            }],
            style_notes: None,
        };

        let prompt = write_chapter(&assignment);
        assert!(prompt.contains("Chapter 1 (Calm): A quiet harbour"));
        assert!(prompt.contains("Chapter 2: The Turn"));
        assert!(prompt.contains("- betrayal"));
        assert!(prompt.contains(STYLE_CONTRACT));
    }

    #[test]
    fn test_edit_prompt_carries_feedback() {
        let prompt = edit_chapter("draft text", Some("tighten the opening"), None);
        assert!(prompt.contains("tighten the opening"));
        assert!(prompt.ends_with("draft text"));
    }
}
