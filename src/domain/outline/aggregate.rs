//! Outline Context - Aggregate Root

use serde::{Deserialize, Serialize};

use super::{ChapterOutline, ChapterPatch, OutlineError, TocEntry};

/// BookOutline 聚合根
///
/// 不变量:
/// - 章节编号从 1 开始连续
/// - 小节 id 为 `"<chapter>.<section>"`，章节增删或移动后整体重新生成
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookOutline {
    chapters: Vec<ChapterOutline>,
}

impl BookOutline {
    /// 按给定顺序创建大纲并重新编号
    pub fn new(chapters: Vec<ChapterOutline>) -> Self {
        let mut outline = Self { chapters };
        outline.renumber();
        outline
    }

    pub fn chapters(&self) -> &[ChapterOutline] {
        &self.chapters
    }

    pub fn chapter(&self, number: u32) -> Option<&ChapterOutline> {
        self.chapters.iter().find(|c| c.number == number)
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// 重新编号章节与小节
    pub fn renumber(&mut self) {
        for (i, chapter) in self.chapters.iter_mut().enumerate() {
            chapter.number = (i + 1) as u32;
            for (j, section) in chapter.sections.iter_mut().enumerate() {
                section.id = format!("{}.{}", chapter.number, j + 1);
            }
        }
    }

    /// 在 position（1-based）处插入章节，返回新章节编号
    pub fn insert_chapter(
        &mut self,
        position: usize,
        chapter: ChapterOutline,
    ) -> Result<u32, OutlineError> {
        if chapter.title.trim().is_empty() {
            return Err(OutlineError::EmptyTitle);
        }
        if position == 0 || position > self.chapters.len() + 1 {
            return Err(OutlineError::InvalidPosition {
                position,
                len: self.chapters.len(),
            });
        }

        self.chapters.insert(position - 1, chapter);
        self.renumber();
        Ok(position as u32)
    }

    /// 追加章节到末尾
    pub fn push_chapter(&mut self, chapter: ChapterOutline) -> Result<u32, OutlineError> {
        let position = self.chapters.len() + 1;
        self.insert_chapter(position, chapter)
    }

    /// 删除章节，其后章节编号前移
    pub fn remove_chapter(&mut self, number: u32) -> Result<ChapterOutline, OutlineError> {
        let index = self.index_of(number)?;
        let removed = self.chapters.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// 把章节 from 移动到 to 的位置
    pub fn move_chapter(&mut self, from: u32, to: u32) -> Result<(), OutlineError> {
        let from_index = self.index_of(from)?;
        if to == 0 || to as usize > self.chapters.len() {
            return Err(OutlineError::InvalidPosition {
                position: to as usize,
                len: self.chapters.len(),
            });
        }

        let chapter = self.chapters.remove(from_index);
        self.chapters.insert(to as usize - 1, chapter);
        self.renumber();
        Ok(())
    }

    /// 局部更新章节内容（不改变顺序）
    pub fn update_chapter(&mut self, number: u32, patch: ChapterPatch) -> Result<(), OutlineError> {
        let index = self.index_of(number)?;
        let chapter = &mut self.chapters[index];

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(OutlineError::EmptyTitle);
            }
            chapter.title = title;
        }
        if let Some(summary) = patch.summary {
            chapter.summary = summary;
        }
        if let Some(key_points) = patch.key_points {
            chapter.key_points = key_points;
        }
        if let Some(sections) = patch.sections {
            chapter.sections = sections;
        }

        self.renumber();
        Ok(())
    }

    /// 校验外部传入的大纲满足编号不变量
    pub fn validate(&self) -> Result<(), OutlineError> {
        for (i, chapter) in self.chapters.iter().enumerate() {
            let expected = (i + 1) as u32;
            if chapter.number != expected {
                return Err(OutlineError::InvalidNumbering(format!(
                    "chapter at position {} has number {}",
                    expected, chapter.number
                )));
            }
            if chapter.title.trim().is_empty() {
                return Err(OutlineError::EmptyTitle);
            }
            for (j, section) in chapter.sections.iter().enumerate() {
                let expected_id = format!("{}.{}", expected, j + 1);
                if section.id != expected_id {
                    return Err(OutlineError::InvalidNumbering(format!(
                        "section {} should be {}",
                        section.id, expected_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// 由大纲直接推导目录
    pub fn table_of_contents(&self) -> Vec<TocEntry> {
        self.chapters
            .iter()
            .map(|c| TocEntry {
                number: c.number,
                title: c.title.clone(),
                sections: c.sections.iter().map(|s| s.title.clone()).collect(),
            })
            .collect()
    }

    fn index_of(&self, number: u32) -> Result<usize, OutlineError> {
        self.chapters
            .iter()
            .position(|c| c.number == number)
            .ok_or(OutlineError::ChapterNotFound(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outline::SectionOutline;

    fn chapter(title: &str, sections: &[&str]) -> ChapterOutline {
        let mut c = ChapterOutline::new(title, format!("{} summary", title));
        c.sections = sections
            .iter()
            .map(|s| SectionOutline {
                id: String::new(),
                title: s.to_string(),
                summary: String::new(),
                estimated_word_count: 500,
            })
            .collect();
        c
    }

    fn three_chapters() -> BookOutline {
        BookOutline::new(vec![
            chapter("Origins", &["Spark"]),
            chapter("Middle", &["Turn", "Twist"]),
            chapter("Ending", &["Resolution"]),
        ])
    }

    #[test]
    fn test_new_assigns_dense_numbers_and_section_ids() {
        let outline = three_chapters();
        let numbers: Vec<u32> = outline.chapters().iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(outline.chapters()[1].sections[1].id, "2.2");
        assert!(outline.validate().is_ok());
    }

    #[test]
    fn test_remove_middle_chapter_renumbers() {
        let mut outline = three_chapters();
        let removed = outline.remove_chapter(2).unwrap();
        assert_eq!(removed.title, "Middle");

        let chapters = outline.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].number, chapters[0].title.as_str()), (1, "Origins"));
        assert_eq!((chapters[1].number, chapters[1].title.as_str()), (2, "Ending"));
        assert_eq!(chapters[0].sections[0].id, "1.1");
        assert_eq!(chapters[1].sections[0].id, "2.1");
    }

    #[test]
    fn test_insert_and_move() {
        let mut outline = three_chapters();
        let number = outline.insert_chapter(1, chapter("Prologue", &["Hook"])).unwrap();
        assert_eq!(number, 1);
        assert_eq!(outline.chapter(2).unwrap().title, "Origins");
        assert_eq!(outline.chapter(1).unwrap().sections[0].id, "1.1");

        outline.move_chapter(1, 4).unwrap();
        assert_eq!(outline.chapter(4).unwrap().title, "Prologue");
        assert_eq!(outline.chapter(4).unwrap().sections[0].id, "4.1");
        assert_eq!(outline.chapter(1).unwrap().title, "Origins");
        assert!(outline.validate().is_ok());
    }

    #[test]
    fn test_invalid_operations() {
        let mut outline = three_chapters();
        assert_eq!(
            outline.remove_chapter(9),
            Err(OutlineError::ChapterNotFound(9))
        );
        assert!(outline.insert_chapter(0, chapter("X", &[])).is_err());
        assert!(outline.insert_chapter(5, chapter("X", &[])).is_err());
        assert_eq!(
            outline.insert_chapter(1, chapter("  ", &[])),
            Err(OutlineError::EmptyTitle)
        );
        assert!(outline.move_chapter(1, 0).is_err());
    }

    #[test]
    fn test_validate_rejects_sparse_numbers() {
        let json = r#"{"chapters":[{"number":1,"title":"A"},{"number":3,"title":"B"}]}"#;
        let outline: BookOutline = serde_json::from_str(json).unwrap();
        assert!(matches!(
            outline.validate(),
            Err(OutlineError::InvalidNumbering(_))
        ));
    }

    #[test]
    fn test_update_chapter_replaces_sections() {
        let mut outline = three_chapters();
        let patch = ChapterPatch {
            title: Some("Renamed".into()),
            sections: Some(vec![
                SectionOutline {
                    id: "x".into(),
                    title: "One".into(),
                    summary: String::new(),
                    estimated_word_count: 100,
                },
                SectionOutline {
                    id: "y".into(),
                    title: "Two".into(),
                    summary: String::new(),
                    estimated_word_count: 200,
                },
            ]),
            ..Default::default()
        };
        outline.update_chapter(3, patch).unwrap();

        let c = outline.chapter(3).unwrap();
        assert_eq!(c.title, "Renamed");
        assert_eq!(c.sections[1].id, "3.2");
        assert_eq!(c.estimated_word_count(), 300);
    }

    #[test]
    fn test_table_of_contents() {
        let toc = three_chapters().table_of_contents();
        assert_eq!(toc.len(), 3);
        assert_eq!(toc[1].sections, vec!["Turn".to_string(), "Twist".to_string()]);
    }
}
