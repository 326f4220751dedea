//! Per-announcement output directories and the content.md format.

use std::path::{Path, PathBuf};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::{Announcement, Detail, PLACEHOLDER_CONTENT};
use crate::filename::sanitize_with_limit;

/// Title length cap for the folder name component, keeping the full path
/// well under common filesystem limits even with the numeric prefix.
pub const FOLDER_TITLE_LIMIT: usize = 100;

pub const CONTENT_FILE: &str = "content.md";
pub const ATTACHMENTS_DIR: &str = "attachments";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Create `<base>/<NNN>_<sanitized_title>/`, resolving collisions between
/// long, similarly-prefixed titles with a numeric suffix.
pub async fn create_announcement_dir(
    base: &Path,
    index: usize,
    title: &str,
) -> std::io::Result<PathBuf> {
    let name = format!("{index:03}_{}", sanitize_with_limit(title, FOLDER_TITLE_LIMIT));
    let mut dir = base.join(&name);
    let mut n = 2;
    while dir.exists() {
        dir = base.join(format!("{name}_{n}"));
        n += 1;
    }
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Render the content.md document: `# title`, metadata lines, separator,
/// then the converted body.
pub fn render_content(announcement: &Announcement, detail: &Detail) -> String {
    let title = detail.title.as_deref().unwrap_or(&announcement.title);
    let mut doc = format!("# {title}\n\n");

    let mut field = |label: &str, value: &str| {
        if !value.trim().is_empty() {
            doc.push_str(&format!("**{label}**: {}\n", value.trim()));
        }
    };

    if let Some(date) = &announcement.date {
        field("작성일", date);
    }
    if let Some(author) = &announcement.author {
        field("작성자", author);
    }
    if let Some(views) = &announcement.views {
        field("조회수", views);
    }
    if let Some(category) = &announcement.category {
        field("분류", category);
    }
    for (label, value) in &announcement.extra {
        field(label, value);
    }
    field("원본 URL", &announcement.url);
    if let Ok(now) = time::OffsetDateTime::now_utc().format(TIMESTAMP_FORMAT) {
        field("수집일시", &format!("{now} UTC"));
    }

    doc.push_str("\n---\n\n");
    let body = detail.content.trim();
    if body.is_empty() {
        doc.push_str(PLACEHOLDER_CONTENT);
    } else {
        doc.push_str(body);
    }
    doc.push('\n');
    doc
}

pub async fn write_content(dir: &Path, content: &str) -> std::io::Result<()> {
    tokio::fs::write(dir.join(CONTENT_FILE), content).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn long_titles_truncate_and_stay_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let long_a = format!("2025년 {} 공고", "지원사업".repeat(60));
        let long_b = format!("2025년 {} 안내", "지원사업".repeat(60));

        let dir_a = create_announcement_dir(tmp.path(), 1, &long_a).await.unwrap();
        let dir_b = create_announcement_dir(tmp.path(), 2, &long_b).await.unwrap();
        // Same long title again in the same batch must not collide.
        let dir_c = create_announcement_dir(tmp.path(), 2, &long_b).await.unwrap();

        for dir in [&dir_a, &dir_b, &dir_c] {
            let name = dir.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.chars().count() <= FOLDER_TITLE_LIMIT + 10, "{name}");
            assert!(dir.is_dir());
        }
        assert_ne!(dir_b, dir_c);
    }

    #[test]
    fn content_document_shape() {
        let mut ann = Announcement::new("수출 지원사업 공고", "https://e.kr/board/1");
        ann.date = Some("2025-07-01".to_string());
        ann.author = Some("기업지원팀".to_string());
        ann.extra.insert("접수기간".to_string(), "2025-07-01 ~ 2025-07-31".to_string());
        let detail = Detail {
            title: None,
            content: "## 사업 개요\n신청 자격은 다음과 같다.".to_string(),
            attachments: vec![],
        };

        let doc = render_content(&ann, &detail);
        assert!(doc.starts_with("# 수출 지원사업 공고\n"));
        assert!(doc.contains("**작성일**: 2025-07-01"));
        assert!(doc.contains("**작성자**: 기업지원팀"));
        assert!(doc.contains("**접수기간**: 2025-07-01 ~ 2025-07-31"));
        assert!(doc.contains("**원본 URL**: https://e.kr/board/1"));
        assert!(doc.contains("\n---\n"));
        assert!(doc.trim_end().ends_with("신청 자격은 다음과 같다."));
    }

    #[test]
    fn empty_body_gets_placeholder() {
        let ann = Announcement::new("공고", "https://e.kr/1");
        let doc = render_content(&ann, &Detail::default());
        assert!(doc.contains(PLACEHOLDER_CONTENT));
    }
}
