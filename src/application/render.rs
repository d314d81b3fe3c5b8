//! Final page rendering.
//!
//! The render cache holds content fragments; a [`Renderer`] wraps a fragment
//! into the document served to the client, using presentation parameters
//! that depend on the requester and on live configuration.

use askama::Template;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::{auth::ModerationLevel, boards::BoardTitleList};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

/// Requester-dependent rendering parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub theme: String,
    pub level: ModerationLevel,
    /// Render without the surrounding page chrome.
    pub minimal: bool,
}

/// Everything needed to produce the final document.
#[derive(Debug, Clone)]
pub enum RenderView<'a> {
    Board {
        board: &'a str,
        title: &'a str,
        catalog: bool,
        page: u32,
        total_pages: u32,
        presentation: &'a Presentation,
        html: &'a Bytes,
    },
    Thread {
        id: u64,
        board: &'a str,
        subject: &'a str,
        abbreviated: bool,
        locked: bool,
        presentation: &'a Presentation,
        html: &'a Bytes,
    },
}

/// Turns a cached fragment into response bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &RenderView<'_>) -> Result<Bytes, RenderError>;
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"{% if !minimal %}<!doctype html>
<html data-theme="{{ theme }}">
<head><meta charset="utf-8"><title>{{ heading }}</title></head>
<body class="{{ level }}">
<h1>{{ heading }}</h1>
{% endif %}<section id="{{ section_id }}" data-page="{{ page }}" data-total="{{ total_pages }}"{% if locked %} data-locked{% endif %}>
{{ body|safe }}
</section>{% if !minimal %}
</body>
</html>{% endif %}"#
)]
struct ShellTemplate<'a> {
    minimal: bool,
    theme: &'a str,
    level: &'a str,
    heading: String,
    section_id: String,
    page: u32,
    total_pages: u32,
    locked: bool,
    body: &'a str,
}

/// Minimal document shell used when no richer renderer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRenderer;

impl Renderer for ShellRenderer {
    fn render(&self, view: &RenderView<'_>) -> Result<Bytes, RenderError> {
        let rendered = match view {
            RenderView::Board {
                board,
                title,
                catalog,
                page,
                total_pages,
                presentation,
                html,
            } => {
                let body = String::from_utf8_lossy(html);
                ShellTemplate {
                    minimal: presentation.minimal,
                    theme: &presentation.theme,
                    level: presentation.level.as_str(),
                    heading: format!("/{board}/ - {title}"),
                    section_id: if *catalog {
                        "catalog".to_string()
                    } else {
                        "threads".to_string()
                    },
                    page: *page,
                    total_pages: *total_pages,
                    locked: false,
                    body: &body,
                }
                .render()?
            }
            RenderView::Thread {
                id,
                board,
                subject,
                abbreviated,
                locked,
                presentation,
                html,
            } => {
                let body = String::from_utf8_lossy(html);
                ShellTemplate {
                    minimal: presentation.minimal,
                    theme: &presentation.theme,
                    level: presentation.level.as_str(),
                    heading: format!("/{board}/ - {subject}"),
                    section_id: format!("thread-{id}"),
                    page: 0,
                    total_pages: if *abbreviated { 0 } else { 1 },
                    locked: *locked,
                    body: &body,
                }
                .render()?
            }
        };
        Ok(Bytes::from(rendered))
    }
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<select name="boards" required>{% for board in boards.iter() %}
<option value="{{ board.id }}">/{{ board.id }}/ - {{ board.title }}</option>{% endfor %}
</select>"#
)]
struct OwnedBoardsTemplate<'a> {
    boards: &'a BoardTitleList,
}

/// Selection form listing the boards a user owns.
pub fn render_owned_boards(boards: &BoardTitleList) -> Result<Bytes, RenderError> {
    Ok(Bytes::from(OwnedBoardsTemplate { boards }.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presentation(minimal: bool) -> Presentation {
        Presentation {
            theme: "ocean".to_string(),
            level: ModerationLevel::Moderator,
            minimal,
        }
    }

    #[test]
    fn board_shell_embeds_fragment_unescaped() {
        let html = Bytes::from_static(b"<article>hi</article>");
        let presentation = presentation(false);
        let out = ShellRenderer
            .render(&RenderView::Board {
                board: "g",
                title: "Games & more",
                catalog: false,
                page: 1,
                total_pages: 3,
                presentation: &presentation,
                html: &html,
            })
            .expect("render");
        let text = std::str::from_utf8(&out).expect("utf8");

        assert!(text.contains("<article>hi</article>"));
        assert!(text.contains(r#"data-theme="ocean""#));
        assert!(text.contains("Games &#38; more"));
        assert!(!text.contains("Games & more"));
        assert!(text.contains(r#"class="moderator""#));
        assert!(text.contains(r#"data-total="3""#));
    }

    #[test]
    fn owned_boards_select_escapes_titles() {
        use crate::domain::boards::BoardTitle;

        let boards = BoardTitleList::new(
            Vec::new(),
            vec![BoardTitle {
                id: "g".to_string(),
                title: "<Games>".to_string(),
            }],
        );
        let out = render_owned_boards(&boards).expect("render");
        let text = std::str::from_utf8(&out).expect("utf8");

        assert!(text.contains(r#"<option value="g">"#));
        assert!(text.contains("&#60;Games&#62;"));
        assert!(!text.contains("<Games>"));
    }

    #[test]
    fn minimal_thread_has_no_chrome() {
        let html = Bytes::from_static(b"<p>op</p>");
        let presentation = presentation(true);
        let out = ShellRenderer
            .render(&RenderView::Thread {
                id: 42,
                board: "g",
                subject: "Hello",
                abbreviated: true,
                locked: true,
                presentation: &presentation,
                html: &html,
            })
            .expect("render");
        let text = std::str::from_utf8(&out).expect("utf8");

        assert!(!text.contains("<html"));
        assert!(text.contains(r#"id="thread-42""#));
        assert!(text.contains("data-locked"));
    }
}
