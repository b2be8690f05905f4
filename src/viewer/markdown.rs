use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Converts a markdown message body into styled lines.
///
/// Every image goes through `image_span`, which receives the raw
/// destination URL and returns what to show in its place.
pub fn render_markdown(
    md: &str,
    mut image_span: impl FnMut(&str) -> Span<'static>,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::with_capacity(md.lines().count());
    let mut current: Vec<Span<'static>> = Vec::with_capacity(4);
    let mut in_code_block = false;
    let mut in_heading = false;
    let mut in_emphasis = false;
    let mut in_strong = false;
    // Alt text of an image is already represented by its placeholder.
    let mut image_depth = 0usize;

    for event in Parser::new(md) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                flush(&mut lines, &mut current);
                in_heading = false;
            }
            Event::End(TagEnd::Paragraph) => {
                flush(&mut lines, &mut current);
                lines.push(Line::from(""));
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                flush(&mut lines, &mut current);
                in_code_block = false;
                lines.push(Line::from(""));
            }
            Event::Start(Tag::Emphasis) => in_emphasis = true,
            Event::End(TagEnd::Emphasis) => in_emphasis = false,
            Event::Start(Tag::Strong) => in_strong = true,
            Event::End(TagEnd::Strong) => in_strong = false,
            Event::Start(Tag::Image { dest_url, .. }) => {
                current.push(image_span(&dest_url));
                image_depth += 1;
            }
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(_) if image_depth > 0 => {}
            Event::Text(text) if in_code_block => {
                let style = Style::default().fg(Color::Yellow).bg(Color::Black);
                for (i, part) in text.split('\n').enumerate() {
                    if i > 0 {
                        flush(&mut lines, &mut current);
                    }
                    if !part.is_empty() {
                        current.push(Span::styled(part.to_string(), style));
                    }
                }
            }
            Event::Text(text) => {
                let style = if in_heading {
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan)
                } else if in_strong {
                    Style::default().add_modifier(Modifier::BOLD)
                } else if in_emphasis {
                    Style::default().add_modifier(Modifier::ITALIC)
                } else {
                    Style::default()
                };
                current.push(Span::styled(text.into_string(), style));
            }
            Event::Code(code) => {
                current.push(Span::styled(
                    format!("`{code}`"),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak => current.push(Span::raw(" ")),
            Event::HardBreak => flush(&mut lines, &mut current),
            _ => {}
        }
    }

    flush(&mut lines, &mut current);
    lines
}

fn flush(lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>) {
    if !current.is_empty() {
        lines.push(Line::from(std::mem::take(current)));
    }
}

/// Plain text of rendered lines, one per line.
pub fn to_plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> Vec<Line<'static>> {
        render_markdown(md, |url| Span::raw(format!("<{url}>")))
    }

    #[test]
    fn test_render_paragraphs() {
        let lines = render("Hello world\n\nSecond");
        assert_eq!(to_plain_text(&lines), "Hello world\n\nSecond\n");
    }

    #[test]
    fn test_render_heading_is_bold() {
        let lines = render("# Title");
        let span = &lines[0].spans[0];
        assert_eq!(span.content, "Title");
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_render_inline_styles() {
        let lines = render("a **b** *c* `d`");
        assert_eq!(to_plain_text(&lines[..1]), "a b c `d`");
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let lines = render("```\nfn a() {}\nfn b() {}\n```");
        assert_eq!(to_plain_text(&lines), "fn a() {}\nfn b() {}\n");
    }

    #[test]
    fn test_images_use_hook_and_drop_alt_text() {
        let mut seen = Vec::new();
        let lines = render_markdown("before ![alt text](pic.png) after", |url| {
            seen.push(url.to_string());
            Span::raw("[img]")
        });
        assert_eq!(seen, vec!["pic.png"]);
        assert_eq!(to_plain_text(&lines[..1]), "before [img] after");
    }

    #[test]
    fn test_render_empty() {
        assert!(render("").is_empty());
    }
}
