//! Server-side rendering of the one-page portfolio site.
//!
//! Markup only. Class names (`content-section`, `timeline`,
//! `chat-message model`, ...) are the hooks for an external stylesheet.

pub mod handlers;
pub mod sections;

use crate::chat::session::SessionSnapshot;
use crate::content::Portfolio;

/// What the contact section needs to draw the chat panel.
pub struct ChatPanel<'a> {
    pub snapshot: &'a SessionSnapshot,
    pub token: &'a str,
}

/// Escapes text for both element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the full page: header, every section in order, footer.
pub fn render_page(portfolio: &Portfolio, chat: &ChatPanel<'_>, year: i32) -> String {
    let body = [
        sections::hero(portfolio),
        sections::about(portfolio),
        sections::experience(portfolio),
        sections::projects(portfolio),
        sections::skills(portfolio),
        sections::education(portfolio),
        sections::contact(portfolio, chat),
    ]
    .concat();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{name} | Portfolio</title>\n\
         </head>\n<body>\n{header}<main>\n{body}</main>\n{footer}</body>\n</html>\n",
        name = escape(&portfolio.name),
        header = sections::header(portfolio),
        footer = sections::footer(portfolio, year),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::ChatSession;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_page_sections_in_order() {
        let portfolio = Portfolio::bundled().unwrap();
        let snapshot = ChatSession::mount(&portfolio.greeting).snapshot();
        let page = render_page(
            &portfolio,
            &ChatPanel {
                snapshot: &snapshot,
                token: "t",
            },
            2025,
        );

        let ids = [
            "id=\"home\"",
            "id=\"about\"",
            "id=\"experience\"",
            "id=\"projects\"",
            "id=\"skills\"",
            "id=\"education\"",
            "id=\"contact\"",
        ];
        let positions: Vec<usize> = ids.iter().map(|id| page.find(id).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(page.contains("<title>Tanvir Ahsan | Portfolio</title>"));
        assert!(page.contains("&copy; 2025 Tanvir Ahsan. All Rights Reserved."));
    }
}
