//! One function per page region. Each returns a self-contained HTML fragment.

use super::{escape, ChatPanel};
use crate::chat::message::Role;
use crate::content::Portfolio;

/// Navigation entries: (label, anchor). `None` label means "{first name} in AI".
const NAV_LINKS: &[(Option<&str>, &str)] = &[
    (Some("Home"), "#home"),
    (Some("Biography"), "#about"),
    (Some("Projects"), "#projects"),
    (Some("Books"), "#"),
    (Some("Blog"), "#"),
    (Some("Tweet"), "#"),
    (Some("Social Work"), "#"),
    (None, "#contact"),
    (Some("Contact"), "#contact"),
    (Some("News"), "#"),
];

const CONTACT_BLURB: &str = "I'm open to discussing new projects and opportunities. \
    Feel free to send me an email or connect on LinkedIn.";

/// Wraps a content section; `content-section` is what the reveal-on-scroll styling hooks.
fn section(id: &str, title: &str, body: &str) -> String {
    format!(
        "<section id=\"{id}\" class=\"content-section\">\n\
         <div class=\"container\">\n<h2>{title}</h2>\n\
         <div class=\"content-body\">\n{body}</div>\n</div>\n</section>\n"
    )
}

fn tags(class: &str, items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<span class=\"{class}\">{}</span>", escape(item)))
        .collect()
}

pub fn header(portfolio: &Portfolio) -> String {
    let ai_label = format!("{} in AI", portfolio.first_name());
    let links: String = NAV_LINKS
        .iter()
        .map(|(label, href)| {
            let label = label.unwrap_or(ai_label.as_str());
            format!("<li><a href=\"{href}\">{}</a></li>", escape(label))
        })
        .collect();

    format!(
        "<header>\n<nav class=\"container\">\n\
         <a href=\"#\" class=\"logo\">{logo}</a>\n\
         <div class=\"nav-links\"><ul>{links}</ul></div>\n\
         <button class=\"hamburger\" aria-label=\"Toggle menu\" aria-expanded=\"false\">\
         <span></span><span></span><span></span></button>\n\
         </nav>\n</header>\n",
        logo = escape(&portfolio.initials()),
    )
}

pub fn hero(portfolio: &Portfolio) -> String {
    format!(
        "<section id=\"home\" class=\"hero\">\n\
         <div class=\"hero-content container\">\n\
         <h1>{name}</h1>\n<p>{title}</p>\n\
         <div class=\"cta-group\">\
         <a href=\"#\" class=\"cta-button\" target=\"_blank\" rel=\"noopener noreferrer\">Schedule a Meeting</a>\
         <a href=\"mailto:{email}\" class=\"cta-button-outline\">Send an Email</a>\
         </div>\n</div>\n</section>\n",
        name = escape(&portfolio.name),
        title = escape(&portfolio.title),
        email = escape(&portfolio.contact.email),
    )
}

pub fn about(portfolio: &Portfolio) -> String {
    let body = format!(
        "<div class=\"about-layout\">\
         <img src=\"{src}\" alt=\"A portrait of {name}\" class=\"profile-image\">\
         <p>{summary}</p></div>\n",
        src = escape(&portfolio.profile_image),
        name = escape(&portfolio.name),
        summary = escape(&portfolio.summary),
    );
    section("about", "About Me", &body)
}

pub fn experience(portfolio: &Portfolio) -> String {
    let items: String = portfolio
        .experience
        .iter()
        .map(|job| {
            format!(
                "<div class=\"timeline-item\"><div class=\"timeline-dot\"></div>\
                 <div class=\"timeline-content\"><h3>{role}</h3>\
                 <span class=\"company\">{company}</span>\
                 <span class=\"period\">{period}</span>\
                 <p>{description}</p></div></div>\n",
                role = escape(&job.role),
                company = escape(&job.company),
                period = escape(&job.period),
                description = escape(&job.description),
            )
        })
        .collect();
    section(
        "experience",
        "Experience",
        &format!("<div class=\"timeline\">\n{items}</div>\n"),
    )
}

pub fn projects(portfolio: &Portfolio) -> String {
    let cards: String = portfolio
        .projects
        .iter()
        .map(|project| {
            format!(
                "<div class=\"project-card\"><h3>{name}</h3><p>{description}</p>\
                 <p class=\"project-result\">{result}</p>\
                 <div class=\"project-skills\">{skills}</div></div>\n",
                name = escape(&project.name),
                description = escape(&project.description),
                result = escape(&project.result),
                skills = tags("skill-tag", &project.skills),
            )
        })
        .collect();
    section(
        "projects",
        "Project Contributions",
        &format!("<div class=\"projects-grid\">\n{cards}</div>\n"),
    )
}

pub fn skills(portfolio: &Portfolio) -> String {
    let cards: String = portfolio
        .skills
        .iter()
        .map(|skill| format!("<div class=\"skill-card\">{}</div>", escape(skill)))
        .collect();
    section(
        "skills",
        "Top Skills",
        &format!("<div class=\"skills-grid\">{cards}</div>\n"),
    )
}

pub fn education(portfolio: &Portfolio) -> String {
    let items: String = portfolio
        .education
        .iter()
        .map(|edu| {
            let detail = if edu.period.is_empty() {
                escape(&edu.degree)
            } else {
                format!("{} | {}", escape(&edu.degree), escape(&edu.period))
            };
            format!(
                "<div class=\"education-item\"><h3>{}</h3><p>{detail}</p></div>\n",
                escape(&edu.institution)
            )
        })
        .collect();
    section(
        "education",
        "Education",
        &format!("<div class=\"education-list\">\n{items}</div>\n"),
    )
}

pub fn contact(portfolio: &Portfolio, chat: &ChatPanel<'_>) -> String {
    let email = escape(&portfolio.contact.email);
    let body = format!(
        "<div class=\"contact-container\">\n<div class=\"contact-info\">\
         <h3>Let's Connect</h3><p>{CONTACT_BLURB}</p>\
         <a href=\"mailto:{email}\" class=\"contact-link\">{email}</a>\
         <a href=\"{linkedin}\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"contact-link\">LinkedIn Profile</a>\
         </div>\n{panel}</div>\n",
        linkedin = escape(&portfolio.contact.linkedin),
        panel = chat_panel(portfolio, chat),
    );
    section("contact", "Contact", &body)
}

/// The chat widget. The log always ends with the `chat-bottom` anchor so a
/// redirect to `/#chat-bottom` lands on the newest message.
pub fn chat_panel(portfolio: &Portfolio, chat: &ChatPanel<'_>) -> String {
    let snapshot = chat.snapshot;
    let mut log: String = snapshot
        .messages
        .iter()
        .map(|m| {
            let class = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            format!(
                "<div class=\"chat-message {class}\"><p>{}</p></div>\n",
                escape(&m.text)
            )
        })
        .collect();
    if snapshot.typing {
        log.push_str(
            "<div class=\"chat-message model\"><p class=\"typing-indicator\">\
             <span></span><span></span><span></span></p></div>\n",
        );
    }

    let (placeholder, disabled) = if snapshot.input_enabled {
        ("e.g., What are the top skills?", "")
    } else {
        ("Thinking...", " disabled")
    };

    format!(
        "<div class=\"ai-chat-container\">\n<h3>Ask My AI Assistant</h3>\n\
         <div class=\"chat-history\" role=\"log\">\n{log}<span id=\"chat-bottom\"></span>\n</div>\n\
         <form class=\"chat-input\" method=\"post\" action=\"/chat\">\
         <input type=\"hidden\" name=\"token\" value=\"{token}\">\
         <input type=\"text\" name=\"message\" placeholder=\"{placeholder}\" \
         aria-label=\"Ask a question about {first}\" autocomplete=\"off\"{disabled}>\
         <button type=\"submit\" aria-label=\"Send message\"{disabled}>Send</button>\
         </form>\n</div>\n",
        token = escape(chat.token),
        first = escape(portfolio.first_name()),
    )
}

pub fn footer(portfolio: &Portfolio, year: i32) -> String {
    format!(
        "<footer><div class=\"container\"><p>&copy; {year} {}. All Rights Reserved.</p></div></footer>\n",
        escape(&portfolio.name)
    )
}
