//! Formats the portfolio into the assistant's system instruction.

use super::Portfolio;

/// Briefing template. Replace: {name}, {title}, {location}, {summary},
///                             {skills}, {experience}, {education}, {projects}
pub const BRIEFING_TEMPLATE: &str = "You are a professional AI assistant for {name}'s portfolio website. \
Answer questions based ONLY on the following information:
    Name: {name}
    Title: {title}
    Location: {location}
    Summary: {summary}
    Skills: {skills}
    Experience: {experience}
    Education: {education}
    Projects: {projects}
Be friendly and concise. If a question is outside this scope, politely decline to answer.";

/// Builds the briefing sent as the system instruction with every chat request.
pub fn build_system_instruction(portfolio: &Portfolio) -> String {
    let experience = portfolio
        .experience
        .iter()
        .map(|e| format!("{} at {} ({}): {}", e.role, e.company, e.period, e.description))
        .collect::<Vec<_>>()
        .join("; ");

    let education = portfolio
        .education
        .iter()
        .map(|e| format!("{} from {} ({})", e.degree, e.institution, e.period))
        .collect::<Vec<_>>()
        .join("; ");

    let projects = portfolio
        .projects
        .iter()
        .map(|p| format!("{}: {}", p.name, p.result))
        .collect::<Vec<_>>()
        .join("; ");

    let skills = portfolio.skills.join(", ");

    // Values are substituted in one pass so that CV text containing a
    // placeholder literal is never expanded twice.
    let values = [
        ("{name}", portfolio.name.as_str()),
        ("{title}", portfolio.title.as_str()),
        ("{location}", portfolio.location.as_str()),
        ("{summary}", portfolio.summary.as_str()),
        ("{skills}", skills.as_str()),
        ("{experience}", experience.as_str()),
        ("{education}", education.as_str()),
        ("{projects}", projects.as_str()),
    ];
    fill_template(BRIEFING_TEMPLATE, &values)
}

fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 4);
    let mut rest = template;
    'scan: while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        for (placeholder, value) in values {
            if tail.starts_with(placeholder) {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}
