//! Server-rendered HTML for the research dashboard.

use std::fmt::Write;

use stratai_core::{ReportSection, RunResult, SectionLevel, report_sections};

use crate::state::{FlashKind, SessionContext};

pub const MISSING_INPUT_WARNING: &str =
    "Please enter Company, Industry, Serper Dev API Key, and OpenAI API Key";
pub const NO_OUTPUT_INFO: &str = "No detailed output available yet.";

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex;min-height:100vh}\
aside{width:18rem;padding:1.5rem;background:#f0f2f6}\
main{flex:1;padding:2rem 3rem;max-width:60rem}\
.columns{display:flex;gap:1rem}.columns label{flex:1}\
label{display:block;margin-bottom:1rem}input{width:100%;padding:.4rem;box-sizing:border-box}\
button,.download{background:#ff4b4b;color:#fff;border:0;padding:.6rem 1rem;border-radius:.4rem;\
text-decoration:none;display:inline-block;cursor:pointer}\
.flash{padding:.8rem;border-radius:.4rem;margin:1rem 0}.warning{background:#fffce7}\
.error{background:#ffecec}.info{background:#e8f1fb;padding:.8rem;border-radius:.4rem}";

const SIDEBAR_INFO: &[&str] = &[
    "Understand industry trends",
    "Discover AI transformation opportunities",
    "Find relevant implementation resources",
    "Discover, Analyze, and Innovate with AI",
];

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_section(html: &mut String, section: &ReportSection) {
    let text = escape_html(&section.text);
    let _ = match section.level {
        SectionLevel::TitleMedium => writeln!(html, "<h4>{text}</h4>"),
        SectionLevel::TitleLarge => writeln!(html, "<h3>{text}</h3>"),
        SectionLevel::Body => writeln!(
            html,
            "<p>{}</p>",
            escape_html(section.text.trim()).replace('\n', "<br>")
        ),
    };
}

fn render_results(html: &mut String, result: &RunResult) {
    html.push_str("<section id=\"results\">\n<h2>&#128269; Research Findings</h2>\n");

    if result.has_outputs() {
        for section in report_sections(result) {
            render_section(html, &section);
        }
    } else {
        let _ = writeln!(html, "<p class=\"info\">{NO_OUTPUT_INFO}</p>");
    }

    html.push_str(
        "<p><a class=\"download\" href=\"/report.pdf\" download>Download Report as PDF</a></p>\n</section>\n",
    );
}

/// Full page for one session; `None` renders the empty form.
pub fn render_index(context: Option<&SessionContext>) -> String {
    let company = context.map(|c| escape_html(&c.company)).unwrap_or_default();
    let industry = context.map(|c| escape_html(&c.industry)).unwrap_or_default();

    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>StratAI</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <form method=\"post\" action=\"/research\" id=\"research-form\"></form>\n"
    );

    html.push_str("<aside>\n<h2>API Configuration</h2>\n");
    html.push_str(
        "<label>Enter Serper Dev API Key<input type=\"password\" name=\"serper_api_key\" \
         form=\"research-form\" autocomplete=\"off\"></label>\n\
         <label>Enter OpenAI API Key<input type=\"password\" name=\"openai_api_key\" \
         form=\"research-form\" autocomplete=\"off\"></label>\n",
    );
    html.push_str("<div class=\"info\">This AI-powered tool helps businesses:<ul>");
    for item in SIDEBAR_INFO {
        let _ = write!(html, "<li>{item}</li>");
    }
    html.push_str("</ul>Powered by graph-flow agents and OpenAI</div>\n");
    html.push_str(
        "<form method=\"post\" action=\"/session/end\"><button type=\"submit\">End session</button></form>\n</aside>\n",
    );

    let _ = write!(
        html,
        "<main>\n<h1>StratAI</h1>\n<h3>&#128640; AI Use Case Research Generator</h3>\n\
         <div class=\"columns\">\n\
         <label>Company Name<input type=\"text\" name=\"company\" form=\"research-form\" \
         placeholder=\"e.g., Tata\" value=\"{company}\"></label>\n\
         <label>Industry<input type=\"text\" name=\"industry\" form=\"research-form\" \
         placeholder=\"e.g., Automotive\" value=\"{industry}\"></label>\n</div>\n\
         <button type=\"submit\" form=\"research-form\">Generate AI Use Cases</button>\n"
    );

    if let Some(context) = context {
        for flash in &context.flashes {
            let class = match flash.kind {
                FlashKind::Warning => "warning",
                FlashKind::Error => "error",
            };
            let _ = writeln!(
                html,
                "<div class=\"flash {class}\">{}</div>",
                escape_html(&flash.message)
            );
        }
        if let Some(result) = &context.result {
            render_results(&mut html, result);
        }
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stratai_core::{AgentKind, PLACEHOLDER, TaskOutput};

    use super::*;
    use crate::state::Flash;

    fn context(result: Option<RunResult>) -> SessionContext {
        SessionContext {
            company: "Tata & Sons".into(),
            industry: "Automotive".into(),
            result: result.map(Arc::new),
            ..SessionContext::default()
        }
    }

    #[test]
    fn empty_page_has_form_and_sidebar() {
        let html = render_index(None);
        assert!(html.contains("<title>StratAI</title>"));
        assert!(html.contains("AI Use Case Research Generator"));
        assert!(html.contains("placeholder=\"e.g., Tata\""));
        assert!(html.contains("placeholder=\"e.g., Automotive\""));
        assert!(html.contains("API Configuration"));
        assert!(html.contains("Powered by graph-flow agents and OpenAI"));
        assert!(!html.contains("Research Findings"));
    }

    #[test]
    fn results_render_headings_and_escape_text() {
        let result = RunResult::from_outputs(vec![TaskOutput {
            task_id: "research".into(),
            agent: AgentKind::IndustryResearcher,
            agent_role: "Advanced Industry Analyst".into(),
            description: String::new(),
            raw: "### Overview\n\n#### <Risks>\n\nline one\nline two".into(),
        }]);
        let html = render_index(Some(&context(Some(result))));

        assert!(html.contains("<h3>Overview</h3>"));
        assert!(html.contains("<h4>&lt;Risks&gt;</h4>"));
        assert!(html.contains("<p>line one<br>line two</p>"));
        assert!(html.contains("value=\"Tata &amp; Sons\""));
        assert!(html.contains("Download Report as PDF"));
    }

    #[test]
    fn result_without_outputs_shows_info() {
        let html = render_index(Some(&context(Some(RunResult::Empty))));
        assert!(html.contains(NO_OUTPUT_INFO));
    }

    #[test]
    fn blank_outputs_show_the_same_placeholder_as_the_pdf() {
        let result = RunResult::from_outputs(vec![TaskOutput {
            task_id: "research".into(),
            agent: AgentKind::IndustryResearcher,
            agent_role: "Advanced Industry Analyst".into(),
            description: String::new(),
            raw: "  \n\n ".into(),
        }]);
        let html = render_index(Some(&context(Some(result))));
        assert!(html.contains(&format!("<p>{PLACEHOLDER}</p>")));
    }

    #[test]
    fn flashes_are_rendered() {
        let mut context = context(None);
        context.flashes.push(Flash::warning(MISSING_INPUT_WARNING));
        let html = render_index(Some(&context));
        assert!(html.contains("flash warning"));
        assert!(html.contains(MISSING_INPUT_WARNING));
    }
}
