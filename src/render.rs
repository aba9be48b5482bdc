//! HTML renderer for controller [`Page`]s.
//!
//! Produces a single self-contained document: a sidebar with the page
//! selector and the page body. Every form carries the current navigation
//! state in a hidden `page` field, so the session state lives entirely on
//! the client and nothing about navigation is stored server-side.

use std::fmt::Write;

use crate::controller::{
    BannerKind, ChatView, HistoryView, NavigationState, Page, PageBody, SampleDataView,
};
use crate::models::Feedback;

const TITLE: &str = "qa-chat";

/// Escapes text for safe interpolation into HTML content and attributes.
pub fn escape_html(text: &str) -> String {
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

pub fn render_page(page: &Page) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{} · {}</title>\n</head>\n<body>\n",
        TITLE,
        page.nav.label()
    );

    render_sidebar(&mut html, page.nav);

    html.push_str("<main>\n");
    let _ = writeln!(html, "<h1>{}</h1>", page.nav.label());
    for banner in &page.banners {
        let class = match banner.kind {
            BannerKind::Info => "info",
            BannerKind::Success => "success",
            BannerKind::Error => "error",
        };
        let _ = writeln!(
            html,
            "<div class=\"banner {}\" role=\"status\">{}</div>",
            class,
            escape_html(&banner.message)
        );
    }

    match &page.body {
        PageBody::Chat(view) => render_chat(&mut html, view),
        PageBody::History(view) => render_history(&mut html, view),
        PageBody::SampleData(view) => render_samples(&mut html, view),
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn render_sidebar(html: &mut String, nav: NavigationState) {
    html.push_str("<nav>\n<form method=\"get\" action=\"/\">\n<fieldset>\n<legend>Navigation</legend>\n");
    for option in NavigationState::ALL {
        let checked = if option == nav { " checked" } else { "" };
        let _ = writeln!(
            html,
            "<label><input type=\"radio\" name=\"page\" value=\"{}\"{}> {}</label><br>",
            option.as_str(),
            checked,
            option.label()
        );
    }
    html.push_str("<button type=\"submit\">Go</button>\n</fieldset>\n</form>\n</nav>\n");
}

fn hidden_page(html: &mut String, nav: NavigationState) {
    let _ = writeln!(
        html,
        "<input type=\"hidden\" name=\"page\" value=\"{}\">",
        nav.as_str()
    );
}

fn render_chat(html: &mut String, view: &ChatView) {
    if !view.model_available {
        html.push_str("<p>Chat is not available right now.</p>\n");
        return;
    }

    let _ = writeln!(html, "<p>Model: <code>{}</code></p>", escape_html(&view.model_name));
    html.push_str("<form method=\"post\" action=\"/chat/ask\">\n");
    hidden_page(html, NavigationState::Chat);
    html.push_str(
        "<label for=\"question\">Question</label><br>\n\
         <textarea id=\"question\" name=\"question\" rows=\"4\" cols=\"60\"></textarea><br>\n\
         <button type=\"submit\">Send</button>\n</form>\n",
    );

    if let Some(turn) = &view.answered {
        let _ = writeln!(
            html,
            "<section class=\"answer\">\n<h2>Answer (turn #{})</h2>\n<p class=\"question\">{}</p>\n<p>{}</p>",
            turn.id,
            escape_html(&turn.question),
            escape_html(&turn.answer)
        );
        html.push_str("<form method=\"post\" action=\"/history/feedback\">\n");
        hidden_page(html, NavigationState::Chat);
        let _ = writeln!(html, "<input type=\"hidden\" name=\"id\" value=\"{}\">", turn.id);
        html.push_str(
            "<button name=\"value\" value=\"positive\">👍</button>\n\
             <button name=\"value\" value=\"negative\">👎</button>\n</form>\n</section>\n",
        );
    }
}

fn render_history(html: &mut String, view: &HistoryView) {
    let counts = &view.counts;
    let rate = counts
        .positive_rate()
        .map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    let _ = writeln!(
        html,
        "<p class=\"summary\">{} turns · {} positive · {} negative · {} unrated · positive rate {}</p>",
        counts.total(),
        counts.positive,
        counts.negative,
        counts.none,
        rate
    );

    if view.entries.is_empty() {
        html.push_str("<p>No conversation history yet.</p>\n");
        return;
    }
    if !view.metrics_enabled {
        html.push_str("<p>Scores are unavailable.</p>\n");
    }

    for entry in &view.entries {
        let turn = &entry.turn;
        let _ = writeln!(
            html,
            "<article id=\"turn-{}\">\n<h3>#{} · {}</h3>\n<p><strong>Q:</strong> {}</p>\n<p><strong>A:</strong> {}</p>",
            turn.id,
            turn.id,
            format_ts(turn.created_at),
            escape_html(&turn.question),
            escape_html(&turn.answer)
        );

        if let Some(scores) = &entry.scores {
            let _ = write!(
                html,
                "<p class=\"scores\">words {} · relevance {:.2}",
                scores.word_count, scores.relevance
            );
            if let Some(bleu) = scores.bleu {
                let _ = write!(html, " · BLEU {:.2}", bleu);
            }
            if let Some(similarity) = scores.similarity {
                let _ = write!(html, " · similarity {:.2}", similarity);
            }
            html.push_str("</p>\n");
        }

        html.push_str("<form method=\"post\" action=\"/history/feedback\">\n");
        hidden_page(html, NavigationState::History);
        let _ = writeln!(html, "<input type=\"hidden\" name=\"id\" value=\"{}\">", turn.id);
        html.push_str("Feedback:\n");
        for value in Feedback::ALL {
            let marker = if value == turn.feedback { " aria-pressed=\"true\"" } else { "" };
            let _ = writeln!(
                html,
                "<button name=\"value\" value=\"{}\"{}>{}</button>",
                value.as_str(),
                marker,
                value.as_str()
            );
        }
        html.push_str("</form>\n</article>\n");
    }
}

fn render_samples(html: &mut String, view: &SampleDataView) {
    html.push_str("<h2>Add sample</h2>\n<form method=\"post\" action=\"/samples/create\">\n");
    hidden_page(html, NavigationState::SampleData);
    html.push_str(
        "<input name=\"question\" placeholder=\"Question\">\n\
         <input name=\"answer\" placeholder=\"Answer\">\n\
         <button type=\"submit\">Add</button>\n</form>\n",
    );

    let _ = writeln!(html, "<h2>Samples ({})</h2>", view.samples.len());
    if view.samples.is_empty() {
        html.push_str("<p>No sample data.</p>\n");
        return;
    }

    for sample in &view.samples {
        let _ = writeln!(html, "<div class=\"sample\" id=\"sample-{}\">", sample.id);
        html.push_str("<form method=\"post\" action=\"/samples/update\">\n");
        hidden_page(html, NavigationState::SampleData);
        let _ = writeln!(
            html,
            "<input type=\"hidden\" name=\"id\" value=\"{}\">\n\
             #{} <input name=\"question\" value=\"{}\">\n\
             <input name=\"answer\" value=\"{}\">\n\
             <button type=\"submit\">Save</button>\n</form>",
            sample.id,
            sample.id,
            escape_html(&sample.question),
            escape_html(&sample.answer)
        );
        html.push_str("<form method=\"post\" action=\"/samples/delete\">\n");
        hidden_page(html, NavigationState::SampleData);
        let _ = writeln!(
            html,
            "<input type=\"hidden\" name=\"id\" value=\"{}\">\n\
             <button type=\"submit\">Delete</button>\n</form>\n</div>",
            sample.id
        );
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
