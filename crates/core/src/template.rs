//! Themed HTML template for a single 1920x1080 slide.

use std::fmt::Write;

use crate::types::{SlideBody, SlideSpec};

/// Bumped whenever the markup or stylesheet changes; part of every frame fingerprint.
pub const TEMPLATE_VERSION: &str = "4";

pub const SLIDE_WIDTH: u32 = 1920;
pub const SLIDE_HEIGHT: u32 = 1080;

const STYLESHEET: &str = r#"
*, *::before, *::after { box-sizing: border-box; animation: none !important; transition: none !important; }
html, body { margin: 0; padding: 0; width: 1920px; height: 1080px; overflow: hidden; }
body { font-family: "Inter", "Helvetica Neue", Arial, sans-serif; -webkit-font-smoothing: antialiased; }
.slide { position: relative; width: 1920px; height: 1080px; padding: 120px 160px; background: var(--background-color); color: var(--text-color); display: flex; flex-direction: column; justify-content: center; }
.slide h1 { margin: 0 0 48px; color: var(--title-color); font-size: 88px; line-height: 1.1; font-weight: 800; }
.slide h2 { margin: 0; color: var(--primary-color); font-size: 48px; font-weight: 500; }
.slide ul { margin: 0; padding: 0; list-style: none; }
.slide li { position: relative; padding-left: 56px; margin-bottom: 28px; font-size: 48px; line-height: 1.3; }
.slide li::before { content: ""; position: absolute; left: 0; top: 22px; width: 20px; height: 20px; border-radius: 50%; background: var(--primary-color); }
.layout-title { align-items: flex-start; }
.layout-title h1 { font-size: 112px; }
.layout-question { align-items: center; text-align: center; }
.layout-question h1 { font-size: 104px; }
.layout-question li { padding-left: 0; }
.layout-question li::before { display: none; }
.framework-name { display: inline-block; margin-bottom: 32px; padding: 12px 32px; border-radius: 12px; background: var(--primary-color); color: var(--background-color); font-size: 40px; font-weight: 800; letter-spacing: 6px; }
.accent-bar { position: absolute; left: 0; top: 0; width: 24px; height: 1080px; background: var(--primary-color); }
.brand-logo { position: absolute; right: 80px; bottom: 64px; width: 96px; height: 96px; border-radius: 24px; background: var(--primary-color); }
"#;

/// Full HTML document for `spec`, parameterized by its palette.
pub fn render_html(spec: &SlideSpec) -> String {
    // Writing into a String cannot fail.
    let body = body_markup(&spec.body).unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"slidecast-template\" content=\"{version}\">\n\
         <style>:root {{ {vars} }}{css}</style>\n</head>\n<body>\n\
         <div class=\"slide layout-{layout}\">\
         <div class=\"accent-bar\"></div>{body}<div class=\"brand-logo\"></div></div>\n\
         </body>\n</html>\n",
        version = TEMPLATE_VERSION,
        vars = spec.palette.css_variables(),
        css = STYLESHEET,
        layout = spec.layout().name(),
    )
}

fn body_markup(body: &SlideBody) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    match body {
        SlideBody::Title {
            heading,
            subtitle,
            bullets,
        } => {
            write!(out, "<h1>{}</h1>", escape(heading))?;
            if let Some(sub) = subtitle {
                write!(out, "<h2>{}</h2>", escape(sub))?;
            }
            write_bullets(&mut out, bullets)?;
        }
        SlideBody::Content { heading, bullets } => {
            write!(out, "<h1>{}</h1>", escape(heading))?;
            write_bullets(&mut out, bullets)?;
        }
        SlideBody::Question { prompt, bullets } => {
            write!(out, "<h1>{}</h1>", escape(prompt))?;
            write_bullets(&mut out, bullets)?;
        }
        SlideBody::Framework { name, heading, bullets } => {
            write!(
                out,
                "<div class=\"framework-name\">{}</div><h1>{}</h1>",
                escape(name),
                escape(heading)
            )?;
            write_bullets(&mut out, bullets)?;
        }
    }
    Ok(out)
}

fn write_bullets(out: &mut String, bullets: &[String]) -> std::fmt::Result {
    if bullets.is_empty() {
        return Ok(());
    }
    out.push_str("<ul>");
    for bullet in bullets {
        write!(out, "<li>{}</li>", escape(bullet))?;
    }
    out.push_str("</ul>");
    Ok(())
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
