use uuid::Uuid;

use crate::session::SessionState;
use crate::validation::MAX_STYLE_LEN;

const STYLE: &str = r#"<style>
body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
.row { display: flex; gap: 1rem; flex-wrap: wrap; }
.row > * { flex: 1 1 calc(50% - 1rem); min-width: calc(50% - 1rem); }
.error { background: #fde8e8; color: #9b1c1c; padding: .75rem; border-radius: 4px; }
.primary { background: #ff4b4b; color: #fff; border: none; padding: .5rem 1rem; border-radius: 4px; }
.secondary { background: #fff; border: 1px solid #ccc; padding: .5rem 1rem; border-radius: 4px; }
textarea { width: 100%; height: 200px; }
img { max-width: 100%; }
</style>"#;

/// Everything the page needs besides the session state itself.
pub struct PageContext<'a> {
    pub session_id: Uuid,
    pub topics: &'a [String],
    pub styles: &'a [String],
}

pub fn render_page(ctx: &PageContext<'_>, state: &SessionState) -> String {
    let base = format!("/sessions/{}", ctx.session_id);
    let offered = state.offered_styles(ctx.styles);
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str("<title>LinkedIn Post</title>");
    html.push_str(STYLE);
    html.push_str("</head><body>");
    html.push_str("<h1>Generate LinkedIn Posts</h1>");
    html.push_str(
        "<p>This mini-app generates Snowflake related LinkedIn Posts using OpenAI's completion models \
         for texts and DALL\u{b7}E for images.</p>",
    );

    render_style_editor(&mut html, &base, state);

    html.push_str(&format!("<form method=\"post\" action=\"{}/text\">", base));
    html.push_str("<label>Select a Snowflake feature...<br>");
    push_select(&mut html, "topic", ctx.topics, &state.topic, None);
    html.push_str("</label><br><label>Select a style...<br>");
    push_select(&mut html, "style", offered, &state.style, Some("(no style)"));
    html.push_str("</label><br><br>");
    html.push_str("<button class=\"primary\" type=\"submit\">Generate text</button></form>");

    push_error(&mut html, "text-error", &state.text_error);

    if !state.post.is_empty() {
        html.push_str("<hr><label id=\"post\">Post<br><textarea readonly>");
        html.push_str(&escape(&state.post));
        html.push_str("</textarea></label><div class=\"row\">");

        html.push_str(&format!("<form method=\"post\" action=\"{}/text/regenerate\">", base));
        push_hidden(&mut html, "topic", &state.topic);
        push_hidden(&mut html, "style", &state.style);
        html.push_str("<button class=\"secondary\" type=\"submit\">Regenerate text</button></form>");

        html.push_str(&format!("<form method=\"post\" action=\"{}/image\">", base));
        if state.image.is_empty() {
            html.push_str("<button class=\"primary\" type=\"submit\">Generate image</button>");
        } else {
            html.push_str("<button class=\"secondary\" type=\"submit\">Regenerate image</button>");
        }
        html.push_str("</form></div>");

        if !state.image.is_empty() {
            html.push_str(&format!("<img id=\"image\" src=\"{}\" alt=\"Generated image\">", escape(&state.image)));
        }
        push_error(&mut html, "image-error", &state.image_error);
        html.push_str("<hr>");
    }

    html.push_str("</body></html>");
    html
}

fn render_style_editor(html: &mut String, base: &str, state: &SessionState) {
    let open = if state.edited_styles.is_some() { " open" } else { "" };
    html.push_str(&format!("<details id=\"styles\"{}><summary>Add your own styles here:</summary>", open));
    if let Some(styles) = &state.edited_styles {
        html.push_str("<h3>Available styles</h3><ul>");
        for style in styles {
            html.push_str(&format!(
                "<li>{} <form style=\"display:inline\" method=\"post\" action=\"{}/styles/remove\">",
                escape(style),
                base
            ));
            push_hidden(html, "style", style);
            html.push_str("<button type=\"submit\">Remove</button></form></li>");
        }
        html.push_str("</ul>");
    }
    html.push_str(&format!(
        "<form method=\"post\" action=\"{}/styles\"><input name=\"style\" maxlength=\"{}\" required> \
         <button type=\"submit\">Add style</button></form>",
        base, MAX_STYLE_LEN
    ));
    html.push_str(&format!(
        "<form method=\"post\" action=\"{}/styles/reset\"><button type=\"submit\">Reset styles</button></form>",
        base
    ));
    html.push_str("</details>");
}

fn push_select(html: &mut String, name: &str, options: &[String], selected: &str, blank: Option<&str>) {
    html.push_str(&format!("<select name=\"{}\">", name));
    if let Some(label) = blank {
        let marker = if selected.is_empty() { " selected" } else { "" };
        html.push_str(&format!("<option value=\"\"{}>{}</option>", marker, label));
    }
    for option in options {
        let value = escape(option);
        let marker = if option == selected { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{}\"{}>{}</option>", value, marker, value));
    }
    html.push_str("</select>");
}

fn push_hidden(html: &mut String, name: &str, value: &str) {
    html.push_str(&format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        name,
        escape(value)
    ));
}

fn push_error(html: &mut String, id: &str, message: &str) {
    if !message.is_empty() {
        html.push_str(&format!(
            "<div id=\"{}\" class=\"error\" role=\"alert\">{}</div>",
            id,
            escape(message)
        ));
    }
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
            _ => out.push(c),
        }
    }
    out
}
