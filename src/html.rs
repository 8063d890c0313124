//! Markup of the browser grid.
//!
//! The rendered table is a template for the client script in `assets/grid.js`: the header links
//! call `sort(key)`, the filter inputs are bound to `filters[key]` and the body row is repeated for
//! every entry of `sortedData`. Cells are bound with `v-text` and labels sit in `v-pre` elements,
//! so no data ever reaches the vue template compiler. The script is started with the serialized
//! [`GridState`].

use handlebars::html_escape;
use tracing::debug;

use crate::domain::{GridConfig, GridError};
use crate::model::GridState;
use crate::route::{ActionKind, RouteResolver};

const GRID_SCRIPT: &str = include_str!("../assets/grid.js");

/// JSON that is safe to embed in a `<script>` element.
pub fn json_html_encode<T: serde::Serialize>(value: &T) -> Result<String, GridError> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            _ => out.push(c),
        }
    }
    Ok(out)
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Member access expression of `key` on `object`, e.g. `filters.name` or `filters["unit price"]`.
fn member(object: &str, key: &str) -> String {
    if is_identifier(key) {
        format!("{object}.{key}")
    } else {
        format!("{object}[{}]", js_string(key))
    }
}

fn js_string(s: &str) -> String {
    // serializing a str can not fail
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn attributes(attrs: &[(&str, &str)]) -> String {
    attrs
        .iter()
        .map(|(name, value)| format!(" {name}=\"{}\"", html_escape(value)))
        .collect()
}

pub struct GridWidget<'a> {
    config: &'a GridConfig,
    routes: &'a dyn RouteResolver,
}

impl<'a> GridWidget<'a> {
    pub fn new(config: &'a GridConfig, routes: &'a dyn RouteResolver) -> Self {
        Self { config, routes }
    }

    /// Table markup followed by the script block that brings it to life.
    pub fn render(&self, state: &GridState) -> Result<String, GridError> {
        let mut html = self.markup(state);
        html.push_str(&self.script(state)?);
        debug!("Rendered grid '{}' ({} bytes)", self.config.id, html.len());
        Ok(html)
    }

    pub fn markup(&self, state: &GridState) -> String {
        let cfg = self.config;
        let mut html = String::new();

        html.push_str(&format!(
            "<div{}>",
            attributes(&[("id", cfg.id.as_str()), ("class", cfg.wrapper_class.as_str())])
        ));
        html.push_str(&format!("<table{}>", attributes(&[("class", cfg.table_class.as_str())])));

        html.push_str("<thead><tr>");
        for (attribute, label) in &state.labels {
            html.push_str("<th>");
            if cfg.filter_fields {
                html.push_str(&format!(
                    "<input{}>",
                    attributes(&[
                        ("type", "text"),
                        ("class", "form-control"),
                        ("name", format!("{attribute}_input").as_str()),
                        ("v-model", member("filters", attribute).as_str()),
                    ])
                ));
            }
            // Labels are not compiled by vue, `{{` in a label stays text
            html.push_str(&format!(
                "<a{}><span v-pre>{}</span></a>",
                attributes(&[
                    ("href", ""),
                    ("v-on:click.prevent", format!("sort({})", js_string(attribute)).as_str()),
                ]),
                html_escape(label)
            ));
            html.push_str("</th>");
        }
        if cfg.action_column {
            html.push_str("<th>Action</th>");
        }
        html.push_str("</tr></thead>");

        html.push_str("<tbody>");
        html.push_str(&format!(
            "<tr{}>",
            attributes(&[("v-for", "item in sortedData")])
        ));
        for attribute in state.labels.keys() {
            html.push_str(&format!(
                "<td{}></td>",
                attributes(&[("v-text", member("item.cells", attribute).as_str())])
            ));
        }
        if cfg.action_column {
            html.push_str(&format!("<td{}>", attributes(&[("class", "text-center")])));
            for (action, class) in [
                (ActionKind::View, &cfg.action_view_class),
                (ActionKind::Update, &cfg.action_update_class),
            ] {
                let click = format!(
                    "goToLink({} + encodeURIComponent(item.key))",
                    js_string(&self.routes.prefix(action))
                );
                html.push_str(&format!(
                    "<a{}></a>",
                    attributes(&[
                        ("href", ""),
                        ("v-if", "item.key !== null"),
                        ("v-on:click.prevent", click.as_str()),
                        ("class", class.as_str()),
                        ("title", action.name()),
                    ])
                ));
            }
            html.push_str("</td>");
        }
        html.push_str("</tr></tbody>");

        html.push_str("</table></div>");
        html
    }

    /// Vue script tag, the grid client and its bootstrap call.
    pub fn script(&self, state: &GridState) -> Result<String, GridError> {
        let cfg = self.config;
        let vue = if cfg.dev { "vue.js" } else { "vue.min.js" };
        let src = format!("{}/{}", cfg.vue_src.trim_end_matches('/'), vue);

        let mut script = format!("<script{}></script>", attributes(&[("src", src.as_str())]));
        script.push_str("<script>\n");
        script.push_str(GRID_SCRIPT);
        script.push_str(&format!(
            "var table = tvgrid({}, {});\n",
            js_string(&format!("#{}", cfg.id)),
            json_html_encode(state)?
        ));
        script.push_str("</script>");
        Ok(script)
    }

    /// Standalone HTML document around the grid.
    pub fn render_page(&self, title: &str, state: &GridState) -> Result<String, GridError> {
        let mut page = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        page.push_str(&format!("<title>{}</title>\n", html_escape(title)));
        page.push_str("</head>\n<body>\n");
        page.push_str(&self.render(state)?);
        page.push_str("\n</body>\n</html>\n");
        Ok(page)
    }
}
