//! Development-only page listing every procedure with a small runner.

use axum::response::Html;

use crate::api::procedures::{ProcedureDef, ProcedureKind, PROCEDURES};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
section{border:1px solid #ddd;border-radius:6px;padding:1rem;margin-bottom:1rem}\
.kind{font-size:.75rem;padding:.1rem .4rem;border-radius:4px;color:#fff}\
.query{background:#2b7a4b}.mutation{background:#8a4b16}\
textarea{width:100%;font-family:monospace}pre{background:#f6f6f6;padding:.5rem;overflow:auto}";

const SCRIPT: &str = r#"async function run(path, kind) {
  const input = document.getElementById('input-' + path).value.trim();
  const out = document.getElementById('out-' + path);
  let res;
  if (kind === 'query') {
    const qs = input ? '?input=' + encodeURIComponent(input) : '';
    res = await fetch('/trpc/' + path + qs);
  } else {
    res = await fetch('/trpc/' + path, {
      method: 'POST',
      headers: { 'content-type': 'application/json' },
      body: input,
    });
  }
  out.textContent = res.status + '\n' + JSON.stringify(await res.json(), null, 2);
}"#;

fn example_input(procedure: &ProcedureDef) -> String {
    if procedure.input.is_empty() {
        return String::new();
    }
    let fields: Vec<String> = procedure
        .input
        .iter()
        .filter(|field| !field.optional)
        .map(|field| format!("\"{}\": \"\"", field.name))
        .collect();
    format!("{{{}}}", fields.join(", "))
}

fn render_procedure(procedure: &ProcedureDef) -> String {
    let fields = if procedure.input.is_empty() {
        "<p><em>No input</em></p>".to_string()
    } else {
        let rows: String = procedure
            .input
            .iter()
            .map(|field| {
                format!(
                    "<tr><td><code>{}</code></td><td>{}</td><td>{}</td></tr>",
                    field.name,
                    field.ty,
                    if field.optional { "optional" } else { "required" }
                )
            })
            .collect();
        format!("<table><tr><th>Field</th><th>Type</th><th></th></tr>{rows}</table>")
    };

    let kind = procedure.kind.as_str();
    format!(
        "<section id=\"{path}\">\
<h2><code>{path}</code> <span class=\"kind {kind}\">{kind}</span></h2>\
<p>{description}</p>\
<p><code>{method} /trpc/{path}</code></p>\
{fields}\
<textarea id=\"input-{path}\" rows=\"3\">{example}</textarea>\
<button onclick=\"run('{path}', '{kind}')\">Run</button>\
<pre id=\"out-{path}\"></pre>\
</section>",
        path = procedure.path,
        kind = kind,
        description = procedure.description,
        method = procedure.kind.http_method(),
        fields = fields,
        example = example_input(procedure),
    )
}

pub fn render(procedures: &[ProcedureDef]) -> String {
    let queries = procedures
        .iter()
        .filter(|p| p.kind == ProcedureKind::Query)
        .count();
    let body: String = procedures.iter().map(render_procedure).collect();
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Procedures</title>\
<style>{STYLE}</style></head><body>\
<h1>Procedures</h1><p>{} queries, {} mutations, mounted at <code>/trpc</code>.</p>\
{body}<script>{SCRIPT}</script></body></html>",
        queries,
        procedures.len() - queries,
    )
}

pub async fn panel() -> Html<String> {
    Html(render(PROCEDURES))
}
