//! Hint exports and HTML issue reports.
//!
//! The JSON export carries everything at severity info and above; the
//! HTML pages show warnings and errors only, and pedantic hints are
//! suppressed everywhere.

use crate::{error, Result, SuiteView};
use asgen_config::Config;
use asgen_model::hints::{self, HintSeverity};
use asgen_store::DataStore;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tinytemplate::TinyTemplate;

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>{project}: hints for {suite}/{section} [{arch}]</title>
<style>
body \{ font-family: sans-serif; margin: 2em; }
li.error \{ color: #a40000; }
li.warning \{ color: #8f5902; }
h2 \{ border-bottom: 1px solid #ccc; }
</style>
</head>
<body>
<h1>{project}: issue hints for {suite}/{section} [{arch}]</h1>
<p>{package_count} packages with hints.</p>
{{ for pkg in packages }}
<h2>{pkg.pkid}</h2>
{{ for unit in pkg.units }}
<h3>{unit.cid}</h3>
<ul>
{{ for hint in unit.hints }}
<li class="{hint.severity}"><b>{hint.tag}</b>: {hint.message}</li>
{{ endfor }}
</ul>
{{ endfor }}
{{ endfor }}
</body>
</html>
"#;

#[derive(Serialize)]
struct HintView {
    tag: String,
    severity: String,
    message: String,
}

#[derive(Serialize)]
struct UnitView {
    cid: String,
    hints: Vec<HintView>,
}

#[derive(Serialize)]
struct PackageView {
    pkid: String,
    units: Vec<UnitView>,
}

#[derive(Serialize)]
struct ReportContext {
    project: String,
    suite: String,
    section: String,
    arch: String,
    package_count: usize,
    packages: Vec<PackageView>,
}

/// Load the stored hint documents for a package set, skipping pedantic
/// entries, which never appear in output.
pub fn collect_hint_documents(
    dstore: &DataStore,
    pkids: &BTreeSet<String>,
) -> Result<Vec<serde_json::Value>> {
    let mut documents = Vec::new();
    for pkid in pkids {
        let Some(mut doc) = dstore.package_hints(pkid)? else {
            continue;
        };
        strip_severity(&mut doc, &["pedantic"]);
        if document_is_empty(&doc) {
            continue;
        }
        documents.push(doc);
    }
    Ok(documents)
}

/// Render the per-arch HTML report.
pub fn render_html_report(
    config: &Config,
    view: &SuiteView,
    hint_docs: &[serde_json::Value],
    html_dir: &Path,
) -> Result<()> {
    let mut packages = Vec::new();
    for doc in hint_docs {
        let pkid = doc["package"].as_str().unwrap_or("(unknown)").to_string();
        let mut units = Vec::new();
        if let Some(map) = doc["hints"].as_object() {
            for (cid, entries) in map {
                let mut hints_out = Vec::new();
                for entry in entries.as_array().into_iter().flatten() {
                    let severity = entry["severity"].as_str().unwrap_or("error");
                    // Info-level hints stay in the JSON export only.
                    if severity != "warning" && severity != "error" {
                        continue;
                    }
                    let tag = entry["tag"].as_str().unwrap_or("unknown").to_string();
                    let vars: BTreeMap<String, String> = entry["vars"]
                        .as_object()
                        .map(|m| {
                            m.iter()
                                .map(|(k, v)| {
                                    (k.clone(), v.as_str().unwrap_or_default().to_string())
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    hints_out.push(HintView {
                        message: render_hint_message(&tag, &vars),
                        severity: severity.to_string(),
                        tag,
                    });
                }
                if !hints_out.is_empty() {
                    units.push(UnitView {
                        cid: cid.clone(),
                        hints: hints_out,
                    });
                }
            }
        }
        if !units.is_empty() {
            packages.push(PackageView { pkid, units });
        }
    }

    let context = ReportContext {
        project: config.project_name.clone(),
        suite: view.suite.name.clone(),
        section: view.section.clone(),
        arch: view.arch.clone(),
        package_count: packages.len(),
        packages,
    };

    let mut tt = TinyTemplate::new();
    tt.add_template("report", REPORT_TEMPLATE)
        .context(error::TemplateSnafu)?;
    let html = tt.render("report", &context).context(error::TemplateSnafu)?;

    fs::create_dir_all(html_dir).context(error::WriteOutputSnafu { path: html_dir })?;
    let path = html_dir.join(format!("issues_{}.html", view.arch));
    fs::write(&path, html).context(error::WriteOutputSnafu { path })?;
    Ok(())
}

/// Substitute a hint's variables into its registry explanation.
pub fn render_hint_message(tag: &str, vars: &BTreeMap<String, String>) -> String {
    let Some(template) = hints::explanation_of(tag) else {
        return format!("({})", tag);
    };
    let mut tt = TinyTemplate::new();
    if tt.add_template("hint", &template).is_err() {
        return template;
    }
    tt.render("hint", vars).unwrap_or(template)
}

/// Hint counts per severity across all documents.
pub fn severity_counts(hint_docs: &[serde_json::Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for doc in hint_docs {
        if let Some(map) = doc["hints"].as_object() {
            for entries in map.values() {
                for entry in entries.as_array().into_iter().flatten() {
                    let severity = entry["severity"].as_str().unwrap_or("error").to_string();
                    *counts.entry(severity).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

fn strip_severity(doc: &mut serde_json::Value, suppressed: &[&str]) {
    if let Some(map) = doc["hints"].as_object_mut() {
        for entries in map.values_mut() {
            if let Some(list) = entries.as_array_mut() {
                list.retain(|entry| {
                    let severity = entry["severity"].as_str().unwrap_or("error");
                    !suppressed.contains(&severity)
                });
            }
        }
        map.retain(|_, entries| {
            entries
                .as_array()
                .map(|list| !list.is_empty())
                .unwrap_or(false)
        });
    }
}

fn document_is_empty(doc: &serde_json::Value) -> bool {
    doc["hints"]
        .as_object()
        .map(|m| m.is_empty())
        .unwrap_or(true)
}

/// Hints JSON document severity filter used by tests and callers that
/// need to know what the JSON export contains.
pub fn exported_severities() -> &'static [HintSeverity] {
    &[
        HintSeverity::Info,
        HintSeverity::Warning,
        HintSeverity::Error,
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn hint_messages_substitute_variables() {
        let mut vars = BTreeMap::new();
        vars.insert("icon_name".to_string(), "foo".to_string());
        let message = render_hint_message("icon-not-found", &vars);
        assert!(message.contains("'foo'"));
    }

    #[test]
    fn unknown_tags_render_as_placeholders() {
        let message = render_hint_message("never-registered-tag", &BTreeMap::new());
        assert_eq!(message, "(never-registered-tag)");
    }

    #[test]
    fn pedantic_hints_are_stripped() {
        let mut doc = json!({
            "package": "foo/1.0/amd64",
            "hints": {
                "org.example.Foo": [
                    {"tag": "description-missing", "severity": "pedantic", "vars": {}},
                    {"tag": "missing-desktop-file", "severity": "warning", "vars": {}}
                ],
                "org.example.Bar": [
                    {"tag": "description-missing", "severity": "pedantic", "vars": {}}
                ]
            }
        });
        strip_severity(&mut doc, &["pedantic"]);
        let map = doc["hints"].as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["org.example.Foo"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn severity_counting() {
        let docs = vec![json!({
            "package": "p",
            "hints": {"c": [
                {"tag": "a", "severity": "warning", "vars": {}},
                {"tag": "b", "severity": "warning", "vars": {}},
                {"tag": "c", "severity": "error", "vars": {}}
            ]}
        })];
        let counts = severity_counts(&docs);
        assert_eq!(counts.get("warning"), Some(&2));
        assert_eq!(counts.get("error"), Some(&1));
    }
}
