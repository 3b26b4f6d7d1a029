//! Language-coverage statistics.
//!
//! Components declaring a translation domain get a `<languages>` block
//! derived from the locale-file projection of the whole package set.
//! With only file paths available, coverage is relative: the locale with
//! the most catalogs for the domain counts as 100 percent.

use asgen_model::component::Component;
use asgen_model::GeneratorResult;
use std::collections::BTreeMap;

/// Fill `cpt.languages` from the locale projection (`path → pkid` over
/// the current package set). Emits an info hint when a declared domain
/// has no translations at all.
pub fn process_locale(
    cpt: &mut Component,
    res: &mut GeneratorResult,
    locale_paths: &BTreeMap<String, String>,
) {
    let domains = translation_domains(cpt);
    if domains.is_empty() {
        return;
    }

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for path in locale_paths.keys() {
        let Some((lang, stem)) = parse_locale_path(path) else {
            continue;
        };
        if domains.iter().any(|d| d == stem) {
            *counts.entry(lang.to_string()).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        res.add_hint(
            Some(&cpt.id.clone()),
            "no-translation-statistics",
            &[("domain", domains.join(", ").as_str())],
        );
        return;
    }

    let max = counts.values().copied().max().unwrap_or(1).max(1);
    for (lang, count) in counts {
        let pct = ((count * 100) / max).min(100) as u8;
        cpt.languages.insert(lang, pct);
    }
}

/// The gettext domains to look for: declared translations first, the
/// component id stem as fallback.
fn translation_domains(cpt: &Component) -> Vec<String> {
    let declared: Vec<String> = cpt
        .translations
        .iter()
        .map(|(_, domain)| domain.clone())
        .collect();
    if !declared.is_empty() {
        return declared;
    }
    let stem = cpt.id.strip_suffix(".desktop").unwrap_or(&cpt.id);
    let mut fallback = vec![stem.to_string()];
    if let Some(last) = stem.rsplit('.').next() {
        if last != stem {
            fallback.push(last.to_string());
        }
    }
    fallback
}

/// Split `/usr/share/locale/<lang>/LC_MESSAGES/<domain>.mo` into the
/// locale and the domain stem. Handles `locale-langpack` layouts too.
fn parse_locale_path(path: &str) -> Option<(&str, &str)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let locale_idx = segments
        .iter()
        .position(|s| s.starts_with("locale"))?;
    let lang = segments.get(locale_idx + 1)?;
    let file = segments.last()?;
    let stem = file
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file);
    Some((lang, stem))
}
