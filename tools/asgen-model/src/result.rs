//! Per-package processing result.
//!
//! A `GeneratorResult` collects everything one package contributed during
//! a run: components keyed by component-id, their GCIDs once serialized,
//! hints, and the set of component-ids that must not appear in output.
//! Recording an error-severity hint against a component moves it to the
//! ignore set; the package itself never fails the run because of it.

use crate::component::Component;
use crate::hints::{self, Hint, HintSeverity};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Key used for hints that concern the package as a whole.
pub const GENERAL_HINT_KEY: &str = "general";

#[derive(Debug, Default)]
pub struct GeneratorResult {
    pub pkid: String,
    pub pkgname: String,
    components: BTreeMap<String, Component>,
    gcids: BTreeMap<String, String>,
    hints: BTreeMap<String, Vec<Hint>>,
    ignored: BTreeSet<String>,
}

impl GeneratorResult {
    pub fn new(pkid: &str, pkgname: &str) -> GeneratorResult {
        GeneratorResult {
            pkid: pkid.to_string(),
            pkgname: pkgname.to_string(),
            ..GeneratorResult::default()
        }
    }

    /// Add a component. The component's id keys it; later additions with
    /// the same id replace the earlier ones.
    pub fn add_component(&mut self, cpt: Component) {
        self.components.insert(cpt.id.clone(), cpt);
    }

    /// Record a hint. For unknown tags the hint is rewritten to
    /// `internal-unknown-tag`. Returns `false` when the hint was fatal
    /// and the component is now ignored.
    pub fn add_hint(&mut self, cid: Option<&str>, tag: &str, vars: &[(&str, &str)]) -> bool {
        let hint = if hints::tag_known(tag) {
            Hint::new(tag, vars)
        } else {
            Hint::new("internal-unknown-tag", &[("tag", tag)])
        };
        let severity = hint.severity();
        let key = cid.unwrap_or(GENERAL_HINT_KEY).to_string();
        self.hints.entry(key.clone()).or_default().push(hint);
        if severity.is_error() && key != GENERAL_HINT_KEY {
            self.ignored.insert(key);
            return false;
        }
        true
    }

    pub fn is_ignored(&self, cid: &str) -> bool {
        self.ignored.contains(cid)
    }

    /// Drop a component from output without recording an error, e.g. for
    /// launcher entries that opt out of catalogs.
    pub fn ignore_component(&mut self, cid: &str) {
        self.ignored.insert(cid.to_string());
    }

    /// Drain all components for an enrichment pass; hints and the ignore
    /// set stay behind. Re-add the survivors with `add_component`.
    pub fn take_components(&mut self) -> Vec<Component> {
        std::mem::take(&mut self.components).into_values().collect()
    }

    /// Components that survived processing, in id order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(|(cid, _)| !self.ignored.contains(*cid))
            .map(|(_, cpt)| cpt)
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        let ignored = &self.ignored;
        self.components
            .iter_mut()
            .filter(move |(cid, _)| !ignored.contains(*cid))
            .map(|(_, cpt)| cpt)
    }

    pub fn component_count(&self) -> usize {
        self.components
            .keys()
            .filter(|cid| !self.ignored.contains(*cid))
            .count()
    }

    pub fn set_gcid(&mut self, cid: &str, gcid: String) {
        self.gcids.insert(cid.to_string(), gcid);
    }

    pub fn gcid_for(&self, cid: &str) -> Option<&str> {
        self.gcids.get(cid).map(String::as_str)
    }

    /// GCIDs of surviving components, in id order. This is the value the
    /// data store keeps per pkid.
    pub fn gcids(&self) -> Vec<String> {
        self.gcids
            .iter()
            .filter(|(cid, _)| !self.ignored.contains(*cid))
            .map(|(_, gcid)| gcid.clone())
            .collect()
    }

    pub fn has_hints(&self) -> bool {
        !self.hints.is_empty()
    }

    pub fn hints_for(&self, cid: &str) -> &[Hint] {
        self.hints.get(cid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_hints(&self) -> impl Iterator<Item = (&str, &Hint)> {
        self.hints
            .iter()
            .flat_map(|(cid, list)| list.iter().map(move |h| (cid.as_str(), h)))
    }

    /// Hint counts per severity across the whole result.
    pub fn hint_stats(&self) -> BTreeMap<HintSeverity, usize> {
        let mut stats = BTreeMap::new();
        for (_, hint) in self.all_hints() {
            *stats.entry(hint.severity()).or_insert(0) += 1;
        }
        stats
    }

    /// The serialized hint document stored per GCID and exported into the
    /// hints tree.
    pub fn hints_document(&self) -> serde_json::Value {
        let mut per_cid = serde_json::Map::new();
        for (cid, hint_list) in &self.hints {
            let entries: Vec<serde_json::Value> = hint_list
                .iter()
                .map(|h| {
                    json!({
                        "tag": &h.tag,
                        "severity": h.severity().as_str(),
                        "vars": &h.vars,
                    })
                })
                .collect();
            per_cid.insert(cid.clone(), serde_json::Value::Array(entries));
        }
        json!({
            "package": &self.pkid,
            "hints": per_cid,
        })
    }

    /// Hints that belong to one component, serialized for the data store.
    pub fn component_hints_json(&self, cid: &str) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .hints_for(cid)
            .iter()
            .map(|h| {
                json!({
                    "tag": &h.tag,
                    "severity": h.severity().as_str(),
                    "vars": &h.vars,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::ComponentKind;

    fn component(cid: &str) -> Component {
        let mut cpt = Component::new(cid, ComponentKind::Generic);
        cpt.name.insert("C".to_string(), cid.to_string());
        cpt
    }

    #[test]
    fn fatal_hint_ignores_component() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_component(component("org.example.A"));
        result.add_component(component("org.example.B"));
        let ok = result.add_hint(
            Some("org.example.A"),
            "icon-not-found",
            &[("icon_name", "a")],
        );
        assert!(!ok);
        assert!(result.is_ignored("org.example.A"));
        let survivors: Vec<&str> = result.components().map(|c| c.id.as_str()).collect();
        assert_eq!(survivors, vec!["org.example.B"]);
    }

    #[test]
    fn warning_hint_keeps_component() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_component(component("org.example.A"));
        let ok = result.add_hint(
            Some("org.example.A"),
            "missing-desktop-file",
            &[("desktop_id", "a.desktop")],
        );
        assert!(ok);
        assert_eq!(result.component_count(), 1);
    }

    #[test]
    fn package_level_error_does_not_ignore_components() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_component(component("org.example.A"));
        let ok = result.add_hint(None, "pkg-extract-error", &[("msg", "boom")]);
        assert!(ok);
        assert_eq!(result.component_count(), 1);
    }

    #[test]
    fn unknown_tags_are_rewritten() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_hint(None, "definitely-not-registered", &[]);
        let hints: Vec<_> = result.all_hints().collect();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].1.tag, "internal-unknown-tag");
    }

    #[test]
    fn gcids_skip_ignored_components() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_component(component("org.example.A"));
        result.add_component(component("org.example.B"));
        result.set_gcid("org.example.A", "org.example.A/1.0/aaaa".to_string());
        result.set_gcid("org.example.B", "org.example.B/1.0/bbbb".to_string());
        result.add_hint(Some("org.example.A"), "icon-not-found", &[]);
        assert_eq!(result.gcids(), vec!["org.example.B/1.0/bbbb".to_string()]);
    }

    #[test]
    fn hints_document_shape() {
        let mut result = GeneratorResult::new("foo/1.0/amd64", "foo");
        result.add_hint(None, "pkg-extract-error", &[("msg", "truncated")]);
        let doc = result.hints_document();
        assert_eq!(doc["package"], "foo/1.0/amd64");
        assert_eq!(doc["hints"]["general"][0]["tag"], "pkg-extract-error");
    }
}
