//! Suite definitions and base-suite graph validation.

use super::error;
use std::collections::BTreeSet;

/// One suite of the repository: a release partitioned into sections and
/// architectures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub name: String,
    pub sections: Vec<String>,
    pub architectures: Vec<String>,
    /// Parent suite whose main section is consulted for icon resolution.
    pub base_suite: Option<String>,
    /// Higher priority overrides lower on the client side.
    pub data_priority: i32,
    /// Preferred icon theme, tried after hicolor.
    pub icon_theme: Option<String>,
    /// Frozen snapshot; existing outputs must not be rewritten.
    pub immutable: bool,
}

/// Verify that base-suite references resolve and form no cycle.
pub(crate) fn validate_base_dag(suites: &[Suite]) -> Result<(), error::Error> {
    for suite in suites {
        let mut seen = BTreeSet::new();
        seen.insert(suite.name.as_str());
        let mut current = suite;
        while let Some(base) = &current.base_suite {
            let next = suites.iter().find(|s| &s.name == base).ok_or_else(|| {
                error::UnknownBaseSuiteSnafu {
                    suite: current.name.clone(),
                    base: base.clone(),
                }
                .build()
            })?;
            if !seen.insert(next.name.as_str()) {
                return error::BaseSuiteCycleSnafu {
                    suite: suite.name.clone(),
                }
                .fail();
            }
            current = next;
        }
    }
    Ok(())
}
