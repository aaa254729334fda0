//! Import resolution policy.
//!
//! Decides, for every import the engine encounters, whether to inline it or
//! leave it external for the host loader. Explicit user intent (the external
//! and not-external lists, plus tsconfig path aliases) always wins over the
//! default node-modules heuristic; relative and absolute imports are only
//! externalized when explicitly listed.

use crate::engine::{BuildHook, HookResult, ResolveArgs, ResolvedImport};
use crate::paths;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

/// A specifier matcher: a literal (exact, or prefix at a `/` boundary) or a
/// regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    #[must_use]
    pub fn matches(&self, specifier: &str) -> bool {
        match self {
            Self::Literal(lit) => {
                specifier == lit
                    || specifier
                        .strip_prefix(lit.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Regex(re) => re.is_match(specifier),
        }
    }
}

impl From<&str> for Pattern {
    fn from(lit: &str) -> Self {
        Self::Literal(lit.to_string())
    }
}

impl From<String> for Pattern {
    fn from(lit: String) -> Self {
        Self::Literal(lit)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

fn matches_any(specifier: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(specifier))
}

/// Decision for one encountered import. Stateless per call: the same
/// specifier may resolve differently from different importers, so nothing is
/// memoized across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionDecision {
    /// Let the engine resolve and inline it normally.
    Inline,
    /// Leave the specifier string untouched; the host loader resolves it.
    ExternalAsIs,
    /// Rewrite to a loader-addressable absolute form (a file URL), then mark
    /// external. Used for node-modules packages reached through a relative
    /// path, so the host loader can still find them from anywhere.
    ExternalResolved(String),
}

/// The resolve hook implementing the external/inline policy.
pub struct ExternalPolicy {
    external: Vec<Pattern>,
    not_external: Vec<Pattern>,
    external_node_modules: bool,
}

impl ExternalPolicy {
    #[must_use]
    pub fn new(
        external: Vec<Pattern>,
        not_external: Vec<Pattern>,
        external_node_modules: bool,
    ) -> Self {
        Self {
            external,
            not_external,
            external_node_modules,
        }
    }

    /// Decide one import, in priority order: explicit external list, explicit
    /// not-external list (which deliberately overrides the node-modules
    /// default), the node-modules heuristic, then relative/absolute
    /// fall-through, and finally bare specifiers as external.
    #[must_use]
    pub fn decide(&self, specifier: &str, resolve_dir: &Path) -> ResolutionDecision {
        if matches_any(specifier, &self.external) {
            return ResolutionDecision::ExternalAsIs;
        }

        if matches_any(specifier, &self.not_external) {
            // Resolved by the engine like any local module.
            return ResolutionDecision::Inline;
        }

        if self.external_node_modules && paths::in_node_modules(specifier) {
            let resolved = if specifier.starts_with('.') {
                paths::normalize(&resolve_dir.join(specifier))
            } else {
                PathBuf::from(specifier)
            };
            if let Some(url) = paths::file_url(&resolved) {
                return ResolutionDecision::ExternalResolved(url.into());
            }
            // Not expressible as an absolute path; leave the specifier for
            // the host loader.
            return ResolutionDecision::ExternalAsIs;
        }

        if paths::is_path_like(specifier) {
            return ResolutionDecision::Inline;
        }

        // Bare specifier with no other rule matched: a platform or installed
        // package the host loader already knows how to resolve.
        ResolutionDecision::ExternalAsIs
    }
}

impl BuildHook for ExternalPolicy {
    fn name(&self) -> &str {
        "confit:external"
    }

    fn resolve(&self, args: &ResolveArgs<'_>) -> HookResult<Option<ResolvedImport>> {
        let decision = self.decide(args.specifier, args.resolve_dir);
        tracing::trace!(specifier = args.specifier, ?decision, "import decided");
        Ok(match decision {
            ResolutionDecision::Inline => None,
            ResolutionDecision::ExternalAsIs => Some(ResolvedImport::external(args.specifier)),
            ResolutionDecision::ExternalResolved(url) => Some(ResolvedImport::external(url)),
        })
    }
}
