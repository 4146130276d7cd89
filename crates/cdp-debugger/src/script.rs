//! Script registry.
//!
//! Holds every script the runtime has parsed plus one synthesized entry per
//! original source named by a resolved source map. Lookups accept both
//! `file://` URLs and bare paths.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::source_map::PositionMapper;

/// URL prefixes of runtime-internal scripts that are never registered.
const IGNORED_PREFIXES: &[&str] = &["extensions::", "chrome-extension://"];

/// Whether a parsed script should be skipped.
pub fn is_ignored(url: &str) -> bool {
    url.is_empty() || IGNORED_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Key used to compare script URLs: `file:///a/b.js` and `/a/b.js` match.
pub fn url_key(url: &str) -> &str {
    url.strip_prefix("file://").unwrap_or(url)
}

/// A zero-based position in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub url: String,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

/// How a script relates to a source map.
#[derive(Debug, Clone)]
pub enum ScriptMapping {
    /// A runtime script with a resolved map.
    Generated(Arc<PositionMapper>),
    /// A source named by the map of `generated_url`.
    Original {
        mapper: Arc<PositionMapper>,
        /// The source's name inside the map.
        source: String,
        generated_url: String,
    },
}

/// A generated or original script.
#[derive(Debug, Clone)]
pub struct Script {
    /// `None` for synthesized originals.
    pub script_id: Option<String>,
    pub url: String,
    pub source_map_url: Option<String>,
    pub mapping: Option<ScriptMapping>,
}

impl Script {
    /// A script reported by `Debugger.scriptParsed`.
    pub fn generated(
        script_id: impl Into<String>,
        url: impl Into<String>,
        source_map_url: Option<String>,
    ) -> Self {
        Self {
            script_id: Some(script_id.into()),
            url: url.into(),
            source_map_url,
            mapping: None,
        }
    }

    /// Attach a resolved map to a generated script.
    pub fn with_mapper(mut self, mapper: Arc<PositionMapper>) -> Self {
        self.mapping = Some(ScriptMapping::Generated(mapper));
        self
    }

    /// Whether this entry was synthesized from a source map.
    pub fn is_original(&self) -> bool {
        matches!(self.mapping, Some(ScriptMapping::Original { .. }))
    }

    /// One original script per source of this script's map.
    pub fn originals(&self) -> Vec<Script> {
        let Some(ScriptMapping::Generated(mapper)) = &self.mapping else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        mapper
            .sources()
            .iter()
            .filter(|source| {
                let fresh = !seen.contains(source);
                seen.push(*source);
                fresh
            })
            .map(|source| Script {
                script_id: None,
                url: original_url(&self.url, source),
                source_map_url: None,
                mapping: Some(ScriptMapping::Original {
                    mapper: mapper.clone(),
                    source: source.clone(),
                    generated_url: self.url.clone(),
                }),
            })
            .collect()
    }

    /// Translate a position in this script to where the runtime sees it.
    ///
    /// Generated scripts and scripts without a map pass through unchanged.
    /// Returns `None` when an original line has no generated counterpart.
    pub fn generated_position(&self, line_number: u32) -> Option<Position> {
        match &self.mapping {
            Some(ScriptMapping::Original {
                mapper,
                source,
                generated_url,
            }) => {
                let generated = mapper.to_generated(source, line_number + 1, 0)?;
                Some(Position {
                    url: generated_url.clone(),
                    line_number: generated.line - 1,
                    column_number: Some(generated.column),
                })
            }
            _ => Some(Position {
                url: self.url.clone(),
                line_number,
                column_number: None,
            }),
        }
    }

    /// Translate a runtime position in this script to original coordinates.
    ///
    /// Scripts without a map pass through unchanged. Returns `None` when the
    /// map has no original position for it.
    pub fn original_position(&self, line_number: u32, column_number: u32) -> Option<Position> {
        match &self.mapping {
            Some(ScriptMapping::Generated(mapper)) => {
                let original = mapper.to_original(line_number + 1, column_number)?;
                Some(Position {
                    url: original_url(&self.url, &original.source),
                    line_number: original.line - 1,
                    column_number: Some(original.column),
                })
            }
            _ => Some(Position {
                url: self.url.clone(),
                line_number,
                column_number: Some(column_number),
            }),
        }
    }

    /// Fold a later registration into this one; later non-null fields win.
    fn merge(&mut self, later: Script) {
        if later.script_id.is_some() {
            self.script_id = later.script_id;
        }
        if later.source_map_url.is_some() {
            self.source_map_url = later.source_map_url;
        }
        if later.mapping.is_some() {
            self.mapping = later.mapping;
        }
    }
}

/// URL of an original source: `source` joined to the directory of the
/// generated script, with `.` and `..` segments collapsed.
pub fn original_url(generated_url: &str, source: &str) -> String {
    if source.starts_with('/') || source.contains("://") {
        return source.to_string();
    }

    let (prefix, path) = match generated_url.find("://") {
        Some(i) => {
            let after_scheme = i + 3;
            // Keep `scheme://authority` intact.
            let path_start = generated_url[after_scheme..]
                .find('/')
                .map_or(generated_url.len(), |p| after_scheme + p);
            generated_url.split_at(path_start)
        }
        None => ("", generated_url),
    };

    let dir = path.rfind('/').map_or("", |i| &path[..i]);
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(source.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().map_or(false, |s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("{}/{}", prefix, joined)
    } else {
        format!("{}{}", prefix, joined)
    }
}

/// All known scripts, indexed by URL and by runtime id.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    by_url: HashMap<String, Script>,
    ids: HashMap<String, String>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a script, merging into an existing entry with the same URL.
    /// Returns the stored entry.
    pub fn register(&mut self, script: Script) -> &Script {
        let key = url_key(&script.url).to_string();
        if let Some(id) = &script.script_id {
            self.ids.insert(id.clone(), key.clone());
        }
        match self.by_url.entry(key) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.merge(script);
                existing
            }
            std::collections::hash_map::Entry::Vacant(entry) => entry.insert(script),
        }
    }

    pub fn by_url(&self, url: &str) -> Option<&Script> {
        self.by_url.get(url_key(url))
    }

    pub fn by_id(&self, script_id: &str) -> Option<&Script> {
        self.ids.get(script_id).and_then(|key| self.by_url.get(key))
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Script> {
        self.by_url.values()
    }

    pub fn clear(&mut self) {
        self.by_url.clear();
        self.ids.clear();
    }
}
