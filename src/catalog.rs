use crate::fingerprint::{fingerprint_row, value_text};
use crate::hook::Keyset;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Declares one primary hook an entity exposes: the key domain it belongs
/// to and the payload column its value is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookDef {
    pub name: String,
    pub keyset: Keyset,
    pub column: String,
    #[serde(default)]
    pub primary: bool,
}

/// Declares a relationship hook as an explicit, fixed ordering of member
/// hook names. The order is part of the relationship's identity: the same
/// relationship yields the same string no matter which side composes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeHookDef {
    pub name: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub primary: bool,
}

/// Immutable per-entity configuration: key extraction rule, hashed
/// attribute list, and hook declarations. Loaded once at start; the engine
/// is a generic function over these records, with no runtime reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDef {
    pub name: String,
    /// Source columns composing `unique_key`, joined with `|`.
    pub key_columns: Vec<String>,
    /// Ordered columns feeding the content fingerprint.
    pub attribute_columns: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<HookDef>,
    #[serde(default)]
    pub composite_hooks: Vec<CompositeHookDef>,
}

impl FrameDef {
    /// Extracts the unique key from a payload row, or `None` when any key
    /// component is absent (such rows never enter the raw stream).
    pub fn unique_key(&self, payload: &Map<String, Value>) -> Option<String> {
        let mut parts = Vec::with_capacity(self.key_columns.len());
        for column in &self.key_columns {
            parts.push(payload.get(column).and_then(value_text)?);
        }
        Some(parts.join("|"))
    }

    /// Fingerprints a payload row over the configured attribute list.
    pub fn content_fingerprint(&self, payload: &Map<String, Value>) -> String {
        fingerprint_row(&self.attribute_columns, payload)
    }

    /// The hook whose PIT variant identifies this frame's records. A primary
    /// composite hook takes precedence over a primary plain hook.
    pub fn primary_hook(&self) -> Option<&str> {
        self.composite_hooks
            .iter()
            .find(|hook| hook.primary)
            .map(|hook| hook.name.as_str())
            .or_else(|| {
                self.hooks
                    .iter()
                    .find(|hook| hook.primary)
                    .map(|hook| hook.name.as_str())
            })
    }
}

/// One step of a bridge's join chain: the shared hook to match on and the
/// frame whose records join through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeJoin {
    pub on: String,
    pub frame: String,
}

/// Declares one bridge: a seed frame chained to further frames through
/// shared hooks, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeDef {
    pub name: String,
    pub seed: String,
    pub joins: Vec<BridgeJoin>,
}

/// Errors rejecting a catalog at admission time.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unparseable catalog document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate frame '{0}'")]
    DuplicateFrame(String),
    #[error("frame '{frame}' declares duplicate hook '{hook}'")]
    DuplicateHook { frame: String, hook: String },
    #[error("frame '{frame}' declares invalid keyset for hook '{hook}': {reason}")]
    InvalidKeyset {
        frame: String,
        hook: String,
        reason: String,
    },
    #[error("frame '{frame}' has no primary hook")]
    MissingPrimaryHook { frame: String },
    #[error("frame '{frame}' composite '{composite}' references unknown member '{member}'")]
    UnknownCompositeMember {
        frame: String,
        composite: String,
        member: String,
    },
    #[error("frame '{frame}' composite '{composite}' needs at least two members")]
    ShortComposite { frame: String, composite: String },
    #[error("frame '{0}' declares no key columns")]
    EmptyKeyColumns(String),
    #[error("frame '{0}' declares no attribute columns")]
    EmptyAttributes(String),
    #[error("duplicate bridge '{0}'")]
    DuplicateBridge(String),
    #[error("bridge '{0}' declares no joins")]
    EmptyBridge(String),
    #[error("bridge '{bridge}' references unknown frame '{frame}'")]
    UnknownBridgeFrame { bridge: String, frame: String },
    #[error("bridge '{bridge}' joins frame '{frame}' on undeclared hook '{hook}'")]
    UnknownBridgeHook {
        bridge: String,
        frame: String,
        hook: String,
    },
}

/// An admitted catalog plus non-fatal findings, sorted for determinism.
#[derive(Debug)]
pub struct CatalogAdmission {
    pub catalog: Catalog,
    pub warnings: Vec<String>,
}

/// On-disk catalog shape: frame definitions plus declared bridges.
#[derive(Debug, Clone, Deserialize)]
struct CatalogDocument {
    frames: Vec<FrameDef>,
    #[serde(default)]
    bridges: Vec<BridgeDef>,
}

/// The validated set of frame and bridge definitions the engine runs over.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    frames: Vec<FrameDef>,
    bridges: Vec<BridgeDef>,
}

impl Catalog {
    /// Validates and admits a set of frame and bridge definitions.
    pub fn admit(
        frames: Vec<FrameDef>,
        bridges: Vec<BridgeDef>,
    ) -> Result<CatalogAdmission, CatalogError> {
        let mut frame_names = BTreeSet::new();
        let mut warnings = BTreeSet::new();
        for frame in &frames {
            if !frame_names.insert(frame.name.clone()) {
                return Err(CatalogError::DuplicateFrame(frame.name.clone()));
            }
            if frame.key_columns.is_empty() {
                return Err(CatalogError::EmptyKeyColumns(frame.name.clone()));
            }
            if frame.attribute_columns.is_empty() {
                return Err(CatalogError::EmptyAttributes(frame.name.clone()));
            }
            let mut hook_names = BTreeSet::new();
            for hook in &frame.hooks {
                if !hook_names.insert(hook.name.as_str()) {
                    return Err(CatalogError::DuplicateHook {
                        frame: frame.name.clone(),
                        hook: hook.name.clone(),
                    });
                }
                hook.keyset
                    .validate()
                    .map_err(|err| CatalogError::InvalidKeyset {
                        frame: frame.name.clone(),
                        hook: hook.name.clone(),
                        reason: err.to_string(),
                    })?;
                if !frame.attribute_columns.contains(&hook.column) {
                    warnings.insert(format!(
                        "frame '{}' hook '{}' reads column '{}' outside the attribute list",
                        frame.name, hook.name, hook.column
                    ));
                }
            }
            for composite in &frame.composite_hooks {
                if !hook_names.insert(composite.name.as_str()) {
                    return Err(CatalogError::DuplicateHook {
                        frame: frame.name.clone(),
                        hook: composite.name.clone(),
                    });
                }
                if composite.members.len() < 2 {
                    return Err(CatalogError::ShortComposite {
                        frame: frame.name.clone(),
                        composite: composite.name.clone(),
                    });
                }
                for member in &composite.members {
                    if !frame.hooks.iter().any(|hook| &hook.name == member) {
                        return Err(CatalogError::UnknownCompositeMember {
                            frame: frame.name.clone(),
                            composite: composite.name.clone(),
                            member: member.clone(),
                        });
                    }
                }
            }
            if frame.primary_hook().is_none() {
                return Err(CatalogError::MissingPrimaryHook {
                    frame: frame.name.clone(),
                });
            }
        }

        // A join can only ever match if both sides declare the hook: the
        // joining frame and some frame already in the chain.
        let frame_hooks = |name: &str| -> Option<BTreeSet<&str>> {
            frames.iter().find(|frame| frame.name == name).map(|frame| {
                frame
                    .hooks
                    .iter()
                    .map(|hook| hook.name.as_str())
                    .chain(frame.composite_hooks.iter().map(|hook| hook.name.as_str()))
                    .collect()
            })
        };
        let mut bridge_names = BTreeSet::new();
        for bridge in &bridges {
            if !bridge_names.insert(bridge.name.clone()) {
                return Err(CatalogError::DuplicateBridge(bridge.name.clone()));
            }
            if bridge.joins.is_empty() {
                return Err(CatalogError::EmptyBridge(bridge.name.clone()));
            }
            let Some(mut reachable) = frame_hooks(&bridge.seed) else {
                return Err(CatalogError::UnknownBridgeFrame {
                    bridge: bridge.name.clone(),
                    frame: bridge.seed.clone(),
                });
            };
            for join in &bridge.joins {
                let Some(side) = frame_hooks(&join.frame) else {
                    return Err(CatalogError::UnknownBridgeFrame {
                        bridge: bridge.name.clone(),
                        frame: join.frame.clone(),
                    });
                };
                if !reachable.contains(join.on.as_str()) || !side.contains(join.on.as_str()) {
                    return Err(CatalogError::UnknownBridgeHook {
                        bridge: bridge.name.clone(),
                        frame: join.frame.clone(),
                        hook: join.on.clone(),
                    });
                }
                reachable.extend(side);
            }
        }

        Ok(CatalogAdmission {
            catalog: Catalog { frames, bridges },
            warnings: warnings.into_iter().collect(),
        })
    }

    /// Parses and admits a catalog from its JSON document.
    pub fn from_json(text: &str) -> Result<CatalogAdmission, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(text)?;
        Self::admit(document.frames, document.bridges)
    }

    pub fn frames(&self) -> &[FrameDef] {
        &self.frames
    }

    pub fn frame(&self, name: &str) -> Option<&FrameDef> {
        self.frames.iter().find(|frame| frame.name == name)
    }

    pub fn bridges(&self) -> &[BridgeDef] {
        &self.bridges
    }
}
