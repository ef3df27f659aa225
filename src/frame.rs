use crate::catalog::FrameDef;
use crate::fingerprint::value_text;
use crate::hook::{CompositeHook, Hook, HookError, PitHook, PrimaryHook};
use crate::version::VersionedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// A versioned record decorated with its canonical hook strings, ready for
/// consumption as a join-key-bearing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame: String,
    /// The primary hook pinned to `valid_from`.
    pub pit_hook: String,
    /// Hook name to canonical string, every declared hook included.
    pub hooks: BTreeMap<String, String>,
    pub record: VersionedRecord,
}

/// A record excluded from frame output, with the component that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedRecord {
    pub unique_key: String,
    pub version: u32,
    pub error: HookError,
}

/// Frame assembly result: decorated records plus the quarantine ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutput {
    pub records: Vec<FrameRecord>,
    pub quarantined: Vec<QuarantinedRecord>,
}

/// Decorates versioned records with the hooks a frame definition declares.
///
/// A record whose hook components cannot all be composed is excluded from
/// the output and flagged; it cannot be resolved into any relationship until
/// the source data is corrected. Quarantine never aborts the run.
pub struct FrameAssembler<'a> {
    def: &'a FrameDef,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(def: &'a FrameDef) -> Self {
        Self { def }
    }

    pub fn assemble(&self, records: Vec<VersionedRecord>) -> FrameOutput {
        let mut output = FrameOutput::default();
        for record in records {
            match self.decorate(&record) {
                Ok((pit_hook, hooks)) => output.records.push(FrameRecord {
                    frame: self.def.name.clone(),
                    pit_hook,
                    hooks,
                    record,
                }),
                Err(error) => output.quarantined.push(QuarantinedRecord {
                    unique_key: record.unique_key.clone(),
                    version: record.version,
                    error,
                }),
            }
        }
        output
    }

    fn decorate(
        &self,
        record: &VersionedRecord,
    ) -> Result<(String, BTreeMap<String, String>), HookError> {
        let mut composed: BTreeMap<&str, Hook> = BTreeMap::new();
        for def in &self.def.hooks {
            let value = record
                .payload
                .get(&def.column)
                .and_then(value_text)
                .ok_or_else(|| HookError::MissingComponent {
                    column: def.column.clone(),
                    key: record.unique_key.clone(),
                })?;
            let hook = PrimaryHook::new(def.keyset.clone(), value)?;
            composed.insert(def.name.as_str(), Hook::Primary(hook));
        }
        for def in &self.def.composite_hooks {
            // Member order is the declared order, fixed per relationship.
            let members = def
                .members
                .iter()
                .map(|member| match composed.get(member.as_str()) {
                    Some(Hook::Primary(hook)) => Ok(hook.clone()),
                    _ => Err(HookError::MissingComponent {
                        column: member.clone(),
                        key: record.unique_key.clone(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let hook = CompositeHook::new(members)?;
            composed.insert(def.name.as_str(), Hook::Composite(hook));
        }

        let primary_name =
            self.def
                .primary_hook()
                .ok_or_else(|| HookError::MissingComponent {
                    column: "primary hook".into(),
                    key: record.unique_key.clone(),
                })?;
        let primary = composed
            .get(primary_name)
            .cloned()
            .ok_or_else(|| HookError::MissingComponent {
                column: primary_name.to_string(),
                key: record.unique_key.clone(),
            })?;
        let pit_hook = PitHook::new(primary, record.valid_from).to_string();
        let hooks = composed
            .into_iter()
            .map(|(name, hook)| (name.to_string(), hook.to_string()))
            .collect();
        Ok((pit_hook, hooks))
    }
}
