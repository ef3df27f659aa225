use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between the keyset and the value of a primary hook.
const VALUE_SEPARATOR: char = '|';
/// Separator between the members of a composite hook.
const MEMBER_SEPARATOR: char = '~';
/// Marker segment that pins a hook to a validity instant.
const PIT_MARKER: &str = "epoch__valid_from|";
/// Fixed-width, lexically sortable serialization of PIT instants.
const PIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Errors surfaced by hook composition and parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("malformed hook '{input}': {reason}")]
    Malformed { input: String, reason: &'static str },
    #[error("missing hook component '{column}' for key '{key}'")]
    MissingComponent { column: String, key: String },
}

impl HookError {
    fn malformed(input: impl Into<String>, reason: &'static str) -> Self {
        HookError::Malformed {
            input: input.into(),
            reason,
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains('.')
        && !segment.contains(VALUE_SEPARATOR)
        && !segment.contains(MEMBER_SEPARATOR)
}

/// The `namespace.concept.qualifier` triple identifying a key domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    pub namespace: String,
    pub concept: String,
    pub qualifier: String,
}

impl Keyset {
    pub fn new(
        namespace: impl Into<String>,
        concept: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Result<Self, HookError> {
        let keyset = Self {
            namespace: namespace.into(),
            concept: concept.into(),
            qualifier: qualifier.into(),
        };
        keyset.validate()?;
        Ok(keyset)
    }

    /// Checks the triple against the hook grammar (configuration admission
    /// runs this once; composition relies on it afterwards).
    pub fn validate(&self) -> Result<(), HookError> {
        for segment in [&self.namespace, &self.concept, &self.qualifier] {
            if !valid_segment(segment) {
                return Err(HookError::malformed(
                    self.to_string(),
                    "keyset segments must be non-empty and free of '.', '|', '~'",
                ));
            }
        }
        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self, HookError> {
        let mut segments = text.split('.');
        let (Some(namespace), Some(concept), Some(qualifier), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(HookError::malformed(
                text,
                "keyset must be exactly namespace.concept.qualifier",
            ));
        };
        Keyset::new(namespace, concept, qualifier)
    }
}

impl fmt::Display for Keyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.concept, self.qualifier)
    }
}

/// A single-entity hook: `namespace.concept.qualifier|value`.
///
/// String equality on the canonical form is the sole identity test; two
/// hooks reference the same entity iff their strings are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryHook {
    keyset: Keyset,
    value: String,
}

impl PrimaryHook {
    pub fn new(keyset: Keyset, value: impl Into<String>) -> Result<Self, HookError> {
        keyset.validate()?;
        let value = value.into();
        if value.is_empty() || value.contains(VALUE_SEPARATOR) || value.contains(MEMBER_SEPARATOR) {
            return Err(HookError::malformed(
                format!("{keyset}{VALUE_SEPARATOR}{value}"),
                "hook value must be non-empty and free of '|', '~'",
            ));
        }
        Ok(Self { keyset, value })
    }

    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Exact left inverse of composition.
    pub fn parse(text: &str) -> Result<Self, HookError> {
        let Some((keyset_text, value)) = text.split_once(VALUE_SEPARATOR) else {
            return Err(HookError::malformed(
                text,
                "primary hook must contain a '|' between keyset and value",
            ));
        };
        let keyset =
            Keyset::parse(keyset_text).map_err(|_| {
                HookError::malformed(text, "keyset must be exactly namespace.concept.qualifier")
            })?;
        PrimaryHook::new(keyset, value).map_err(|_| {
            HookError::malformed(text, "hook value must be non-empty and free of '|', '~'")
        })
    }
}

impl fmt::Display for PrimaryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{VALUE_SEPARATOR}{}", self.keyset, self.value)
    }
}

/// A relationship hook: primary hooks joined with `~` in the fixed member
/// order declared by the relationship definition. The order is part of the
/// identity, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeHook {
    members: Vec<PrimaryHook>,
}

impl CompositeHook {
    pub fn new(members: Vec<PrimaryHook>) -> Result<Self, HookError> {
        if members.len() < 2 {
            return Err(HookError::malformed(
                members
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                "composite hook requires at least two members",
            ));
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[PrimaryHook] {
        &self.members
    }

    pub fn parse(text: &str) -> Result<Self, HookError> {
        let members = text
            .split(MEMBER_SEPARATOR)
            .map(PrimaryHook::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| HookError::malformed(text, "composite member is not a primary hook"))?;
        CompositeHook::new(members)
            .map_err(|_| HookError::malformed(text, "composite hook requires at least two members"))
    }
}

impl fmt::Display for CompositeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, member) in self.members.iter().enumerate() {
            if idx > 0 {
                write!(f, "{MEMBER_SEPARATOR}")?;
            }
            write!(f, "{member}")?;
        }
        Ok(())
    }
}

/// Either hook shape accepted at join boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    Primary(PrimaryHook),
    Composite(CompositeHook),
}

impl Hook {
    pub fn parse(text: &str) -> Result<Self, HookError> {
        if text.contains(MEMBER_SEPARATOR) {
            CompositeHook::parse(text).map(Hook::Composite)
        } else {
            PrimaryHook::parse(text).map(Hook::Primary)
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Primary(hook) => write!(f, "{hook}"),
            Hook::Composite(hook) => write!(f, "{hook}"),
        }
    }
}

/// A hook pinned to a validity instant:
/// `<hook>~epoch__valid_from|<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitHook {
    hook: Hook,
    valid_from: DateTime<Utc>,
}

impl PitHook {
    pub fn new(hook: Hook, valid_from: DateTime<Utc>) -> Self {
        Self { hook, valid_from }
    }

    pub fn hook(&self) -> &Hook {
        &self.hook
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn parse(text: &str) -> Result<Self, HookError> {
        let Some((hook_text, pinned)) = text.rsplit_once(MEMBER_SEPARATOR) else {
            return Err(HookError::malformed(text, "missing point-in-time segment"));
        };
        let Some(instant_text) = pinned.strip_prefix(PIT_MARKER) else {
            return Err(HookError::malformed(
                text,
                "point-in-time segment must start with 'epoch__valid_from|'",
            ));
        };
        let valid_from = NaiveDateTime::parse_from_str(instant_text, PIT_TIMESTAMP_FORMAT)
            .map_err(|_| HookError::malformed(text, "unparseable point-in-time instant"))?
            .and_utc();
        let hook = Hook::parse(hook_text)?;
        Ok(Self { hook, valid_from })
    }
}

impl fmt::Display for PitHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{MEMBER_SEPARATOR}{PIT_MARKER}{}",
            self.hook,
            self.valid_from.format(PIT_TIMESTAMP_FORMAT)
        )
    }
}
