//! Statically compiled adapter table.

use super::FormatAdapter;
use crate::error::AnnoxError;
use crate::ir::io_coco_json::CocoAdapter;
use crate::ir::io_json::CanonicalAdapter;
use crate::ir::io_yolo::YoloAdapter;

/// One registered format: its name, accepted aliases and constructor.
#[derive(Clone, Copy)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    construct: fn() -> Box<dyn FormatAdapter>,
}

impl RegistryEntry {
    pub const fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        construct: fn() -> Box<dyn FormatAdapter>,
    ) -> Self {
        Self {
            name,
            aliases,
            construct,
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn build(&self) -> Box<dyn FormatAdapter> {
        (self.construct)()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish()
    }
}

fn canonical() -> Box<dyn FormatAdapter> {
    Box::new(CanonicalAdapter)
}

fn coco() -> Box<dyn FormatAdapter> {
    Box::new(CocoAdapter)
}

fn yolo() -> Box<dyn FormatAdapter> {
    Box::new(YoloAdapter)
}

const BUILTIN: &[RegistryEntry] = &[
    RegistryEntry::new("annox", &["ir-json", "ir"], canonical),
    RegistryEntry::new("coco", &["coco-json"], coco),
    RegistryEntry::new("yolo", &[], yolo),
];

/// Name → adapter lookup.
#[derive(Clone, Debug)]
pub struct AdapterRegistry {
    entries: &'static [RegistryEntry],
}

impl AdapterRegistry {
    /// The adapters compiled into this build.
    pub fn builtin() -> Self {
        Self { entries: BUILTIN }
    }

    /// A registry over a custom table.
    pub fn with_entries(entries: &'static [RegistryEntry]) -> Self {
        Self { entries }
    }

    /// Looks up an adapter by name or alias (case-insensitive).
    pub fn get(&self, name: &str) -> Option<Box<dyn FormatAdapter>> {
        self.entries
            .iter()
            .find(|entry| entry.matches(name))
            .map(RegistryEntry::build)
    }

    /// Like [`get`](Self::get), but an unknown name is an error listing the
    /// available formats.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn FormatAdapter>, AnnoxError> {
        self.get(name).ok_or_else(|| AnnoxError::UnknownFormat {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    /// Primary names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Every adapter with its primary name, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Box<dyn FormatAdapter>)> + '_ {
        self.entries.iter().map(|entry| (entry.name, entry.build()))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
