//! The help/formatting interface contract (spec.md §4.5).
//!
//! This module publishes the data a formatter needs — the registry, the
//! groups-by-label mapping, the help-item enumeration, and the section/
//! column model — without rendering anything itself. Concrete formatter
//! back-ends (ANSI, JSON, CSV, Markdown) are external collaborators and
//! out of scope, per spec.md §1.

use crate::registry::Registry;
use crate::schema::{GroupLabel, OptionSpec};

/// The fixed, ordered enumeration of semantic items an option may
/// contribute to help output (spec.md §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpItem {
    Synopsis,
    Separator,
    ParamCount,
    Positional,
    Append,
    Choices,
    Regex,
    Unique,
    Limit,
    Requires,
    Required,
    Default,
    Deprecated,
    Link,
    Stdin,
    Sources,
    RequiredIf,
    Cluster,
    UseNested,
    UseFormat,
    UseFilter,
    Inline,
    Formats,
}

impl HelpItem {
    /// All items, in the fixed declaration order from spec.md §4.5.
    pub const ALL: &'static [HelpItem] = &[
        HelpItem::Synopsis,
        HelpItem::Separator,
        HelpItem::ParamCount,
        HelpItem::Positional,
        HelpItem::Append,
        HelpItem::Choices,
        HelpItem::Regex,
        HelpItem::Unique,
        HelpItem::Limit,
        HelpItem::Requires,
        HelpItem::Required,
        HelpItem::Default,
        HelpItem::Deprecated,
        HelpItem::Link,
        HelpItem::Stdin,
        HelpItem::Sources,
        HelpItem::RequiredIf,
        HelpItem::Cluster,
        HelpItem::UseNested,
        HelpItem::UseFormat,
        HelpItem::UseFilter,
        HelpItem::Inline,
        HelpItem::Formats,
    ];
}

/// A section kind (spec.md §4.5: "kinds `text`, `usage`, `groups`").
#[derive(Clone, Debug, PartialEq)]
pub enum SectionKind {
    Text(String),
    Usage,
    Groups,
}

/// One section of a rendered help document.
#[derive(Clone, Debug, Default)]
pub struct Section {
    pub kind: Option<SectionKindSlot>,
    pub title: Option<String>,
    pub breaks: usize,
    pub indent: usize,
    pub filter: Vec<String>,
    pub exclude: Vec<String>,
    pub style: Option<String>,
}

/// `SectionKind` isn't `Default`, so the builder stores it behind an
/// `Option` slot the way a partially-built section legitimately can be
/// before a kind is chosen.
pub type SectionKindSlot = SectionKind;

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Section { kind: Some(kind), ..Default::default() }
    }
}

/// Column alignment (spec.md §4.5: "each with alignment (`left`/`right`,
/// plus `slot` for names, `merge` for param/descr)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Slot,
    Merge,
}

/// One of the three help columns: names, param, descr.
#[derive(Clone, Debug)]
pub struct Column {
    pub alignment: Alignment,
    pub indent: usize,
    pub breaks: usize,
    pub hidden: bool,
    /// Only meaningful for the param/descr columns: whether `indent` is
    /// relative to the previous column's right edge (`false`) or to the
    /// line start (`true`).
    pub absolute: bool,
}

impl Default for Column {
    fn default() -> Self {
        Column { alignment: Alignment::Left, indent: 0, breaks: 0, hidden: false, absolute: false }
    }
}

/// The three-column model a formatter consumes (spec.md §4.5).
#[derive(Clone, Debug)]
pub struct ColumnModel {
    pub names: Column,
    pub param: Column,
    pub descr: Column,
}

impl Default for ColumnModel {
    fn default() -> Self {
        ColumnModel {
            names: Column { alignment: Alignment::Slot, ..Default::default() },
            param: Column { alignment: Alignment::Merge, ..Default::default() },
            descr: Column { alignment: Alignment::Merge, ..Default::default() },
        }
    }
}

/// The options grouped by label, in declaration order, with `group = null`
/// (hidden) options excluded (spec.md §4.5: "groups-by-label mapping").
pub fn groups_by_label(registry: &Registry) -> Vec<(Option<String>, Vec<&OptionSpec>)> {
    let mut groups: Vec<(Option<String>, Vec<&OptionSpec>)> = Vec::new();
    for (_, option) in registry.schema().entries.iter() {
        let label = match &option.common().group {
            GroupLabel::Hidden => continue,
            GroupLabel::Named(name) => Some(name.clone()),
            GroupLabel::Unset => None,
        };
        if let Some(existing) = groups.iter_mut().find(|(l, _)| *l == label) {
            existing.1.push(option);
        } else {
            groups.push((label, vec![option]));
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommonAttrs, FlagOption, OptionSpec, Schema};

    fn flag(name: &str, group: GroupLabel) -> OptionSpec {
        let mut common = CommonAttrs::new(vec![Some(name)]);
        common.group = group;
        OptionSpec::Flag(FlagOption { common, ..Default::default() })
    }

    #[test]
    fn hidden_group_is_excluded() {
        let mut schema = Schema::new();
        schema.push("a", flag("-a", GroupLabel::Unset));
        schema.push("b", flag("-b", GroupLabel::Hidden));
        schema.push("c", flag("-c", GroupLabel::Named("Extra".into())));
        let registry = Registry::build(&schema).unwrap();
        let groups = groups_by_label(&registry);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, None);
        assert_eq!(groups[1].0, Some("Extra".to_string()));
    }

    #[test]
    fn help_item_enumeration_is_fixed_order() {
        assert_eq!(HelpItem::ALL[0], HelpItem::Synopsis);
        assert_eq!(HelpItem::ALL.last(), Some(&HelpItem::Formats));
    }
}
