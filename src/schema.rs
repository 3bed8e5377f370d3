//! The schema model (spec.md §3): option kinds, their attributes, and the
//! helper predicates the rest of the crate shares.
//!
//! Each [`OptionKind`] is a Rust `enum` variant wrapping a kind-specific
//! struct, per Design Notes §9 ("represent option kinds as a tagged variant
//! per kind ... this turns illegal states into unrepresentable ones"). A
//! `Flag` option cannot accidentally carry a `paramName`, because
//! `FlagOption` has no such field.

use std::rc::Rc;

use regex::Regex;
use serde_json::Value as Json;

use crate::requirement::Requirement;
use crate::value::ValueMap;

/// One result element delivered to a `parse`/`complete` callback — the
/// "structured sequence information passed in explicitly" of Design
/// Notes §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackContext<'a> {
    /// The invocation name used on the command line for this occurrence.
    pub invocation: &'a str,
    /// The positional index of this element within the option's window.
    pub index: usize,
    /// True only when this option was the last word on a completing
    /// command line (spec.md §4.4, parameter finalization step 4).
    pub completing: bool,
}

pub type ParseFn = Rc<dyn Fn(&str, &ValueMap, CallbackContext) -> Result<Json, String>>;
pub type FunctionParseFn = Rc<dyn Fn(&[String], &ValueMap, CallbackContext) -> Result<Json, String>>;
pub type FlagParseFn = Rc<dyn Fn(&[String]) -> Result<Json, String>>;
pub type CompleteFn = Rc<dyn Fn(&str, CompletionContext) -> Vec<String>>;
pub type DefaultFn = Rc<dyn Fn() -> Json>;
pub type VersionResolveFn = Rc<dyn Fn(&str) -> Option<String>>;
pub type CommandOptionsFn = Rc<dyn Fn() -> Schema>;
pub type CommandParseFn = Rc<dyn Fn(ValueMap) -> Json>;

/// Context passed to a `complete` callback (spec.md §4.4, "Completion").
#[derive(Clone)]
pub struct CompletionContext<'a> {
    pub values: &'a ValueMap,
    pub index: usize,
    pub name: &'a str,
    pub prev: Option<&'a str>,
}

/// The closed set of option kinds (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Help,
    Version,
    Command,
    Flag,
    Single,
    Array,
    Function,
}

impl OptionKind {
    /// `help` and `version` are message-bearing.
    pub fn is_message_bearing(self) -> bool {
        matches!(self, OptionKind::Help | OptionKind::Version)
    }

    /// `help`, `version`, `command`, `flag` take zero parameters.
    pub fn is_niladic(self) -> bool {
        matches!(
            self,
            OptionKind::Help | OptionKind::Version | OptionKind::Command | OptionKind::Flag
        )
    }
}

/// Whether an inline `name=value` is forbidden, required, or merely
/// permitted for a non-niladic option (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlinePolicy {
    Forbidden,
    Required,
    Permitted,
}

impl Default for InlinePolicy {
    fn default() -> Self {
        InlinePolicy::Permitted
    }
}

/// An option's positional status: absent, positional without a marker, or
/// positional with a named marker token (spec.md §3: "positional flag
/// (`true` or a marker string)").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Positional {
    #[default]
    No,
    Plain,
    Marker(String),
}

impl Positional {
    pub fn is_positional(&self) -> bool {
        !matches!(self, Positional::No)
    }

    pub fn marker(&self) -> Option<&str> {
        match self {
            Positional::Marker(m) => Some(m.as_str()),
            _ => None,
        }
    }
}

/// An option's group label: unset (default heading), a named group, or
/// explicitly hidden (spec.md §3: "optional group label (null = hidden)").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GroupLabel {
    #[default]
    Unset,
    Named(String),
    Hidden,
}

/// Value-selection constraints (spec.md §3: "`regex` OR `choices`";
/// §4.2 Value compatibility additionally names a numeric `range` alongside
/// them as something a `default`/`example`/required value must satisfy).
/// `regex` and `choices` remain mutually exclusive by the validator's own
/// check; `Range` is a third alternative carried in the same slot since a
/// single option never needs more than one selection constraint at a time.
#[derive(Clone, Debug)]
pub enum Selector {
    Regex(Regex),
    Choices(Vec<String>),
    Range { min: f64, max: f64 },
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Selector::Regex(a), Selector::Regex(b)) => a.as_str() == b.as_str(),
            (Selector::Choices(a), Selector::Choices(b)) => a == b,
            (Selector::Range { min: a0, max: a1 }, Selector::Range { min: b0, max: b1 }) => {
                a0 == b0 && a1 == b1
            }
            _ => false,
        }
    }
}

/// The separator used to split a single command-line element into several
/// array values (spec.md §3, array extras: `separator`).
#[derive(Clone, Debug, PartialEq)]
pub enum Separator {
    Char(char),
    Regex(Regex),
}

/// A default value: a literal or a callback producing one (spec.md §3:
/// "`default` (literal or callback)").
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Json),
    Callback(DefaultFn),
}

/// `version`'s literal-or-callback source (spec.md §3: "Version extras:
/// fixed `version` OR a `resolve` callback").
#[derive(Clone)]
pub enum VersionSource {
    Literal(String),
    Resolve(VersionResolveFn),
}

/// Where a `command` option's inner schema comes from: declared inline, or
/// produced on demand by a factory (spec.md §9: "Represent command options
/// as a resolver that produces a schema on demand").
#[derive(Clone)]
pub enum CommandOptionsSource {
    Inline(Rc<Schema>),
    Factory(CommandOptionsFn),
}

/// A numeric parameter-count range, `[min, max]` with `max = None` meaning
/// unbounded (spec.md §3: function extra `paramCount ∈ ℕ ∪ ranges`; also
/// used internally for `single`/`array`'s implicit per-occurrence window).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamCount {
    pub min: usize,
    pub max: Option<usize>,
}

impl ParamCount {
    pub const fn exact(n: usize) -> Self {
        ParamCount { min: n, max: Some(n) }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        ParamCount { min, max: Some(max) }
    }

    pub const fn at_least(min: usize) -> Self {
        ParamCount { min, max: None }
    }

    /// Scalar counts coerce to `[n,n]`; negative scalars coerce to
    /// `[0, ∞]` (spec.md §4.2, "Literal sanity").
    pub fn from_scalar(n: i64) -> Self {
        if n < 0 {
            ParamCount { min: 0, max: None }
        } else {
            ParamCount::exact(n as usize)
        }
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }

    pub fn is_valid(&self) -> bool {
        self.max.map_or(true, |max| self.min < max || self.min == max)
    }
}

/// Names, group, cluster letters, positional status, and the remaining
/// identity/display attributes shared by every option kind (spec.md §3,
/// "Identity").
#[derive(Clone, Default)]
pub struct CommonAttrs {
    /// Declared names in order; `None` entries are skip-slots.
    pub names: Vec<Option<String>>,
    pub preferred_name: Option<String>,
    pub group: GroupLabel,
    pub cluster_letters: Vec<char>,
    pub positional: Positional,
    pub synopsis: Option<String>,
    pub deprecated: Option<String>,
    pub link: Option<String>,
    pub styles: Vec<String>,
}

impl CommonAttrs {
    pub fn new(names: Vec<Option<&str>>) -> Self {
        CommonAttrs {
            names: names.into_iter().map(|n| n.map(str::to_string)).collect(),
            ..Default::default()
        }
    }

    /// The first non-null declared name, for deriving a missing
    /// `preferredName` (spec.md §4.1 step 2).
    pub fn first_name(&self) -> Option<&str> {
        self.names.iter().flatten().next().map(String::as_str)
    }

    pub fn display_name(&self) -> &str {
        self.preferred_name
            .as_deref()
            .or_else(|| self.first_name())
            .or_else(|| self.positional.marker())
            .unwrap_or("")
    }
}

/// `required`/`default`/`requires`/`requiredIf` (spec.md §3, "Value
/// lifecycle").
#[derive(Clone, Default)]
pub struct ValueLifecycle {
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub requires: Option<Requirement>,
    pub required_if: Option<Requirement>,
}

/// `stdin`/`sources`/`break` (spec.md §3, "Environment").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvAttrs {
    /// Read standard input whole as a single parameter when the option
    /// goes unspecified.
    pub stdin: bool,
    /// Environment variable names or file URLs consulted, in order, ahead
    /// of `default` (spec.md §4.4, "End-of-input").
    pub sources: Vec<String>,
    /// Stop parsing immediately after this option closes its window
    /// (spec.md §4.4 step 6).
    pub break_after: bool,
}

/// `paramName`/`example`/`parse`/`complete`/`inline` (spec.md §3,
/// "Parameter handling").
#[derive(Clone, Default)]
pub struct ParamAttrs {
    pub param_name: Option<String>,
    pub example: Option<Json>,
    pub complete: Option<CompleteFn>,
    /// `None` means the caller never set an inline policy — the validator
    /// only warns about a constraint that has "no effect" (spec.md §4.2)
    /// when one was actually declared.
    pub inline: Option<InlinePolicy>,
}

#[derive(Clone, Default)]
pub struct HelpOption {
    pub common: CommonAttrs,
    pub sections: Vec<crate::help::Section>,
    pub formats: Vec<(String, String)>,
    pub use_nested: bool,
    pub use_format: bool,
    pub use_filter: bool,
    pub save_message: bool,
}

#[derive(Clone)]
pub struct VersionOption {
    pub common: CommonAttrs,
    pub source: Option<VersionSource>,
    pub save_message: bool,
}

#[derive(Clone)]
pub struct CommandOption {
    pub common: CommonAttrs,
    pub lifecycle: ValueLifecycle,
    pub env: EnvAttrs,
    pub options: CommandOptionsSource,
    pub parse: Option<CommandParseFn>,
}

#[derive(Clone, Default)]
pub struct FlagOption {
    pub common: CommonAttrs,
    pub lifecycle: ValueLifecycle,
    pub env: EnvAttrs,
    pub parse: Option<FlagParseFn>,
    pub skip_count: usize,
}

#[derive(Clone, Default)]
pub struct SingleOption {
    pub common: CommonAttrs,
    pub lifecycle: ValueLifecycle,
    pub env: EnvAttrs,
    pub param: ParamAttrs,
    pub parse: Option<ParseFn>,
    pub selector: Option<Selector>,
}

#[derive(Clone, Default)]
pub struct ArrayOption {
    pub common: CommonAttrs,
    pub lifecycle: ValueLifecycle,
    pub env: EnvAttrs,
    pub param: ParamAttrs,
    pub parse: Option<ParseFn>,
    pub selector: Option<Selector>,
    pub separator: Option<Separator>,
    pub unique: bool,
    pub append: bool,
    pub limit: Option<usize>,
}

#[derive(Clone, Default)]
pub struct FunctionOption {
    pub common: CommonAttrs,
    pub lifecycle: ValueLifecycle,
    pub env: EnvAttrs,
    pub param: ParamAttrs,
    pub parse: Option<FunctionParseFn>,
    pub param_count: ParamCount,
}

impl Default for ParamCount {
    fn default() -> Self {
        ParamCount::exact(1)
    }
}

/// A single entry in a schema: one of the seven option kinds.
#[derive(Clone)]
pub enum OptionSpec {
    Help(HelpOption),
    Version(VersionOption),
    Command(CommandOption),
    Flag(FlagOption),
    Single(SingleOption),
    Array(ArrayOption),
    Function(FunctionOption),
}

impl OptionSpec {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionSpec::Help(_) => OptionKind::Help,
            OptionSpec::Version(_) => OptionKind::Version,
            OptionSpec::Command(_) => OptionKind::Command,
            OptionSpec::Flag(_) => OptionKind::Flag,
            OptionSpec::Single(_) => OptionKind::Single,
            OptionSpec::Array(_) => OptionKind::Array,
            OptionSpec::Function(_) => OptionKind::Function,
        }
    }

    pub fn common(&self) -> &CommonAttrs {
        match self {
            OptionSpec::Help(o) => &o.common,
            OptionSpec::Version(o) => &o.common,
            OptionSpec::Command(o) => &o.common,
            OptionSpec::Flag(o) => &o.common,
            OptionSpec::Single(o) => &o.common,
            OptionSpec::Array(o) => &o.common,
            OptionSpec::Function(o) => &o.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonAttrs {
        match self {
            OptionSpec::Help(o) => &mut o.common,
            OptionSpec::Version(o) => &mut o.common,
            OptionSpec::Command(o) => &mut o.common,
            OptionSpec::Flag(o) => &mut o.common,
            OptionSpec::Single(o) => &mut o.common,
            OptionSpec::Array(o) => &mut o.common,
            OptionSpec::Function(o) => &mut o.common,
        }
    }

    pub fn lifecycle(&self) -> Option<&ValueLifecycle> {
        match self {
            OptionSpec::Command(o) => Some(&o.lifecycle),
            OptionSpec::Flag(o) => Some(&o.lifecycle),
            OptionSpec::Single(o) => Some(&o.lifecycle),
            OptionSpec::Array(o) => Some(&o.lifecycle),
            OptionSpec::Function(o) => Some(&o.lifecycle),
            OptionSpec::Help(_) | OptionSpec::Version(_) => None,
        }
    }

    /// Environment/lifecycle extras (spec.md §3, "Environment"); absent for
    /// the message-bearing kinds.
    pub fn env(&self) -> Option<&EnvAttrs> {
        match self {
            OptionSpec::Command(o) => Some(&o.env),
            OptionSpec::Flag(o) => Some(&o.env),
            OptionSpec::Single(o) => Some(&o.env),
            OptionSpec::Array(o) => Some(&o.env),
            OptionSpec::Function(o) => Some(&o.env),
            OptionSpec::Help(_) | OptionSpec::Version(_) => None,
        }
    }

    pub fn selector(&self) -> Option<&Selector> {
        match self {
            OptionSpec::Single(o) => o.selector.as_ref(),
            OptionSpec::Array(o) => o.selector.as_ref(),
            _ => None,
        }
    }

    pub fn is_niladic(&self) -> bool {
        self.kind().is_niladic()
    }

    pub fn is_message_bearing(&self) -> bool {
        self.kind().is_message_bearing()
    }

    /// The `[min,max]` parameter-window for a single occurrence of this
    /// option (spec.md §4.4: "If non-niladic: compute `[min,max]`").
    pub fn param_count(&self) -> ParamCount {
        match self {
            OptionSpec::Single(_) => ParamCount::exact(1),
            OptionSpec::Array(_) => ParamCount::at_least(1),
            OptionSpec::Function(o) => o.param_count,
            _ => ParamCount::exact(0),
        }
    }

    pub fn inline_policy(&self) -> InlinePolicy {
        match self {
            OptionSpec::Single(o) => o.param.inline.unwrap_or_default(),
            OptionSpec::Array(o) => o.param.inline.unwrap_or_default(),
            OptionSpec::Function(o) => o.param.inline.unwrap_or_default(),
            _ => InlinePolicy::Forbidden,
        }
    }

    /// The raw, caller-declared inline policy, `None` when never set
    /// (spec.md §4.2: "invalid-inline-constraint" only fires for an
    /// explicit declaration, not the implicit default).
    pub fn declared_inline_policy(&self) -> Option<InlinePolicy> {
        match self {
            OptionSpec::Single(o) => o.param.inline,
            OptionSpec::Array(o) => o.param.inline,
            OptionSpec::Function(o) => o.param.inline,
            _ => None,
        }
    }

    /// Names may not be used as an always-true "must be present" required
    /// value (spec.md §3: "A command or flag may not be used as a
    /// non-empty required value"), and command/flag targets only admit the
    /// presence/absence forms, never an equal-value form.
    pub fn admits_equal_value_requirement(&self) -> bool {
        !matches!(self.kind(), OptionKind::Command | OptionKind::Flag)
    }
}

/// An ordered mapping of keys to options — a schema "level" (spec.md §4.1:
/// "Input: an ordered mapping of keys to options").
#[derive(Clone, Default)]
pub struct Schema {
    pub entries: Vec<(String, OptionSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn push(&mut self, key: impl Into<String>, option: OptionSpec) -> &mut Self {
        self.entries.push((key.into(), option));
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionSpec> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_count_negative_scalar_coerces_to_unbounded() {
        let pc = ParamCount::from_scalar(-1);
        assert_eq!(pc, ParamCount::at_least(0));
    }

    #[test]
    fn param_count_contains_respects_bounds() {
        let pc = ParamCount::range(1, 3);
        assert!(!pc.contains(0));
        assert!(pc.contains(1));
        assert!(pc.contains(3));
        assert!(!pc.contains(4));
    }

    #[test]
    fn first_name_skips_null_slots() {
        let common = CommonAttrs::new(vec![None, Some("foo"), Some("f")]);
        assert_eq!(common.first_name(), Some("foo"));
    }

    #[test]
    fn niladic_and_message_bearing_closed_sets() {
        assert!(OptionKind::Help.is_niladic());
        assert!(OptionKind::Help.is_message_bearing());
        assert!(OptionKind::Flag.is_niladic());
        assert!(!OptionKind::Flag.is_message_bearing());
        assert!(!OptionKind::Single.is_niladic());
        assert!(!OptionKind::Array.is_niladic());
    }
}
