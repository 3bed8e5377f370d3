//! The structural validator (spec.md §4.2).
//!
//! Runs once per schema and recurses into nested `command` schemas,
//! producing either a built [`Registry`] plus any accumulated warnings, or
//! the first fatal [`Error`] encountered. A `command` option whose
//! options-source (directly or, through further commands, indirectly)
//! resolves back to itself is visited only once per resolved schema, so a
//! self-referential factory terminates instead of looping forever.

use std::collections::HashSet;

use serde_json::Value as Json;
use strsim::levenshtein;

use crate::error::{Error, Warning, WarningBag};
use crate::registry::Registry;
use crate::requirement::{RequiredValue, Requirement};
use crate::schema::{CommandOption, CommandOptionsSource, OptionSpec, Schema, Selector, VersionSource};

/// A validated schema: its registry plus whatever non-fatal warnings were
/// collected along the way.
pub struct Validated {
    pub registry: Registry,
    pub warnings: WarningBag,
}

/// Validate a schema (spec.md §4.2).
pub fn validate(schema: &Schema) -> Result<Validated, Error> {
    let mut visited = HashSet::new();
    validate_inner(schema, &mut visited)
}

fn validate_inner(schema: &Schema, visited: &mut HashSet<usize>) -> Result<Validated, Error> {
    let registry = Registry::build(schema)?;
    let mut warnings = WarningBag::new();
    let mut declared_names: Vec<&str> = Vec::new();

    for (key, option) in &schema.entries {
        validate_names(option)?;
        check_positional_cluster_letter(option, &mut warnings);
        validate_literals(option)?;
        validate_value_compatibility(option)?;
        validate_inline(option, &mut warnings);
        validate_requirements(key, option, &registry)?;
        validate_lifecycle_exclusions(option)?;
        validate_param_display_exclusion(option)?;
        warn_variadic_with_cluster_letter(option, &mut warnings);

        for name in option.common().names.iter().flatten() {
            declared_names.push(name.as_str());
        }

        if let OptionSpec::Command(cmd) = option {
            if let Some(nested) = validate_subcommand(cmd, visited)? {
                warnings.extend(nested);
            }
        }
    }

    warn_too_similar_names(&declared_names, &mut warnings);
    warn_mixed_naming_convention(&declared_names, &mut warnings);

    Ok(Validated { registry, warnings })
}

fn validate_names(option: &OptionSpec) -> Result<(), Error> {
    let common = option.common();
    let has_name = common.names.iter().flatten().next().is_some();
    if !has_name && !common.positional.is_positional() {
        return Err(Error::UnnamedOption);
    }
    for name in common.names.iter().flatten() {
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=') {
            return Err(Error::InvalidOptionName { name: name.clone() });
        }
    }
    if let crate::schema::Positional::Marker(marker) = &common.positional {
        if marker.is_empty() {
            return Err(Error::EmptyPositionalMarker { name: common.display_name().to_string() });
        }
    }
    Ok(())
}

fn check_positional_cluster_letter(option: &OptionSpec, warnings: &mut WarningBag) {
    let common = option.common();
    if common.positional.is_positional() && !common.cluster_letters.is_empty() {
        warnings.push(Warning::PositionalWithClusterLetter {
            name: common.display_name().to_string(),
        });
    }
}

fn validate_literals(option: &OptionSpec) -> Result<(), Error> {
    let display = option.common().display_name().to_string();

    for &letter in &option.common().cluster_letters {
        if !letter.is_ascii_alphanumeric() {
            return Err(Error::InvalidClusterLetter { name: display.clone(), letter });
        }
    }

    if let OptionSpec::Version(v) = option {
        if let Some(VersionSource::Literal(s)) = &v.source {
            if s.trim().is_empty() {
                return Err(Error::InvalidVersionDefinition { name: display.clone() });
            }
        }
    }

    if let Some(Selector::Choices(choices)) = option.selector() {
        if choices.is_empty() {
            return Err(Error::EmptyChoicesDefinition { name: display.clone() });
        }
        let mut seen = HashSet::new();
        for choice in choices {
            if !seen.insert(choice.as_str()) {
                return Err(Error::DuplicateChoiceValue { name: display.clone(), value: choice.clone() });
            }
        }
    }

    if let Some(Selector::Range { min, max }) = option.selector() {
        if !(min < max) {
            return Err(Error::InvalidNumericRange { name: display.clone() });
        }
    }

    if let OptionSpec::Function(f) = option {
        if !f.param_count.is_valid() {
            return Err(Error::InvalidParamCount { name: display.clone() });
        }
    }

    Ok(())
}

/// A literal value is compatible with an option's declared shape when its
/// JSON type matches what the kind can hold, and (for strings/numbers) it
/// satisfies the option's selection constraint, if any (spec.md §4.2,
/// "Value compatibility": "`default`, `example`, and any required-value ...
/// must type-check against the option's declared value shape ... and
/// satisfy the option's selection constraints (regex, choices, range)").
///
/// Applied here to `default` and `example`; the analogous check for
/// `requires`/`requiredIf` values lives in `validate_required_value_shape`,
/// which this shares its selector logic with.
fn validate_value_compatibility(option: &OptionSpec) -> Result<(), Error> {
    let display = option.common().display_name().to_string();

    if let Some(lifecycle) = option.lifecycle() {
        if let Some(crate::schema::DefaultValue::Literal(json)) = &lifecycle.default {
            check_literal_against_shape(&display, option, json)?;
        }
    }
    if let Some(param) = param_attrs(option) {
        if let Some(example) = &param.example {
            check_literal_against_shape(&display, option, example)?;
        }
    }
    Ok(())
}

fn param_attrs(option: &OptionSpec) -> Option<&crate::schema::ParamAttrs> {
    match option {
        OptionSpec::Single(o) => Some(&o.param),
        OptionSpec::Array(o) => Some(&o.param),
        OptionSpec::Function(o) => Some(&o.param),
        _ => None,
    }
}

fn check_literal_against_shape(display: &str, option: &OptionSpec, value: &Json) -> Result<(), Error> {
    let shape_ok = match option {
        OptionSpec::Flag(_) => value.is_boolean(),
        OptionSpec::Single(_) => !value.is_array(),
        OptionSpec::Array(_) | OptionSpec::Function(_) => true,
        OptionSpec::Help(_) | OptionSpec::Version(_) | OptionSpec::Command(_) => false,
    };
    if !shape_ok {
        return Err(Error::IncompatibleRequiredValue { name: display.to_string() });
    }
    for element in value.as_array().map(|a| a.as_slice()).unwrap_or(std::slice::from_ref(value)) {
        check_selector_match(display, option.selector(), element)?;
    }
    Ok(())
}

fn check_selector_match(display: &str, selector: Option<&Selector>, value: &Json) -> Result<(), Error> {
    match selector {
        Some(Selector::Choices(choices)) => {
            if let Json::String(s) = value {
                if !choices.contains(s) {
                    return Err(Error::InvalidRequiredValue { name: display.to_string() });
                }
            }
        }
        Some(Selector::Regex(re)) => {
            if let Json::String(s) = value {
                if !re.is_match(s) {
                    return Err(Error::InvalidRequiredValue { name: display.to_string() });
                }
            }
        }
        Some(Selector::Range { min, max }) => {
            if let Some(n) = value.as_f64() {
                if n < *min || n > *max {
                    return Err(Error::InvalidRequiredValue { name: display.to_string() });
                }
            }
        }
        None => {}
    }
    Ok(())
}

fn validate_inline(option: &OptionSpec, warnings: &mut WarningBag) {
    if option.declared_inline_policy().is_some() && option.param_count().max != Some(1) {
        warnings.push(Warning::InvalidInlineConstraint {
            name: option.common().display_name().to_string(),
        });
    }
}

/// `required` is mutually exclusive with `default` and `requiredIf`
/// (spec.md §3 invariants).
fn validate_lifecycle_exclusions(option: &OptionSpec) -> Result<(), Error> {
    if let Some(lifecycle) = option.lifecycle() {
        if lifecycle.required && lifecycle.default.is_some() {
            return Err(Error::ConflictingAttributes {
                name: option.common().display_name().to_string(),
                attrs: "required, default".to_string(),
            });
        }
        if lifecycle.required && lifecycle.required_if.is_some() {
            return Err(Error::ConflictingAttributes {
                name: option.common().display_name().to_string(),
                attrs: "required, requiredIf".to_string(),
            });
        }
    }
    Ok(())
}

/// `example` is mutually exclusive with `paramName` (spec.md §3).
fn validate_param_display_exclusion(option: &OptionSpec) -> Result<(), Error> {
    let param = match option {
        OptionSpec::Single(o) => &o.param,
        OptionSpec::Array(o) => &o.param,
        OptionSpec::Function(o) => &o.param,
        _ => return Ok(()),
    };
    if param.param_name.is_some() && param.example.is_some() {
        return Err(Error::ConflictingAttributes {
            name: option.common().display_name().to_string(),
            attrs: "example, paramName".to_string(),
        });
    }
    Ok(())
}

/// An option whose maximum parameter count exceeds one may only appear as
/// the last letter in a cluster (spec.md §4.2 Warnings).
fn warn_variadic_with_cluster_letter(option: &OptionSpec, warnings: &mut WarningBag) {
    let variadic = option.param_count().max.map_or(true, |max| max > 1);
    if variadic && !option.common().cluster_letters.is_empty() {
        warnings.push(Warning::VariadicWithClusterLetter {
            name: option.common().display_name().to_string(),
        });
    }
}

fn validate_requirements(key: &str, option: &OptionSpec, registry: &Registry) -> Result<(), Error> {
    if let Some(lifecycle) = option.lifecycle() {
        if let Some(req) = &lifecycle.requires {
            validate_requirement_refs(key, req, registry)?;
        }
        if let Some(req) = &lifecycle.required_if {
            validate_requirement_refs(key, req, registry)?;
        }
    }
    Ok(())
}

fn validate_requirement_refs(owner_key: &str, req: &Requirement, registry: &Registry) -> Result<(), Error> {
    match req {
        Requirement::Key(name) => {
            let target_key = resolve_ref(owner_key, name, registry)?;
            let target = registry.get(&target_key).expect("resolved by resolve_ref");
            check_presence_not_trivial(name, target)
        }
        Requirement::Not(inner) => validate_requirement_refs(owner_key, inner, registry),
        Requirement::All(items) | Requirement::One(items) => {
            for item in items {
                validate_requirement_refs(owner_key, item, registry)?;
            }
            Ok(())
        }
        Requirement::ValMap(entries) => {
            for (name, rv) in entries {
                let target_key = resolve_ref(owner_key, name, registry)?;
                let target = registry.get(&target_key).expect("resolved by resolve_ref");
                if matches!(rv, RequiredValue::Equals(_)) && !target.admits_equal_value_requirement() {
                    return Err(Error::InvalidRequiredOption { name: name.clone() });
                }
                match rv {
                    RequiredValue::Present => check_presence_not_trivial(name, target)?,
                    RequiredValue::Absent => check_absence_not_trivial(name, target)?,
                    RequiredValue::Equals(value) => validate_required_value_shape(name, target, value)?,
                }
            }
            Ok(())
        }
        Requirement::Callback(_) => Ok(()),
    }
}

/// A "must be present" reference to a target that is itself always
/// required or has a default is trivially true (spec.md §3, §4.6
/// validator-time: "if paired with `undefined` the target must not be
/// always-required nor have a default").
fn check_presence_not_trivial(name: &str, target: &OptionSpec) -> Result<(), Error> {
    if let Some(lifecycle) = target.lifecycle() {
        if lifecycle.required || lifecycle.default.is_some() {
            return Err(Error::InvalidRequiredOption { name: name.to_string() });
        }
    }
    Ok(())
}

/// A "must be absent" reference to a target with a default is trivially
/// false (spec.md §4.6: "if paired with `null` the target must not have a
/// default").
fn check_absence_not_trivial(name: &str, target: &OptionSpec) -> Result<(), Error> {
    if let Some(lifecycle) = target.lifecycle() {
        if lifecycle.default.is_some() {
            return Err(Error::InvalidRequiredOption { name: name.to_string() });
        }
    }
    Ok(())
}

fn resolve_ref(owner_key: &str, name: &str, registry: &Registry) -> Result<String, Error> {
    match registry.lookup_name(name) {
        Some(key) if key == owner_key => Err(Error::InvalidSelfRequirement { name: name.to_string() }),
        Some(key) => Ok(key.to_string()),
        None => Err(Error::UnknownRequiredOption { name: name.to_string() }),
    }
}

fn validate_required_value_shape(name: &str, target: &OptionSpec, value: &Json) -> Result<(), Error> {
    check_literal_against_shape(name, target, value)
}

/// Recurse into a `command` option's inner schema, returning `None` when
/// this resolved schema was already visited in this validation pass.
fn validate_subcommand(
    cmd: &CommandOption,
    visited: &mut HashSet<usize>,
) -> Result<Option<WarningBag>, Error> {
    let (ptr, inner): (usize, Schema) = match &cmd.options {
        CommandOptionsSource::Inline(inner) => (std::rc::Rc::as_ptr(inner) as *const () as usize, (**inner).clone()),
        CommandOptionsSource::Factory(factory) => {
            let ptr = std::rc::Rc::as_ptr(factory) as *const () as usize;
            (ptr, factory())
        }
    };
    if !visited.insert(ptr) {
        return Ok(None);
    }
    let validated = validate_inner(&inner, visited)?;
    Ok(Some(validated.warnings))
}

/// Warn about pairs of declared names within Levenshtein distance ≤ 0.2 of
/// the longer name's length (spec.md §4.2, "too-similar-option-names";
/// Design Notes §9 gives the same 0.2 ratio for the "unknown option"
/// suggestion threshold in its complementary 0.6-similarity form). Very
/// short names are exempted since a one-letter edit distance between e.g.
/// `-a`/`-b` is unavoidable.
fn warn_too_similar_names(names: &[&str], warnings: &mut WarningBag) {
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let (a, b) = (names[i], names[j]);
            if a == b || a.len() <= 2 || b.len() <= 2 {
                continue;
            }
            let longer = a.len().max(b.len());
            let threshold = (longer as f64 * 0.2).floor() as usize;
            if levenshtein(a, b) <= threshold.max(1) && levenshtein(a, b) > 0 {
                warnings.push(Warning::TooSimilarOptionNames { a: a.to_string(), b: b.to_string() });
            }
        }
    }
}

/// Warn when long names mix `--kebab-case` and `--camelCase` within the
/// same schema level (spec.md §4.2, "mixed-naming-convention").
fn warn_mixed_naming_convention(names: &[&str], warnings: &mut WarningBag) {
    let long_names: Vec<&str> = names.iter().copied().filter(|n| n.starts_with("--")).collect();
    if long_names.len() < 2 {
        return;
    }
    let has_kebab = long_names.iter().any(|n| n[2..].contains('-'));
    let has_camel = long_names.iter().any(|n| n[2..].chars().any(char::is_uppercase));
    if has_kebab && has_camel {
        warnings.push(Warning::MixedNamingConvention {
            names: long_names.into_iter().map(str::to_string).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        CommonAttrs, FlagOption, FunctionOption, OptionSpec, ParamCount, Positional, Schema, SingleOption,
        ValueLifecycle,
    };

    #[test]
    fn invalid_numeric_range_is_rejected() {
        let mut schema = Schema::new();
        let single = SingleOption {
            common: CommonAttrs::new(vec![Some("--count")]),
            selector: Some(Selector::Range { min: 10.0, max: 1.0 }),
            ..Default::default()
        };
        schema.push("count", OptionSpec::Single(single));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidNumericRange { name: "--count".to_string() });
    }

    #[test]
    fn default_value_outside_range_is_rejected() {
        let mut schema = Schema::new();
        let mut single = SingleOption {
            common: CommonAttrs::new(vec![Some("--count")]),
            selector: Some(Selector::Range { min: 1.0, max: 10.0 }),
            ..Default::default()
        };
        single.lifecycle.default = Some(crate::schema::DefaultValue::Literal(Json::from(42.0)));
        schema.push("count", OptionSpec::Single(single));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidRequiredValue { name: "--count".to_string() });
    }

    #[test]
    fn default_value_within_range_is_accepted() {
        let mut schema = Schema::new();
        let mut single = SingleOption {
            common: CommonAttrs::new(vec![Some("--count")]),
            selector: Some(Selector::Range { min: 1.0, max: 10.0 }),
            ..Default::default()
        };
        single.lifecycle.default = Some(crate::schema::DefaultValue::Literal(Json::from(5.0)));
        schema.push("count", OptionSpec::Single(single));
        assert!(validate(&schema).is_ok());
    }

    #[test]
    fn example_value_not_matching_choices_is_rejected() {
        let mut schema = Schema::new();
        let mut single = SingleOption {
            common: CommonAttrs::new(vec![Some("--mode")]),
            selector: Some(Selector::Choices(vec!["a".to_string(), "b".to_string()])),
            ..Default::default()
        };
        single.param.example = Some(Json::String("z".to_string()));
        schema.push("mode", OptionSpec::Single(single));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidRequiredValue { name: "--mode".to_string() });
    }

    #[test]
    fn self_requirement_is_rejected() {
        let mut schema = Schema::new();
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.requires = Some(Requirement::key("--a"));
        schema.push("a", OptionSpec::Flag(a));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidSelfRequirement { name: "--a".to_string() });
    }

    #[test]
    fn unknown_required_option_is_rejected() {
        let mut schema = Schema::new();
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.requires = Some(Requirement::key("--ghost"));
        schema.push("a", OptionSpec::Flag(a));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::UnknownRequiredOption { name: "--ghost".to_string() });
    }

    #[test]
    fn empty_choices_is_rejected() {
        let mut schema = Schema::new();
        let single = SingleOption {
            common: CommonAttrs::new(vec![Some("--mode")]),
            selector: Some(Selector::Choices(vec![])),
            ..Default::default()
        };
        schema.push("mode", OptionSpec::Single(single));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::EmptyChoicesDefinition { name: "--mode".to_string() });
    }

    #[test]
    fn invalid_param_count_is_rejected() {
        let mut schema = Schema::new();
        let func = FunctionOption {
            common: CommonAttrs::new(vec![Some("--run")]),
            param_count: ParamCount::range(3, 1),
            ..Default::default()
        };
        schema.push("run", OptionSpec::Function(func));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidParamCount { name: "--run".to_string() });
    }

    #[test]
    fn positional_with_cluster_letter_warns() {
        let mut schema = Schema::new();
        let mut single = SingleOption { common: CommonAttrs::new(vec![Some("--path")]), ..Default::default() };
        single.common.positional = Positional::Plain;
        single.common.cluster_letters.push('p');
        schema.push("path", OptionSpec::Single(single));
        let result = validate(&schema).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::PositionalWithClusterLetter { .. })));
    }

    #[test]
    fn mixed_naming_convention_warns() {
        let mut schema = Schema::new();
        schema.push(
            "a",
            OptionSpec::Flag(FlagOption { common: CommonAttrs::new(vec![Some("--foo-bar")]), ..Default::default() }),
        );
        schema.push(
            "b",
            OptionSpec::Flag(FlagOption { common: CommonAttrs::new(vec![Some("--fooBaz")]), ..Default::default() }),
        );
        let result = validate(&schema).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MixedNamingConvention { .. })));
    }

    #[test]
    fn requiring_presence_of_an_always_required_option_is_rejected() {
        let mut schema = Schema::new();
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.requires = Some(Requirement::key("--b"));
        schema.push("a", OptionSpec::Flag(a));
        let mut b = FlagOption { common: CommonAttrs::new(vec![Some("--b")]), ..Default::default() };
        b.lifecycle.required = true;
        schema.push("b", OptionSpec::Flag(b));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidRequiredOption { name: "--b".to_string() });
    }

    #[test]
    fn requiring_absence_of_an_option_with_a_default_is_rejected() {
        let mut schema = Schema::new();
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.requires = Some(Requirement::ValMap(vec![(
            "--b".to_string(),
            RequiredValue::Absent,
        )]));
        schema.push("a", OptionSpec::Flag(a));
        let mut b = SingleOption { common: CommonAttrs::new(vec![Some("--b")]), ..Default::default() };
        b.lifecycle.default = Some(crate::schema::DefaultValue::Literal(Json::String("x".into())));
        schema.push("b", OptionSpec::Single(b));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err, Error::InvalidRequiredOption { name: "--b".to_string() });
    }

    #[test]
    fn required_and_default_are_mutually_exclusive() {
        let mut schema = Schema::new();
        let mut a = SingleOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.required = true;
        a.lifecycle.default = Some(crate::schema::DefaultValue::Literal(Json::String("x".into())));
        schema.push("a", OptionSpec::Single(a));
        let err = validate(&schema).unwrap_err();
        assert_eq!(
            err,
            Error::ConflictingAttributes { name: "--a".to_string(), attrs: "required, default".to_string() }
        );
    }

    #[test]
    fn required_and_required_if_are_mutually_exclusive() {
        let mut schema = Schema::new();
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.lifecycle.required = true;
        a.lifecycle.required_if = Some(Requirement::key("--b"));
        schema.push("a", OptionSpec::Flag(a));
        schema.push("b", OptionSpec::Flag(FlagOption { common: CommonAttrs::new(vec![Some("--b")]), ..Default::default() }));
        let err = validate(&schema).unwrap_err();
        assert_eq!(
            err,
            Error::ConflictingAttributes { name: "--a".to_string(), attrs: "required, requiredIf".to_string() }
        );
    }

    #[test]
    fn example_and_param_name_are_mutually_exclusive() {
        let mut schema = Schema::new();
        let mut a = SingleOption { common: CommonAttrs::new(vec![Some("--a")]), ..Default::default() };
        a.param.param_name = Some("NAME".to_string());
        a.param.example = Some(Json::String("sample".into()));
        schema.push("a", OptionSpec::Single(a));
        let err = validate(&schema).unwrap_err();
        assert_eq!(
            err,
            Error::ConflictingAttributes { name: "--a".to_string(), attrs: "example, paramName".to_string() }
        );
    }

    #[test]
    fn variadic_option_with_cluster_letter_warns() {
        let mut schema = Schema::new();
        let mut a = crate::schema::ArrayOption { common: CommonAttrs::new(vec![Some("-a")]), ..Default::default() };
        a.common.cluster_letters.push('a');
        schema.push("a", OptionSpec::Array(a));
        let result = validate(&schema).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::VariadicWithClusterLetter { .. })));
    }

    #[test]
    fn too_similar_names_warns_within_ratio() {
        let mut schema = Schema::new();
        schema.push("a", OptionSpec::Flag(FlagOption { common: CommonAttrs::new(vec![Some("--color")]), ..Default::default() }));
        schema.push("b", OptionSpec::Flag(FlagOption { common: CommonAttrs::new(vec![Some("--colour")]), ..Default::default() }));
        let result = validate(&schema).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::TooSimilarOptionNames { .. })));
    }

    #[test]
    fn cyclic_command_factory_terminates() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let holder: Rc<RefCell<Option<Schema>>> = Rc::new(RefCell::new(None));
        let holder_for_factory = holder.clone();
        let factory: crate::schema::CommandOptionsFn =
            Rc::new(move || holder_for_factory.borrow().clone().unwrap());

        let cmd = CommandOption {
            common: CommonAttrs::new(vec![Some("--recurse")]),
            lifecycle: ValueLifecycle::default(),
            env: Default::default(),
            options: CommandOptionsSource::Factory(factory),
            parse: None,
        };
        let mut inner = Schema::new();
        inner.push("recurse", OptionSpec::Command(cmd));
        *holder.borrow_mut() = Some(inner.clone());

        assert!(validate(&inner).is_ok());
    }
}
