//! The option registry (spec.md §4.1).
//!
//! Indexes a schema by long name, cluster letter, and positional slot, and
//! records each option's preferred display name. The registry is built
//! once and treated as read-only by the parser (spec.md §5).

use std::collections::HashMap;

use crate::error::Error;
use crate::schema::Schema;

/// `(key, preferred-name)` for the one positional option at this schema
/// level, if any.
#[derive(Clone, Debug)]
pub struct PositionalEntry {
    pub key: String,
    pub display_name: String,
}

/// The built index over a [`Schema`] (spec.md §4.1).
#[derive(Clone)]
pub struct Registry {
    schema: Schema,
    names: HashMap<String, String>,
    letters: HashMap<char, String>,
    positional: Option<PositionalEntry>,
}

impl Registry {
    /// Build a registry from a schema, in declaration order.
    ///
    /// Registration collisions (duplicate names, duplicate cluster
    /// letters, more than one positional) are recorded as errors rather
    /// than silently overwritten; the validator (spec.md §4.2) is
    /// responsible for surfacing them, so `build` returns the *first*
    /// collision it finds to let validation continue describing the rest
    /// of the schema in one pass when desired, while still being usable
    /// standalone.
    pub fn build(schema: &Schema) -> Result<Registry, Error> {
        let mut names = HashMap::new();
        let mut letters = HashMap::new();
        let mut positional = None;
        let mut schema = schema.clone();

        for (key, option) in schema.entries.iter_mut() {
            let mut effective_names: Vec<String> =
                option.common().names.iter().flatten().cloned().collect();
            if let Some(marker) = option.common().positional.marker() {
                effective_names.push(marker.to_string());
            }

            for name in &effective_names {
                if names.contains_key(name.as_str()) {
                    return Err(Error::DuplicateOptionName { name: name.clone() });
                }
                names.insert(name.clone(), key.clone());
            }

            if option.common().preferred_name.is_none() {
                if let Some(first) = option.common().first_name() {
                    option.common_mut().preferred_name = Some(first.to_string());
                }
            }

            for letter in option.common().cluster_letters.clone() {
                if letters.contains_key(&letter) {
                    return Err(Error::DuplicateClusterLetter { letter });
                }
                letters.insert(letter, key.clone());
            }

            if option.common().positional.is_positional() {
                if positional.is_some() {
                    return Err(Error::DuplicatePositionalOption);
                }
                let display_name = option.common().display_name().to_string();
                positional = Some(PositionalEntry { key: key.clone(), display_name });
            }
        }

        Ok(Registry { schema, names, letters, positional })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn lookup_name(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn lookup_letter(&self, letter: char) -> Option<&str> {
        self.letters.get(&letter).map(String::as_str)
    }

    pub fn positional(&self) -> Option<&PositionalEntry> {
        self.positional.as_ref()
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn cluster_letters(&self) -> impl Iterator<Item = char> + '_ {
        self.letters.keys().copied()
    }

    pub fn get(&self, key: &str) -> Option<&crate::schema::OptionSpec> {
        self.schema.get(key)
    }

    /// `required-by` adjacency: for each key, the keys whose `requires`
    /// expression references it (spec.md §4.1, "optionally ... for usage
    /// rendering").
    pub fn required_by(&self) -> HashMap<String, Vec<String>> {
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for (key, option) in &self.schema.entries {
            if let Some(lifecycle) = option.lifecycle() {
                if let Some(req) = &lifecycle.requires {
                    for target in req.referenced_names() {
                        if let Some(target_key) = self.lookup_name(target) {
                            adjacency.entry(target_key.to_string()).or_default().push(key.clone());
                        }
                    }
                }
            }
        }
        adjacency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommonAttrs, FlagOption, OptionSpec, Positional, SingleOption};

    fn flag(names: Vec<Option<&str>>) -> OptionSpec {
        OptionSpec::Flag(FlagOption { common: CommonAttrs::new(names), ..Default::default() })
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut schema = Schema::new();
        schema.push("a", flag(vec![Some("-x")]));
        schema.push("b", flag(vec![Some("-x")]));
        let err = Registry::build(&schema).unwrap_err();
        assert_eq!(err, Error::DuplicateOptionName { name: "-x".to_string() });
    }

    #[test]
    fn preferred_name_defaults_to_first_declared_name() {
        let mut schema = Schema::new();
        schema.push("a", flag(vec![None, Some("--alpha"), Some("-a")]));
        let registry = Registry::build(&schema).unwrap();
        assert_eq!(
            registry.get("a").unwrap().common().preferred_name.as_deref(),
            Some("--alpha")
        );
    }

    #[test]
    fn duplicate_positional_is_rejected() {
        let mut schema = Schema::new();
        let mut a = SingleOption { common: CommonAttrs::new(vec![Some("a")]), ..Default::default() };
        a.common.positional = Positional::Plain;
        let mut b = SingleOption { common: CommonAttrs::new(vec![Some("b")]), ..Default::default() };
        b.common.positional = Positional::Plain;
        schema.push("a", OptionSpec::Single(a));
        schema.push("b", OptionSpec::Single(b));
        let err = Registry::build(&schema).unwrap_err();
        assert_eq!(err, Error::DuplicatePositionalOption);
    }

    #[test]
    fn lookup_by_name_and_letter() {
        let mut schema = Schema::new();
        let mut opt = flag(vec![Some("--verbose"), Some("-v")]);
        opt.common_mut().cluster_letters.push('v');
        schema.push("verbose", opt);
        let registry = Registry::build(&schema).unwrap();
        assert_eq!(registry.lookup_name("--verbose"), Some("verbose"));
        assert_eq!(registry.lookup_letter('v'), Some("verbose"));
    }
}
