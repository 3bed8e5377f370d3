//! The argument tokenizer and cluster expander (spec.md §4.3).
//!
//! Converts a raw argument vector into a stream of classified [`Token`]s.
//! Cluster expansion is implemented by rewriting the argument stream in
//! place (splicing recognized letters back in as their full names) rather
//! than tracked out-of-band, mirroring spec.md's own description ("the
//! stream is rewritten rather than tracked separately").

use std::collections::VecDeque;

use crate::error::Error;
use crate::registry::Registry;

/// One classified element of the rewritten argument stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A recognized option name, with its inline value if `name=value` or
    /// a cluster splice supplied one. `invocation` is the literal alias the
    /// caller typed (or that cluster expansion spliced in), for use in
    /// diagnostics and `CallbackContext::invocation`.
    Known { key: String, invocation: String, inline: Option<String> },
    /// The positional marker token; everything after it is raw positional
    /// text until the end of input.
    PositionalMarker,
    /// An argument that matched no registered name.
    Unknown(String),
}

/// A classified argument together with whether it sits at the caller's
/// completion index.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub event: Event,
    pub completing: bool,
    /// The literal text of this argument *after* cluster expansion — used
    /// by the parser to slice the raw remainder of the stream when a
    /// `command` option hands off to a child parse (spec.md §4.4: "parse
    /// the remainder recursively").
    pub raw: String,
}

/// Tokenize `args` against `registry`. `cluster_prefix` of `None` disables
/// cluster expansion entirely (spec.md §8: "cluster prefix of empty string
/// means clustering disabled"). `completion_index` is the index into the
/// *rewritten* stream the caller has already resolved its character offset
/// against (see `parser::resolve_completion_index`).
pub fn tokenize(
    args: &[String],
    registry: &Registry,
    cluster_prefix: Option<char>,
    completion_index: Option<usize>,
) -> Result<Vec<Token>, Error> {
    let expanded = expand_clusters(args, registry, cluster_prefix)?;
    let mut out = Vec::with_capacity(expanded.len());
    let mut positional_mode = false;

    for (i, arg) in expanded.iter().enumerate() {
        let completing = completion_index == Some(i);
        if positional_mode {
            out.push(Token { event: Event::Unknown(arg.clone()), completing, raw: arg.clone() });
            continue;
        }
        let event = classify(arg, registry);
        if matches!(event, Event::PositionalMarker) {
            positional_mode = true;
        }
        out.push(Token { event, completing, raw: arg.clone() });
    }

    Ok(out)
}

fn classify(arg: &str, registry: &Registry) -> Event {
    if let Some(entry) = registry.positional() {
        if let Some(opt) = registry.get(&entry.key) {
            if let Some(marker) = opt.common().positional.marker() {
                if arg == marker {
                    return Event::PositionalMarker;
                }
            }
        }
    }

    if let Some((name, value)) = arg.split_once('=') {
        if let Some(key) = registry.lookup_name(name) {
            return Event::Known {
                key: key.to_string(),
                invocation: name.to_string(),
                inline: Some(value.to_string()),
            };
        }
    }

    match registry.lookup_name(arg) {
        Some(key) => Event::Known { key: key.to_string(), invocation: arg.to_string(), inline: None },
        None => Event::Unknown(arg.to_string()),
    }
}

/// Rewrite `args`, splicing each recognized cluster into its expanded
/// names (spec.md §4.3, step 1), in a single left-to-right pass that stops
/// expanding the instant the positional marker is seen — spec.md §4.4,
/// positional-marker: "cluster expansion is suppressed" for everything
/// after it. Without this, the marker wouldn't be known until a later,
/// separate classification pass, by which point the clustered splice has
/// already happened to arguments that should have been passed through
/// verbatim.
fn expand_clusters(
    args: &[String],
    registry: &Registry,
    cluster_prefix: Option<char>,
) -> Result<Vec<String>, Error> {
    let prefix = match cluster_prefix {
        Some(c) => c,
        None => return Ok(args.to_vec()),
    };

    let marker = registry
        .positional()
        .and_then(|entry| registry.get(&entry.key))
        .and_then(|opt| opt.common().positional.marker().map(str::to_string));

    let mut out = Vec::with_capacity(args.len());
    let mut queue: VecDeque<String> = args.iter().cloned().collect();
    let mut seen_marker = false;

    while let Some(arg) = queue.pop_front() {
        if seen_marker {
            out.push(arg);
            continue;
        }
        if marker.as_deref() == Some(arg.as_str()) {
            seen_marker = true;
            out.push(arg);
            continue;
        }
        match try_expand_one(&arg, registry, prefix, &mut queue)? {
            Some(spliced) => out.extend(spliced),
            None => out.push(arg),
        }
    }

    Ok(out)
}

/// Attempt to expand a single argument as a cluster. Returns `None` when
/// `arg` is not a cluster candidate at all (no prefix, empty body, or the
/// very first body character is unrecognized). May consume further items
/// from `queue` to satisfy a non-final single-parameter option's reserved
/// argument.
fn try_expand_one(
    arg: &str,
    registry: &Registry,
    prefix: char,
    queue: &mut VecDeque<String>,
) -> Result<Option<Vec<String>>, Error> {
    let mut chars = arg.chars();
    if chars.next() != Some(prefix) {
        return Ok(None);
    }
    let rest: Vec<char> = chars.collect();
    if rest.is_empty() {
        return Ok(None);
    }

    let split_at = rest
        .iter()
        .position(|c| registry.lookup_letter(*c).is_none())
        .unwrap_or(rest.len());

    if split_at == 0 {
        return Ok(None);
    }

    if split_at < rest.len() {
        return Ok(Some(splice_partial_cluster(&rest[..split_at], &rest[split_at..], registry)));
    }

    splice_full_cluster(&rest, registry, queue).map(Some)
}

fn name_for_letter(letter: char, registry: &Registry) -> String {
    let key = registry.lookup_letter(letter).expect("recognized letter");
    registry.get(key).expect("registered key").common().display_name().to_string()
}

/// `rest` splits into a recognized prefix of letters and a non-letter
/// remainder; the remainder becomes either an inline value for the last
/// clustered option (if it takes parameters) or a standalone following
/// argument (if it's niladic — a niladic option has no parameter slot for
/// the remainder to attach to, so it is left for the next `Seeking`
/// transition to classify on its own, e.g. as `unknown-option`).
fn splice_partial_cluster(letters: &[char], remainder: &[char], registry: &Registry) -> Vec<String> {
    let remainder: String = remainder.iter().collect();
    let (last, leading) = letters.split_last().expect("non-empty cluster prefix");

    let mut result: Vec<String> = leading.iter().map(|&c| name_for_letter(c, registry)).collect();

    let last_key = registry.lookup_letter(*last).expect("recognized letter");
    let last_option = registry.get(last_key).expect("registered key");
    let last_name = last_option.common().display_name().to_string();

    if last_option.is_niladic() {
        result.push(last_name);
        result.push(remainder);
    } else {
        result.push(format!("{last_name}={remainder}"));
    }
    result
}

/// Every character in `letters` is a recognized cluster letter. Each but
/// the last must be niladic or take at most one parameter; a non-final
/// single-parameter option reserves that many subsequent stream arguments
/// (spec.md §4.3, step 1).
fn splice_full_cluster(
    letters: &[char],
    registry: &Registry,
    queue: &mut VecDeque<String>,
) -> Result<Vec<String>, Error> {
    let mut result = Vec::with_capacity(letters.len());
    let last_index = letters.len() - 1;

    for (idx, &letter) in letters.iter().enumerate() {
        let key = registry.lookup_letter(letter).expect("recognized letter").to_string();
        let option = registry.get(&key).expect("registered key");
        let name = option.common().display_name().to_string();

        if idx == last_index {
            result.push(name);
            continue;
        }

        let pc = option.param_count();
        if !(option.is_niladic() || pc.max == Some(1)) {
            return Err(Error::InvalidClusterOption { letter });
        }
        result.push(name);
        if !option.is_niladic() && pc.min > 0 {
            for _ in 0..pc.min {
                if let Some(reserved) = queue.pop_front() {
                    result.push(reserved);
                }
            }
        }
    }

    Ok(result)
}
