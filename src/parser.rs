//! The parser state machine (spec.md §4.4) — the main loop that drives a
//! schema's registry over a tokenized argument stream, and the
//! end-of-input phases (default assignment, requirement checks) described
//! there and in §4.6.
//!
//! This module also hosts the small ambient pieces §4.4 leans on but that
//! don't belong in any other component: `version`'s package-manifest walk,
//! a minimal built-in text renderer backing the `help` niladic kind (real
//! formatter back-ends are external collaborators per spec.md §1 — this is
//! just enough text for `Message::Help` to carry something concrete), and
//! the quote-aware line splitter `parse_line` needs.

use std::collections::HashSet;
use std::io::Read;

use serde_json::Value as Json;
use slog::{debug, trace};
use strsim::normalized_levenshtein;

use crate::error::{CountPhrase, Error, Warning, WarningBag};
use crate::help::groups_by_label;
use crate::registry::Registry;
use crate::requirement;
use crate::schema::{
    CallbackContext, CommandOptionsSource, CompletionContext, DefaultValue, InlinePolicy, OptionKind,
    OptionSpec, Schema, Selector, Separator, VersionSource,
};
use crate::validator;
use crate::value::{self, Value, ValueMap};

/// A message the parser produces instead of a value mapping (spec.md §6:
/// "Message types thrown or saved").
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Help(String),
    Version(String),
    Completion(Vec<String>),
}

/// What a successful parse produced: either the value mapping, or a
/// message that would have been "thrown" in a language with exceptions
/// (spec.md §6).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Values(ValueMap),
    Message(Message),
}

/// A completed parse: the outcome plus any warnings accumulated along the
/// way (validator warnings and deprecation notices — spec.md §7:
/// "Warnings accumulate in a result record and are never thrown").
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub outcome: ParseOutcome,
    pub warnings: WarningBag,
}

/// The handful of knobs spec.md leaves to the caller: the cluster prefix
/// (spec.md §8: "Cluster prefix of empty string means clustering
/// disabled", modeled here as `None`) and a logger for the structured
/// traces described in SPEC_FULL.md §2.
#[derive(Clone)]
pub struct ParseConfig {
    pub cluster_prefix: Option<char>,
    pub logger: slog::Logger,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig { cluster_prefix: Some('-'), logger: slog::Logger::root(slog::Discard, slog::o!()) }
    }
}

/// Parse an already-split argument vector against `schema` (spec.md §6:
/// "ordered sequence of strings").
pub fn parse_args(schema: &Schema, args: &[String], config: &ParseConfig) -> Result<ParseResult, Error> {
    run(schema, args, None, config)
}

/// Parse a single command-line string, tokenized on whitespace
/// (quote-aware), with `completion_offset` expressed as a character offset
/// into `line` (spec.md §6, the "single command-line string" form).
pub fn parse_line(
    schema: &Schema,
    line: &str,
    completion_offset: Option<usize>,
    config: &ParseConfig,
) -> Result<ParseResult, Error> {
    let (words, spans) = split_line(line);
    let completion_index = completion_offset.map(|offset| {
        spans
            .iter()
            .position(|&(start, end)| offset >= start && offset <= end)
            .unwrap_or(words.len())
    });
    run(schema, &words, completion_index, config)
}

/// Quote-aware whitespace splitter. Returns each word together with its
/// `[start, end)` byte span in `line`, so a completion offset can be
/// mapped back to the word it falls within.
fn split_line(line: &str) -> (Vec<String>, Vec<(usize, usize)>) {
    let mut words = Vec::new();
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut start = None;
    let mut quote: Option<char> = None;

    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            None if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    spans.push((s, i));
                    words.push(std::mem::take(&mut current));
                }
            }
            None => {
                start.get_or_insert(i);
                current.push(c);
            }
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
        words.push(current);
    }
    (words, spans)
}

fn run(
    schema: &Schema,
    args: &[String],
    completion_index: Option<usize>,
    config: &ParseConfig,
) -> Result<ParseResult, Error> {
    let validated = validator::validate(schema)?;
    let mut warnings = validated.warnings;
    let registry = validated.registry;

    let tokens = crate::tokenizer::tokenize(args, &registry, config.cluster_prefix, completion_index)?;

    let mut ctx = RunCtx {
        registry: &registry,
        values: ValueMap::new(),
        specified: HashSet::new(),
        deprecated_seen: HashSet::new(),
        config,
    };

    enum St {
        Seeking,
        Collecting { key: String, invocation: String, window: Vec<String> },
    }

    let mut state = St::Seeking;
    let mut positional_started = false;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if token.completing {
            let collecting = match &state {
                St::Collecting { key, window, .. } => Some((key.clone(), window.len())),
                St::Seeking => None,
            };
            let words = complete(&token.event, &collecting, &ctx);
            return Ok(ParseResult { outcome: ParseOutcome::Message(Message::Completion(words)), warnings });
        }

        match &token.event {
            crate::tokenizer::Event::PositionalMarker => {
                if let St::Collecting { key, invocation, window } =
                    std::mem::replace(&mut state, St::Seeking)
                {
                    if close_window(&mut ctx, &key, &invocation, window, false, &mut warnings)? {
                        finish(&mut ctx, &mut warnings)?;
                        return Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings });
                    }
                }
                let rest: Vec<String> = tokens[i + 1..].iter().map(|t| t.raw.clone()).collect();
                if let Some(entry) = ctx.registry.positional().cloned() {
                    close_window(&mut ctx, &entry.key, &entry.display_name, rest, false, &mut warnings)?;
                }
                i = tokens.len();
                continue;
            }
            crate::tokenizer::Event::Known { key, invocation, inline } => {
                if let St::Collecting { key: ck, invocation: ci, window } =
                    std::mem::replace(&mut state, St::Seeking)
                {
                    if close_window(&mut ctx, &ck, &ci, window, false, &mut warnings)? {
                        finish(&mut ctx, &mut warnings)?;
                        return Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings });
                    }
                }

                let key = key.clone();
                let invocation = invocation.clone();
                let option = ctx.registry.get(&key).expect("tokenizer only emits known keys").clone();

                note_deprecated(&option, &mut ctx, &mut warnings);
                ctx.values.mark_undefined_if_absent(&key);

                if option.is_niladic() {
                    if let Some(outcome) =
                        dispatch_niladic(&mut ctx, &registry, &key, &invocation, inline.clone(), &tokens, &mut i, &mut warnings)?
                    {
                        return Ok(ParseResult { outcome, warnings });
                    }
                    state = St::Seeking;
                } else {
                    check_inline_policy(&option, &invocation, inline.is_some())?;
                    if let Some(inline_value) = inline {
                        ctx.specified.insert(key.clone());
                        let brk = close_window(&mut ctx, &key, &invocation, vec![inline_value.clone()], false, &mut warnings)?;
                        if brk {
                            finish(&mut ctx, &mut warnings)?;
                            return Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings });
                        }
                        state = St::Seeking;
                        i += 1;
                        continue;
                    }
                    ctx.specified.insert(key.clone());
                    let pc = option.param_count();
                    state = St::Collecting { key, invocation, window: Vec::new() };
                    if pc.max == Some(0) {
                        if let St::Collecting { key, invocation, window } =
                            std::mem::replace(&mut state, St::Seeking)
                        {
                            if close_window(&mut ctx, &key, &invocation, window, false, &mut warnings)? {
                                finish(&mut ctx, &mut warnings)?;
                                return Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings });
                            }
                        }
                    }
                }
            }
            crate::tokenizer::Event::Unknown(raw) => match std::mem::replace(&mut state, St::Seeking) {
                St::Seeking => {
                    if let Some(entry) = ctx.registry.positional().cloned() {
                        if !positional_started {
                            positional_started = true;
                            let option = ctx.registry.get(&entry.key).expect("registered key");
                            let pc = option.param_count();
                            let window = vec![raw.clone()];
                            if pc.max == Some(window.len()) {
                                let brk = close_window(
                                    &mut ctx,
                                    &entry.key,
                                    &entry.display_name,
                                    window,
                                    false,
                                    &mut warnings,
                                )?;
                                if brk {
                                    finish(&mut ctx, &mut warnings)?;
                                    return Ok(ParseResult {
                                        outcome: ParseOutcome::Values(ctx.values),
                                        warnings,
                                    });
                                }
                            } else {
                                state = St::Collecting {
                                    key: entry.key,
                                    invocation: entry.display_name,
                                    window,
                                };
                            }
                            i += 1;
                            continue;
                        }
                    }
                    return Err(unknown_option_error(raw, ctx.registry));
                }
                St::Collecting { key, invocation, mut window } => {
                    window.push(raw.clone());
                    let option = ctx.registry.get(&key).expect("registered key");
                    if option.param_count().max == Some(window.len()) {
                        let brk = close_window(&mut ctx, &key, &invocation, window, false, &mut warnings)?;
                        if brk {
                            finish(&mut ctx, &mut warnings)?;
                            return Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings });
                        }
                    } else {
                        state = St::Collecting { key, invocation, window };
                    }
                }
            },
        }
        i += 1;
    }

    // A completion index at or past the end of the token stream (no trailing
    // token was produced for it — an empty word after the last real argument)
    // never reaches the per-token check above, so it's handled here against
    // whatever state the loop left behind.
    if let Some(n) = completion_index {
        if n >= tokens.len() {
            let collecting = match &state {
                St::Collecting { key, window, .. } => Some((key.clone(), window.len())),
                St::Seeking => None,
            };
            let words = complete(&crate::tokenizer::Event::Unknown(String::new()), &collecting, &ctx);
            return Ok(ParseResult { outcome: ParseOutcome::Message(Message::Completion(words)), warnings });
        }
    }

    if let St::Collecting { key, invocation, window } = state {
        close_window(&mut ctx, &key, &invocation, window, false, &mut warnings)?;
    }

    finish(&mut ctx, &mut warnings)?;
    Ok(ParseResult { outcome: ParseOutcome::Values(ctx.values), warnings })
}

/// Threaded through the loop so helper functions aren't passed six
/// separate arguments apiece.
struct RunCtx<'a> {
    registry: &'a Registry,
    values: ValueMap,
    specified: HashSet<String>,
    deprecated_seen: HashSet<String>,
    config: &'a ParseConfig,
}

/// `inline` only has an effect when the option's max parameter count is
/// exactly one (spec.md §3 invariant, enforced here as the parse-time half
/// of the validator's `invalid-inline-constraint` warning); outside that,
/// an explicit `forbidden`/`required` policy is simply inert.
fn check_inline_policy(option: &OptionSpec, invocation: &str, has_inline: bool) -> Result<(), Error> {
    if option.param_count().max != Some(1) {
        return Ok(());
    }
    match (option.declared_inline_policy(), has_inline) {
        (Some(InlinePolicy::Forbidden), true) => {
            Err(Error::DisallowedInlineParameter { name: invocation.to_string() })
        }
        (Some(InlinePolicy::Required), false) => {
            Err(Error::MissingInlineParameter { name: invocation.to_string() })
        }
        _ => Ok(()),
    }
}

fn note_deprecated(option: &OptionSpec, ctx: &mut RunCtx, warnings: &mut WarningBag) {
    if let Some(notice) = &option.common().deprecated {
        let name = option.common().display_name().to_string();
        if ctx.deprecated_seen.insert(name.clone()) {
            warnings.push(Warning::DeprecatedOption { name, notice: Some(notice.clone()) });
        }
    }
}

/// Execute a niladic option (flag/command/help/version). Returns `Some`
/// when the outer loop should stop and return that outcome immediately
/// (command always terminates it; help/version do unless `saveMessage`).
fn dispatch_niladic(
    ctx: &mut RunCtx,
    registry: &Registry,
    key: &str,
    invocation: &str,
    inline: Option<String>,
    tokens: &[crate::tokenizer::Token],
    i: &mut usize,
    warnings: &mut WarningBag,
) -> Result<Option<ParseOutcome>, Error> {
    let option = ctx.registry.get(key).expect("registered key").clone();
    ctx.specified.insert(key.to_string());

    match option {
        OptionSpec::Flag(flag) => {
            let window: Vec<String> = inline.into_iter().collect();
            let json = if let Some(parse) = &flag.parse {
                parse(&window).map_err(|message| Error::CallbackFailed { name: invocation.to_string(), message })?
            } else {
                Json::Bool(true)
            };
            ctx.values.insert(key, Value::from(json));
            *i += flag.skip_count;
            Ok(None)
        }
        OptionSpec::Command(cmd) => {
            let inner = match &cmd.options {
                CommandOptionsSource::Inline(schema) => (**schema).clone(),
                CommandOptionsSource::Factory(f) => f(),
            };
            let remainder: Vec<String> = tokens[*i + 1..].iter().map(|t| t.raw.clone()).collect();
            let child = run(&inner, &remainder, None, ctx.config)?;
            warnings.extend(child.warnings);
            *i = tokens.len().saturating_sub(1);
            match child.outcome {
                ParseOutcome::Values(child_values) => {
                    let json = if let Some(parse) = &cmd.parse {
                        parse(child_values)
                    } else {
                        value::to_json(&child_values)
                    };
                    ctx.values.insert(key, Value::from(json));
                    finish(ctx, warnings)?;
                    Ok(Some(terminate_with_values(ctx)))
                }
                ParseOutcome::Message(m) => Ok(Some(ParseOutcome::Message(m))),
            }
        }
        OptionSpec::Help(help) => {
            let mut scope_registry = registry.clone();
            let mut j = *i + 1;
            if help.use_nested {
                while let Some(name_tok) = tokens.get(j) {
                    if let crate::tokenizer::Event::Unknown(name) = &name_tok.event {
                        if let Some(sub) = find_subcommand_with_help(&scope_registry, name) {
                            scope_registry = sub;
                            j += 1;
                            continue;
                        }
                    }
                    break;
                }
            }
            if help.use_format {
                if let Some(tok) = tokens.get(j) {
                    if let crate::tokenizer::Event::Unknown(name) = &tok.event {
                        if help.formats.iter().any(|(n, _)| n == name) {
                            j += 1;
                        }
                    }
                }
            }
            if help.use_filter {
                j = tokens.len();
            }
            *i = j.saturating_sub(1).max(*i);
            let text = render_help(&scope_registry);
            if help.save_message {
                ctx.values.insert(key, Value::Json(Json::String(text)));
                Ok(None)
            } else {
                Ok(Some(ParseOutcome::Message(Message::Help(text))))
            }
        }
        OptionSpec::Version(version) => {
            let text = match &version.source {
                Some(VersionSource::Literal(s)) => s.clone(),
                Some(VersionSource::Resolve(resolve)) => resolve_version(Some(resolve))?,
                None => resolve_version(None)?,
            };
            if version.save_message {
                ctx.values.insert(key, Value::Json(Json::String(text)));
                Ok(None)
            } else {
                Ok(Some(ParseOutcome::Message(Message::Version(text))))
            }
        }
        _ => unreachable!("dispatch_niladic only called for niladic kinds"),
    }
}

fn terminate_with_values(ctx: &mut RunCtx) -> ParseOutcome {
    ParseOutcome::Values(std::mem::take(&mut ctx.values))
}

fn find_subcommand_with_help(registry: &Registry, name: &str) -> Option<Registry> {
    for (key, option) in &registry.schema().entries {
        if let OptionSpec::Command(cmd) = option {
            let matches_name = option.common().names.iter().flatten().any(|n| n == name) || key == name;
            if matches_name {
                let inner = match &cmd.options {
                    CommandOptionsSource::Inline(schema) => (**schema).clone(),
                    CommandOptionsSource::Factory(f) => f(),
                };
                if let Ok(validated) = validator::validate(&inner) {
                    let has_help =
                        inner.entries.iter().any(|(_, o)| matches!(o.kind(), OptionKind::Help));
                    if has_help {
                        return Some(validated.registry);
                    }
                }
            }
        }
    }
    None
}

/// Close a parameter window (spec.md §4.4, "At window closure"). Returns
/// whether the option's `break` should terminate the outer loop.
fn close_window(
    ctx: &mut RunCtx,
    key: &str,
    invocation: &str,
    window: Vec<String>,
    completing: bool,
    warnings: &mut WarningBag,
) -> Result<bool, Error> {
    let option = ctx.registry.get(key).expect("registered key").clone();
    trace!(ctx.config.logger, "closing window"; "option" => invocation, "count" => window.len());

    let elements: Vec<String> = match &option {
        OptionSpec::Array(a) => match &a.separator {
            Some(sep) => window.iter().flat_map(|w| split_separator(w, sep)).collect(),
            None => window,
        },
        _ => window,
    };

    let pc = option.param_count();
    if !pc.contains(elements.len()) {
        return Err(Error::MismatchedParamCount {
            name: invocation.to_string(),
            expected: count_phrase(pc),
            got: elements.len(),
        });
    }

    if let Some(selector) = option.selector() {
        for el in &elements {
            match selector {
                Selector::Regex(re) => {
                    if !re.is_match(el) {
                        return Err(Error::RegexConstraintViolation {
                            name: invocation.to_string(),
                            value: el.clone(),
                        });
                    }
                }
                Selector::Choices(choices) => {
                    if !choices.contains(el) {
                        return Err(Error::ChoiceConstraintViolation {
                            name: invocation.to_string(),
                            value: el.clone(),
                        });
                    }
                }
            }
        }
    }

    ctx.specified.insert(key.to_string());

    match &option {
        OptionSpec::Single(s) => {
            let raw = elements.into_iter().next().unwrap_or_default();
            let json = apply_parse(&s.parse, &raw, &ctx.values, invocation, 0, completing)?;
            ctx.values.insert(key, Value::from(json));
        }
        OptionSpec::Array(a) => {
            let mut jsons = Vec::with_capacity(elements.len());
            for (idx, el) in elements.iter().enumerate() {
                jsons.push(apply_parse(&a.parse, el, &ctx.values, invocation, idx, completing)?);
            }
            if a.append {
                ctx.values.append_array(key, jsons);
            } else {
                ctx.values.insert(key, Value::Array(jsons));
            }
            if a.unique {
                if let Some(Value::Array(arr)) = ctx.values.get_mut(key) {
                    let mut seen = HashSet::new();
                    arr.retain(|v| seen.insert(v.to_string()));
                }
            }
            if let Some(limit) = a.limit {
                if let Some(Value::Array(arr)) = ctx.values.get(key) {
                    if arr.len() > limit {
                        return Err(Error::LimitConstraintViolation { name: invocation.to_string(), limit });
                    }
                }
            }
        }
        OptionSpec::Function(f) => {
            let json = if let Some(parse) = &f.parse {
                let callback_ctx = CallbackContext { invocation, index: 0, completing };
                parse(&elements, &ctx.values, callback_ctx)
                    .map_err(|message| Error::CallbackFailed { name: invocation.to_string(), message })?
            } else {
                Json::Array(elements.into_iter().map(Json::String).collect())
            };
            ctx.values.insert(key, Value::from(json));
        }
        _ => unreachable!("niladic kinds never reach close_window"),
    }

    note_deprecated(&option, ctx, warnings);

    let brk = option.env().map(|e| e.break_after).unwrap_or(false);
    if brk {
        debug!(ctx.config.logger, "break option closed, ending parse early"; "option" => invocation);
    }
    Ok(brk)
}

fn apply_parse(
    parse: &Option<crate::schema::ParseFn>,
    raw: &str,
    values: &ValueMap,
    invocation: &str,
    index: usize,
    completing: bool,
) -> Result<Json, Error> {
    match parse {
        Some(f) => {
            let ctx = CallbackContext { invocation, index, completing };
            f(raw, values, ctx).map_err(|message| Error::CallbackFailed { name: invocation.to_string(), message })
        }
        None => Ok(Json::String(raw.to_string())),
    }
}

fn split_separator(input: &str, sep: &Separator) -> Vec<String> {
    match sep {
        Separator::Char(c) => input.split(*c).map(str::to_string).collect(),
        Separator::Regex(re) => re.split(input).map(str::to_string).collect(),
    }
}

fn count_phrase(pc: crate::schema::ParamCount) -> CountPhrase {
    match (pc.min, pc.max) {
        (min, Some(max)) if min == max => CountPhrase::Exactly(min),
        (0, Some(max)) => CountPhrase::AtMost(max),
        (min, None) => CountPhrase::AtLeast(min),
        (min, Some(max)) => CountPhrase::Between(min, max),
    }
}

/// End-of-input: default assignment, then requirement checks (spec.md
/// §4.4 "End-of-input", §4.6 "Both phases may be parallelized across
/// keys"; here expressed as plain sequential iteration per SPEC_FULL.md
/// §5 since there is no IO concurrency to exploit without an async
/// runtime).
fn finish(ctx: &mut RunCtx, warnings: &mut WarningBag) -> Result<(), Error> {
    assign_defaults(ctx)?;
    check_requirements(ctx)?;
    Ok(())
}

fn assign_defaults(ctx: &mut RunCtx) -> Result<(), Error> {
    let entries = ctx.registry.schema().entries.clone();
    for (key, option) in &entries {
        let already_valued = matches!(ctx.values.get(key), Some(v) if !v.is_undefined());
        if already_valued {
            continue;
        }

        if let Some(env) = option.env() {
            if env.stdin {
                let mut buf = String::new();
                if std::io::stdin().read_to_string(&mut buf).is_ok() && !buf.is_empty() {
                    ctx.values.insert(key.clone(), Value::Str(buf.trim_end().to_string()));
                    ctx.specified.insert(key.clone());
                    continue;
                }
            }
            let mut resolved = false;
            for source in &env.sources {
                if let Some(path) = source.strip_prefix("file://") {
                    if let Ok(content) = std::fs::read_to_string(path) {
                        ctx.values.insert(key.clone(), Value::Str(content.trim_end().to_string()));
                        ctx.specified.insert(key.clone());
                        resolved = true;
                        break;
                    }
                } else if let Ok(v) = std::env::var(source) {
                    ctx.values.insert(key.clone(), Value::Str(v));
                    ctx.specified.insert(key.clone());
                    resolved = true;
                    break;
                }
            }
            if resolved {
                continue;
            }
        }

        if let Some(lifecycle) = option.lifecycle() {
            if let Some(default) = &lifecycle.default {
                let json = match default {
                    DefaultValue::Literal(j) => j.clone(),
                    DefaultValue::Callback(f) => f(),
                };
                ctx.values.insert(key.clone(), Value::from(json));
                continue;
            }
            if lifecycle.required {
                return Err(Error::MissingRequiredOption { name: option.common().display_name().to_string() });
            }
        }
    }
    Ok(())
}

fn check_requirements(ctx: &mut RunCtx) -> Result<(), Error> {
    let entries = ctx.registry.schema().entries.clone();
    let specified = &ctx.specified;
    let registry = ctx.registry;
    let values = &ctx.values;

    let is_specified = |name: &str| -> bool {
        registry.lookup_name(name).map(|k| specified.contains(k)).unwrap_or(false)
    };
    let get_value = |name: &str| -> Option<Value> {
        registry.lookup_name(name).and_then(|k| values.get(k)).cloned()
    };

    for (key, option) in &entries {
        let lifecycle = match option.lifecycle() {
            Some(l) => l,
            None => continue,
        };
        if specified.contains(key) {
            if let Some(req) = &lifecycle.requires {
                if !requirement::evaluate(req, values, &is_specified, &get_value) {
                    return Err(Error::UnsatisfiedRequirement {
                        name: option.common().display_name().to_string(),
                        rendered: requirement::render(req, false),
                    });
                }
            }
        } else if let Some(req) = &lifecycle.required_if {
            if requirement::evaluate(req, values, &is_specified, &get_value) {
                return Err(Error::UnsatisfiedConditionalRequirement {
                    name: option.common().display_name().to_string(),
                    rendered: requirement::render(req, false),
                });
            }
        }
    }
    Ok(())
}

/// Completion candidates for the word at the completing token (spec.md
/// §4.4 "Completion"). Errors from a custom `complete` callback are not
/// representable — the callback type is infallible by construction — so
/// the "swallow errors, return empty list" requirement is satisfied by
/// construction rather than by catching anything here.
///
/// `collecting` carries the option key currently gathering parameters
/// together with how many words its window has accumulated so far.
/// Per spec.md §4.4, name completions are only appended "if the
/// positional was active or the window has met its minimum" — mid-window
/// on a non-positional option, the word being completed is still a
/// parameter value, not an option name.
fn complete(
    event: &crate::tokenizer::Event,
    collecting: &Option<(String, usize)>,
    ctx: &RunCtx,
) -> Vec<String> {
    let word = match event {
        crate::tokenizer::Event::Unknown(w) => w.clone(),
        crate::tokenizer::Event::Known { invocation, .. } => invocation.clone(),
        crate::tokenizer::Event::PositionalMarker => String::new(),
    };

    if let Some((key, window_len)) = collecting {
        if let Some(option) = ctx.registry.get(key) {
            let mut out = Vec::new();
            if let Some(complete_fn) = complete_fn_of(option) {
                let completion_ctx =
                    CompletionContext { values: &ctx.values, index: 0, name: option.common().display_name(), prev: None };
                out = complete_fn(&word, completion_ctx);
            }
            let positional_active = ctx.registry.positional().map(|p| p.key.as_str()) == Some(key.as_str());
            let window_met_min = *window_len >= option.param_count().min;
            if positional_active || window_met_min {
                out.extend(name_completions(&word, ctx.registry));
            }
            return out;
        }
    }
    name_completions(&word, ctx.registry)
}

fn complete_fn_of(option: &OptionSpec) -> Option<crate::schema::CompleteFn> {
    match option {
        OptionSpec::Single(o) => o.param.complete.clone(),
        OptionSpec::Array(o) => o.param.complete.clone(),
        OptionSpec::Function(o) => o.param.complete.clone(),
        _ => None,
    }
}

fn name_completions(word: &str, registry: &Registry) -> Vec<String> {
    registry.all_names().filter(|n| n.starts_with(word)).map(str::to_string).collect()
}

/// `unknown-option` with did-you-mean suggestions (spec.md Design Notes
/// §9: "edit-distance ratio ≥ 0.6 against all registered names").
fn unknown_option_error(arg: &str, registry: &Registry) -> Error {
    let mut similar: Vec<String> = registry
        .all_names()
        .filter(|n| normalized_levenshtein(arg, n) >= 0.6)
        .map(str::to_string)
        .collect();
    similar.sort();
    Error::UnknownOption { name: arg.to_string(), similar }
}

/// Walk up from `./package.json`, calling `resolve` (or the default
/// "one more `../`" step) until the path stops changing, then read and
/// parse it (spec.md §4.4, "version"). No file handle persists past this
/// call (SPEC_FULL.md §2: "scoped-file-read helper").
fn resolve_version(resolve: Option<&crate::schema::VersionResolveFn>) -> Result<String, Error> {
    let mut path = "./package.json".to_string();
    loop {
        if std::path::Path::new(&path).is_file() {
            break;
        }
        let next = match resolve {
            Some(f) => f(&path),
            None => Some(format!("../{}", path.trim_start_matches("./"))),
        };
        match next {
            Some(n) if n != path => path = n,
            _ => return Err(Error::MissingPackageJson),
        }
    }
    let content = {
        let mut file = std::fs::File::open(&path).map_err(|_| Error::MissingPackageJson)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(|_| Error::MissingPackageJson)?;
        buf
    };
    let json: Json = serde_json::from_str(&content).map_err(|_| Error::MissingPackageJson)?;
    json.get("version")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or(Error::MissingPackageJson)
}

/// A minimal built-in text renderer over the help.rs contract — good
/// enough to give `Message::Help` something concrete to carry. Modeled on
/// the teacher's own `Level::gen_usage` (usage line, then one row per
/// option, grouped).
fn render_help(registry: &Registry) -> String {
    let mut out = String::new();
    for (label, options) in groups_by_label(registry) {
        out.push_str(&format!("{}:\n", label.as_deref().unwrap_or("Options")));
        for option in options {
            let names: Vec<&str> = option.common().names.iter().flatten().map(String::as_str).collect();
            out.push_str(&format!("    {:<24} {}\n", names.join(", "), option.common().synopsis.as_deref().unwrap_or("")));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ArrayOption, CommonAttrs, FlagOption, OptionSpec, Positional, SingleOption, ValueLifecycle,
    };

    fn flag(names: Vec<Option<&str>>) -> OptionSpec {
        OptionSpec::Flag(FlagOption { common: CommonAttrs::new(names), ..Default::default() })
    }

    fn schema_with(entries: Vec<(&str, OptionSpec)>) -> Schema {
        let mut schema = Schema::new();
        for (key, opt) in entries {
            schema.push(key, opt);
        }
        schema
    }

    fn values_of(result: ParseResult) -> ValueMap {
        match result.outcome {
            ParseOutcome::Values(v) => v,
            ParseOutcome::Message(m) => panic!("expected values, got message: {:?}", m),
        }
    }

    #[test]
    fn minimal_flag_present_and_absent() {
        let schema = schema_with(vec![("f", flag(vec![Some("-f"), Some("--flag")]))]);
        let config = ParseConfig::default();

        let values = values_of(parse_args(&schema, &["-f".to_string()], &config).unwrap());
        assert_eq!(values.get("f"), Some(&Value::Bool(true)));

        let values = values_of(parse_args(&schema, &["--flag".to_string()], &config).unwrap());
        assert_eq!(values.get("f"), Some(&Value::Bool(true)));

        let values = values_of(parse_args(&schema, &[], &config).unwrap());
        assert!(values.get("f").map(Value::is_undefined).unwrap_or(true));
    }

    #[test]
    fn required_single_with_choices() {
        let mut n = SingleOption { common: CommonAttrs::new(vec![Some("-n")]), ..Default::default() };
        n.lifecycle.required = true;
        n.selector = Some(Selector::Choices(vec!["a".to_string(), "b".to_string()]));
        let schema = schema_with(vec![("n", OptionSpec::Single(n))]);
        let config = ParseConfig::default();

        let values = values_of(
            parse_args(&schema, &["-n".to_string(), "a".to_string()], &config).unwrap(),
        );
        assert_eq!(values.get("n").unwrap().as_str(), Some("a"));

        let err = parse_args(&schema, &["-n".to_string(), "c".to_string()], &config).unwrap_err();
        assert_eq!(err, Error::ChoiceConstraintViolation { name: "-n".to_string(), value: "c".to_string() });

        let err = parse_args(&schema, &[], &config).unwrap_err();
        assert_eq!(err, Error::MissingRequiredOption { name: "-n".to_string() });
    }

    #[test]
    fn array_with_separator_append_unique() {
        let a = ArrayOption {
            common: CommonAttrs::new(vec![Some("-a")]),
            separator: Some(Separator::Char(',')),
            unique: true,
            append: true,
            ..Default::default()
        };
        let schema = schema_with(vec![("a", OptionSpec::Array(a))]);
        let config = ParseConfig::default();

        let values = values_of(
            parse_args(
                &schema,
                &["-a".to_string(), "1,2".to_string(), "-a".to_string(), "2,3".to_string()],
                &config,
            )
            .unwrap(),
        );
        let arr: Vec<&str> = values.get("a").unwrap().as_array().unwrap().iter().map(|j| j.as_str().unwrap()).collect();
        assert_eq!(arr, vec!["1", "2", "3"]);
    }

    #[test]
    fn cluster_of_niladic_flags() {
        let mut f = FlagOption { common: CommonAttrs::new(vec![Some("-f")]), ..Default::default() };
        f.common.cluster_letters.push('f');
        let mut g = FlagOption { common: CommonAttrs::new(vec![Some("-g")]), ..Default::default() };
        g.common.cluster_letters.push('g');
        let schema = schema_with(vec![("f", OptionSpec::Flag(f)), ("g", OptionSpec::Flag(g))]);
        let config = ParseConfig::default();

        let values = values_of(parse_args(&schema, &["-fg".to_string()], &config).unwrap());
        assert_eq!(values.get("f"), Some(&Value::Bool(true)));
        assert_eq!(values.get("g"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_letter_after_cluster_is_unknown_option() {
        let mut g = FlagOption { common: CommonAttrs::new(vec![Some("-g")]), ..Default::default() };
        g.common.cluster_letters.push('g');
        let schema = schema_with(vec![("g", OptionSpec::Flag(g))]);
        let config = ParseConfig::default();
        let err = parse_args(&schema, &["-gx".to_string()], &config).unwrap_err();
        assert!(matches!(err, Error::UnknownOption { name, .. } if name == "x"));
    }

    #[test]
    fn requirement_expression_failure_and_success() {
        let mut a = FlagOption { common: CommonAttrs::new(vec![Some("-a")]), ..Default::default() };
        a.lifecycle.requires = Some(crate::requirement::Requirement::ValMap(vec![(
            "-b".to_string(),
            crate::requirement::RequiredValue::Equals(Json::String("x".to_string())),
        )]));
        let b = SingleOption { common: CommonAttrs::new(vec![Some("-b")]), ..Default::default() };
        let schema = schema_with(vec![("a", OptionSpec::Flag(a)), ("b", OptionSpec::Single(b))]);
        let config = ParseConfig::default();

        let err = parse_args(&schema, &["-a".to_string()], &config).unwrap_err();
        assert!(matches!(err, Error::UnsatisfiedRequirement { .. }));

        let values = values_of(
            parse_args(&schema, &["-a".to_string(), "-b".to_string(), "x".to_string()], &config).unwrap(),
        );
        assert_eq!(values.get("a"), Some(&Value::Bool(true)));
    }

    #[test]
    fn nested_command_dispatch() {
        let inner_flag = flag(vec![Some("-f")]);
        let mut inner = Schema::new();
        inner.push("f", inner_flag);
        let cmd = crate::schema::CommandOption {
            common: CommonAttrs::new(vec![Some("c")]),
            lifecycle: ValueLifecycle::default(),
            env: Default::default(),
            options: CommandOptionsSource::Inline(std::rc::Rc::new(inner)),
            parse: None,
        };
        let schema = schema_with(vec![("cmd", OptionSpec::Command(cmd))]);
        let config = ParseConfig::default();

        let values = values_of(parse_args(&schema, &["c".to_string(), "-f".to_string()], &config).unwrap());
        let child = values.get("cmd").unwrap();
        assert_eq!(child.as_str(), None);
        if let Value::Json(Json::Object(map)) = child {
            assert_eq!(map.get("f"), Some(&Json::Bool(true)));
        } else {
            panic!("expected a json object for the nested command value");
        }

        let values = values_of(parse_args(&schema, &["c".to_string()], &config).unwrap());
        if let Value::Json(Json::Object(map)) = values.get("cmd").unwrap() {
            assert!(map.get("f").map(|v| v.is_null()).unwrap_or(true));
        }
    }

    #[test]
    fn positional_marker_captures_remaining_verbatim() {
        let mut positional = SingleOption { common: CommonAttrs::new(vec![Some("--path")]), ..Default::default() };
        positional.common.positional = Positional::Marker("--".to_string());
        let schema = schema_with(vec![("path", OptionSpec::Single(positional))]);
        let config = ParseConfig::default();

        let values = values_of(
            parse_args(&schema, &["--".to_string(), "-f".to_string()], &config).unwrap(),
        );
        assert_eq!(values.get("path").unwrap().as_str(), Some("-f"));
    }

    #[test]
    fn forbidden_inline_is_rejected_and_required_inline_is_enforced() {
        let mut forbids = SingleOption { common: CommonAttrs::new(vec![Some("--mode")]), ..Default::default() };
        forbids.param.inline = Some(crate::schema::InlinePolicy::Forbidden);
        let mut requires = SingleOption { common: CommonAttrs::new(vec![Some("--level")]), ..Default::default() };
        requires.param.inline = Some(crate::schema::InlinePolicy::Required);
        let schema = schema_with(vec![
            ("mode", OptionSpec::Single(forbids)),
            ("level", OptionSpec::Single(requires)),
        ]);
        let config = ParseConfig::default();

        let err =
            parse_args(&schema, &["--mode=fast".to_string()], &config).unwrap_err();
        assert_eq!(err, Error::DisallowedInlineParameter { name: "--mode".to_string() });

        let err =
            parse_args(&schema, &["--level".to_string(), "5".to_string()], &config).unwrap_err();
        assert_eq!(err, Error::MissingInlineParameter { name: "--level".to_string() });

        let values = values_of(
            parse_args(&schema, &["--level=5".to_string()], &config).unwrap(),
        );
        assert_eq!(values.get("level").unwrap().as_str(), Some("5"));
    }

    #[test]
    fn command_dispatch_enforces_outer_required_option() {
        let inner_flag = flag(vec![Some("-f")]);
        let mut inner = Schema::new();
        inner.push("f", inner_flag);
        let cmd = crate::schema::CommandOption {
            common: CommonAttrs::new(vec![Some("c")]),
            lifecycle: ValueLifecycle::default(),
            env: Default::default(),
            options: CommandOptionsSource::Inline(std::rc::Rc::new(inner)),
            parse: None,
        };
        let mut outer = SingleOption { common: CommonAttrs::new(vec![Some("-n")]), ..Default::default() };
        outer.lifecycle.required = true;
        let schema = schema_with(vec![("n", OptionSpec::Single(outer)), ("cmd", OptionSpec::Command(cmd))]);
        let config = ParseConfig::default();

        // `-n` is required on the outer schema but never supplied; entering
        // the `c` subcommand must still trip that check rather than
        // terminating the parse silently.
        let err = parse_args(&schema, &["c".to_string()], &config).unwrap_err();
        assert_eq!(err, Error::MissingRequiredOption { name: "-n".to_string() });

        let values = values_of(
            parse_args(&schema, &["-n".to_string(), "x".to_string(), "c".to_string()], &config).unwrap(),
        );
        assert_eq!(values.get("n").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn completion_mid_window_withholds_name_completions_until_minimum_met() {
        let trio = crate::schema::FunctionOption {
            common: CommonAttrs::new(vec![Some("--trio")]),
            param_count: crate::schema::ParamCount::range(2, 3),
            ..Default::default()
        };
        let schema = schema_with(vec![
            ("trio", OptionSpec::Function(trio)),
            ("flag", flag(vec![Some("--other")])),
        ]);
        let config = ParseConfig::default();

        // One word into a window whose minimum is two: the completed word is
        // still a parameter value, so `--other` must not leak in.
        let result = parse_line(&schema, "--trio first ", Some(13), &config).unwrap();
        match result.outcome {
            ParseOutcome::Message(Message::Completion(words)) => assert!(words.is_empty()),
            other => panic!("expected completion message, got {:?}", other),
        }

        // Two words in: the window has met its minimum (but the option's max
        // of three keeps it open), so name completions resume.
        let result = parse_line(&schema, "--trio first second ", Some(20), &config).unwrap();
        match result.outcome {
            ParseOutcome::Message(Message::Completion(words)) => {
                assert!(words.iter().any(|w| w == "--other"));
            }
            other => panic!("expected completion message, got {:?}", other),
        }
    }

    #[test]
    fn completion_at_empty_token_lists_all_names() {
        let schema = schema_with(vec![("f", flag(vec![Some("--flag")]))]);
        let config = ParseConfig::default();
        let result = parse_line(&schema, "", Some(0), &config).unwrap();
        match result.outcome {
            ParseOutcome::Message(Message::Completion(words)) => {
                assert_eq!(words, vec!["--flag".to_string()]);
            }
            other => panic!("expected completion message, got {:?}", other),
        }
    }
}
