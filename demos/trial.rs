//! A runnable smoke test for `declarg`, in the spirit of the teacher's own
//! `examples/trial.rs`: a small multi-command CLI exercised by hand rather
//! than by `#[test]`.

use std::rc::Rc;

use declarg::prelude::*;

fn flag(names: Vec<Option<&str>>) -> OptionSpec {
    OptionSpec::Flag(FlagOption { common: CommonAttrs::new(names), ..Default::default() })
}

fn thing_list_schema() -> Schema {
    let mut schema = Schema::new();
    schema.push("number", OptionSpec::Single(SingleOption {
        common: CommonAttrs::new(vec![Some("-n"), Some("--number")]),
        lifecycle: ValueLifecycle { default: Some(DefaultValue::Literal(serde_json::json!("1"))), ..Default::default() },
        ..Default::default()
    }));
    schema
}

fn thing_schema() -> Schema {
    let mut schema = Schema::new();
    schema.push("list", OptionSpec::Command(CommandOption {
        common: CommonAttrs::new(vec![Some("list")]),
        lifecycle: ValueLifecycle::default(),
        env: Default::default(),
        options: CommandOptionsSource::Factory(Rc::new(thing_list_schema)),
        parse: None,
    }));
    schema
}

fn withreq_schema() -> Schema {
    let mut schema = Schema::new();
    let mut first = SingleOption { common: CommonAttrs::new(vec![Some("-a"), Some("--first")]), ..Default::default() };
    first.lifecycle.required = true;
    schema.push("first", OptionSpec::Single(first));
    let mut second = SingleOption { common: CommonAttrs::new(vec![Some("--second")]), ..Default::default() };
    second.lifecycle.required = true;
    schema.push("second", OptionSpec::Single(second));
    let extra = SingleOption { common: CommonAttrs::new(vec![Some("-x")]), ..Default::default() };
    schema.push("extra", OptionSpec::Single(extra));
    schema
}

fn root_schema() -> Schema {
    let mut schema = Schema::new();
    schema.push("verbose", flag(vec![Some("-v"), Some("--verbose")]));
    schema.push("thing", OptionSpec::Command(CommandOption {
        common: CommonAttrs::new(vec![Some("thing"), Some("th")]),
        lifecycle: ValueLifecycle::default(),
        env: Default::default(),
        options: CommandOptionsSource::Factory(Rc::new(thing_schema)),
        parse: None,
    }));
    schema.push("withreq", OptionSpec::Command(CommandOption {
        common: CommonAttrs::new(vec![Some("withreq")]),
        lifecycle: ValueLifecycle::default(),
        env: Default::default(),
        options: CommandOptionsSource::Factory(Rc::new(withreq_schema)),
        parse: None,
    }));
    schema
}

fn main() -> Result<(), Error> {
    let schema = root_schema();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ParseConfig::default();

    match parse_args(&schema, &args, &config)?.outcome {
        ParseOutcome::Values(values) => {
            if values.get("verbose").map(|v| v.as_bool().unwrap_or(false)).unwrap_or(false) {
                eprintln!("verbose mode on");
            }
            println!("{}", declarg::value::to_json(&values));
        }
        ParseOutcome::Message(Message::Help(text)) => print!("{text}"),
        ParseOutcome::Message(Message::Version(v)) => println!("{v}"),
        ParseOutcome::Message(Message::Completion(words)) => {
            for w in words {
                println!("{w}");
            }
        }
    }

    Ok(())
}
