//! `declarg` — a declarative, schema-driven command-line argument parser.
//!
//! A schema is built up as data (a [`Schema`] of named [`OptionSpec`]
//! entries) rather than through a builder of imperative `optopt`/`optflag`
//! calls; the parser, validator, tokenizer, and help renderer all walk that
//! same structure. See the crate's design notes for the rationale.
//!
//! ```no_run
//! use declarg::prelude::*;
//!
//! let mut schema = Schema::new();
//! schema.push("verbose", OptionSpec::Flag(FlagOption {
//!     common: CommonAttrs::new(vec![Some("-v"), Some("--verbose")]),
//!     ..Default::default()
//! }));
//!
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let result = parse_args(&schema, &args, &ParseConfig::default())?;
//! # Ok::<(), Error>(())
//! ```

pub mod error;
pub mod help;
pub mod parser;
pub mod registry;
pub mod requirement;
pub mod schema;
pub mod tokenizer;
pub mod validator;
pub mod value;

pub mod prelude {
    pub use crate::error::{CountPhrase, Error, Warning, WarningBag};
    pub use crate::help::{Alignment, Column, ColumnModel, HelpItem, Section, SectionKind};
    pub use crate::parser::{
        parse_args, parse_line, Message, ParseConfig, ParseOutcome, ParseResult,
    };
    pub use crate::registry::{PositionalEntry, Registry};
    pub use crate::requirement::{RequiredValue, Requirement};
    pub use crate::schema::{
        ArrayOption, CallbackContext, CommandOption, CommandOptionsSource, CommonAttrs,
        CompletionContext, DefaultValue, EnvAttrs, FlagOption, FunctionOption, GroupLabel,
        HelpOption, InlinePolicy, OptionKind, OptionSpec, ParamAttrs, ParamCount, Positional,
        Schema, Selector, Separator, SingleOption, ValueLifecycle, VersionOption, VersionSource,
    };
    pub use crate::validator::{validate, Validated};
    pub use crate::value::{Value, ValueMap, ValueMapView};
}

pub use error::{Error, Warning, WarningBag};
pub use parser::{parse_args, parse_line, Message, ParseConfig, ParseOutcome, ParseResult};
pub use registry::Registry;
pub use schema::{OptionSpec, Schema};
pub use validator::{validate, Validated};
pub use value::{Value, ValueMap};
