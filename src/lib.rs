//! # Yarrow
//!
//! Bytecode compiler and backtracking interpreter for ECMAScript-5 regular
//! expressions, after the design of the Yarr engine.
//!
//! A pattern is parsed into a syntax tree, lowered into a flat program of
//! [`regint::ByteTerm`]s, and run by a backtracking interpreter that keeps
//! every bit of backtrack state in a per-call arena. A match-limit governor
//! bounds the work of a single call, so catastrophic patterns fail with an
//! error instead of running forever.
//!
//! ## Quick Start
//!
//! ```rust
//! use yarrow::prelude::*;
//!
//! let re = Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap();
//! let m = re.find("Date: 2026-02-12").unwrap();
//! assert_eq!(m.as_str(), "2026-02-12");
//! assert_eq!(m.start(), 6);
//! ```
//!
//! For fine-grained control, use [`RegexBuilder`](api::RegexBuilder):
//!
//! ```rust
//! use yarrow::prelude::*;
//!
//! let re = Regex::builder(r"hello")
//!     .case_insensitive(true)
//!     .match_limit(10_000)
//!     .build()
//!     .unwrap();
//! assert!(re.is_match("Hello World"));
//! ```
//!
//! ## Low-Level API
//!
//! The pipeline stages are available directly:
//!
//! ```rust
//! use yarrow::regcomp::byte_compile;
//! use yarrow::regdefs::{RegexFlags, OFFSET_NO_MATCH};
//! use yarrow::regenc::Input;
//! use yarrow::regexec::interpret;
//! use yarrow::regparse::parse;
//!
//! let tree = parse(r"(\d+)-(\d+)", RegexFlags::empty()).unwrap();
//! let program = byte_compile(&tree).unwrap();
//!
//! let mut output = program.new_output();
//! let start = interpret(&program, Input::Narrow(b"tel 555-0100"), 0, &mut output).unwrap();
//!
//! assert_ne!(start, OFFSET_NO_MATCH);
//! assert_eq!(&output[..], &[4, 12, 4, 7, 8, 12]);
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`regparse`] | Pattern parser and tree optimizations |
//! | [`regparse_types`] | Syntax tree and character classes |
//! | [`regcomp`] | Tree-to-bytecode compiler |
//! | [`regint`] | Bytecode program model |
//! | [`regexec`] | Backtracking interpreter |
//! | [`regenc`] | Code units and the input cursor |
//! | [`arena`] | Backtrack frame pool |
//! | [`regdefs`] | Flags, results, limits |
//! | [`regerror`] | Syntax error codes |
//! | [`unicode`] | Canonicalization and built-in classes |

pub mod api;
pub mod arena;
pub mod error;
pub mod prelude;
pub mod regcomp;
pub mod regdefs;
pub mod regenc;
pub mod regerror;
pub mod regexec;
pub mod regint;
pub mod regparse;
pub mod regparse_types;
pub mod unicode;
