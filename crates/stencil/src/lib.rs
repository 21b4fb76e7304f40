//! Render text templates in one of three syntaxes.
//!
//! Stencil takes a template and a flat map of string variables, and renders
//! the template with one of:
//!
//! - **mustache** (the default): `Hello {{name}}!`, see [`mustache`].
//! - **go**: Go's `text/template`, `Hello {{.name}}!`, see [`gotemplate`].
//! - **colon**: plain substitution, `Hello :name!`, see [`colon`].
//!
//! # Usage
//!
//! Collect the variables into a [`VariableMap`]:
//!
//! ```
//! use stencil::VariableMap;
//!
//! let values: VariableMap = [("name", "World")].into_iter().collect();
//! ```
//!
//! Then pick a [`Syntax`] and render:
//!
//! ```
//! # use stencil::VariableMap;
//! use stencil::{render, Syntax};
//! #
//! # let values: VariableMap = [("name", "World")].into_iter().collect();
//! assert_eq!(
//!     render(Syntax::Mustache, "Hello {{name}}!", &values).unwrap(),
//!     "Hello World!",
//! );
//! assert_eq!(
//!     render(Syntax::GoTemplate, "Hello {{.name}}!", &values).unwrap(),
//!     "Hello World!",
//! );
//! assert_eq!(
//!     render(Syntax::Colon, "Hello :name!", &values).unwrap(),
//!     "Hello World!",
//! );
//! ```
//!
//! Syntax names are parsed case-insensitively, with some aliases:
//!
//! ```
//! use stencil::Syntax;
//!
//! assert_eq!("gotemplate".parse::<Syntax>().unwrap(), Syntax::GoTemplate);
//! assert_eq!("moustache".parse::<Syntax>().unwrap(), Syntax::Mustache);
//! assert!("jinja".parse::<Syntax>().is_err());
//! ```
//!
//! Templates with invalid syntax fail with a [`ParseError`] naming the line,
//! and rendering never returns partial output:
//!
//! ```
//! # use stencil::{render, Syntax, VariableMap, RenderError};
//! let err = render(Syntax::Mustache, "Hello {{name", &VariableMap::new()).unwrap_err();
//! assert!(matches!(err, RenderError::InvalidTemplate(_)));
//! assert_eq!(err.to_string(), "mustache template, line 1: unclosed tag");
//! ```
//!
//! # Errors
//!
//! Errors implement [`miette::Diagnostic`], so parse errors can be shown with
//! the offending spot of the template highlighted.

#[doc(inline)]
pub use error::*;

#[doc(inline)]
pub use syntax::*;

#[doc(inline)]
pub use values::*;

pub mod colon;
pub mod gotemplate;
pub mod mustache;

mod error;
mod escape;
mod syntax;
mod values;
