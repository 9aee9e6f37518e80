//! Diagnostic messages: every way a run can fail, and how each renders
//! as a [`Diagnostic`].
//!
//! Unlike the bidirectional elaborator it reports on, this type owns its
//! strings outright rather than borrowing from the [`Module`](crate::core::Module)
//! being elaborated — by the time a [`Message`] is built the run is already
//! unwinding, and there is no value in threading a lifetime through the
//! driver just to save a handful of `String` allocations on the error path.

use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::core::store::StoreError;
use crate::lexer::LexError;

/// A file-scoped diagnostic: `file` indexes the [`codespan_reporting::files::SimpleFiles`]
/// table the driver accumulates one entry per included source file into.
#[derive(Clone, Debug)]
pub struct Message {
    pub file: usize,
    pub kind: MessageKind,
}

#[derive(Clone, Debug)]
pub enum MessageKind {
    /// A byte sequence matched no token.
    Lex { range: Range<usize> },
    /// A token did not fit the grammar at the point it was found.
    UnexpectedToken { range: Range<usize>, found: String, expected: &'static str },
    /// Input ended where at least one more token was required.
    UnexpectedEof { expected: &'static str },
    /// A name did not resolve to any declared family, constructor,
    /// destructor, or parameter.
    UnknownName { range: Range<usize>, name: String },
    /// A name that must be fresh in its scope was already in use.
    DuplicateName { range: Range<usize>, name: String },
    /// An elaborated expression's type did not match the type it was
    /// checked against.
    TypeMismatch { range: Range<usize>, expected: String, found: String },
    /// A destructor chain was applied to something whose type did not
    /// reduce to a `Construction` (can only happen on ill-formed rule
    /// return types — every well-typed program's caller types do).
    ExpectedConstruction { range: Range<usize> },
    /// A destructor fired on a constructor whose rule is still unspecified.
    UnspecifiedRule { range: Range<usize>, family: String, constructor: String, destructor: String },
    /// A rule was declared twice for the same constructor/destructor pair.
    RuleAlreadySpecified { range: Range<usize>, constructor: String, destructor: String },
    /// `validate` found a gap left in a matrix's rule table at the end of a run.
    Unimplemented { family: String, constructor: String, destructor: String },
    /// An included path could not be opened, or was neither a file nor a directory.
    Io { path: String, error: String },
    /// The `?` query form: not an error, but reported the same way since it
    /// also aborts elaboration of the statement it appears in.
    Query { range: Range<usize>, help: String },
}

impl Message {
    pub fn lex(file: usize, error: LexError) -> Message {
        Message { file, kind: MessageKind::Lex { range: error.range } }
    }

    pub fn unspecified_rule(
        file: usize,
        range: Range<usize>,
        family: String,
        constructor: String,
        destructor: String,
    ) -> Message {
        Message { file, kind: MessageKind::UnspecifiedRule { range, family, constructor, destructor } }
    }

    pub fn from_store_error(file: usize, range: Range<usize>, error: StoreError) -> Message {
        let kind = match error {
            StoreError::DuplicateName { name, .. } => MessageKind::DuplicateName { range, name },
            StoreError::RuleAlreadySpecified { .. } => {
                MessageKind::RuleAlreadySpecified { range, constructor: String::new(), destructor: String::new() }
            }
            StoreError::UnknownFamily { .. }
            | StoreError::UnknownConstructor { .. }
            | StoreError::UnknownDestructor { .. } => {
                MessageKind::UnknownName { range, name: String::new() }
            }
            StoreError::UniverseHasNoDestructors => MessageKind::ExpectedConstruction { range },
            StoreError::Unimplemented { family_name, constructor_name, destructor_name } => {
                MessageKind::Unimplemented {
                    family: family_name,
                    constructor: constructor_name,
                    destructor: destructor_name,
                }
            }
        };
        Message { file, kind }
    }

    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        match &self.kind {
            MessageKind::Lex { range } => Diagnostic::error()
                .with_message("unrecognized character")
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::UnexpectedToken { range, found, expected } => Diagnostic::error()
                .with_message(format!("unexpected token `{}`", found))
                .with_labels(vec![
                    Label::primary(self.file, range.clone()).with_message(format!("expected {}", expected))
                ]),
            MessageKind::UnexpectedEof { expected } => Diagnostic::error()
                .with_message("unexpected end of file")
                .with_notes(vec![format!("expected {}", expected)]),
            MessageKind::UnknownName { range, name } => Diagnostic::error()
                .with_message(format!("unknown name `{}`", name))
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::DuplicateName { range, name } => Diagnostic::error()
                .with_message(format!("`{}` is already declared in this family", name))
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::TypeMismatch { range, expected, found } => Diagnostic::error()
                .with_message("type mismatch")
                .with_labels(vec![Label::primary(self.file, range.clone())
                    .with_message(format!("expected `{}`, found `{}`", expected, found))]),
            MessageKind::ExpectedConstruction { range } => Diagnostic::error()
                .with_message("expected a concrete type here")
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::UnspecifiedRule { range, family, constructor, destructor } => Diagnostic::error()
                .with_message(format!(
                    "`{}.{}` is unspecified for `{}`'s constructor `{}`",
                    family, destructor, family, constructor
                ))
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::RuleAlreadySpecified { range, constructor, destructor } => Diagnostic::error()
                .with_message(format!("rule for `{}.{}` is already specified", constructor, destructor))
                .with_labels(vec![Label::primary(self.file, range.clone())]),
            MessageKind::Unimplemented { family, constructor, destructor } => Diagnostic::error()
                .with_message(format!(
                    "`{}` is missing a rule for `{}` of `{}`",
                    family, destructor, constructor
                )),
            MessageKind::Io { path, error } => {
                Diagnostic::error().with_message(format!("could not read `{}`: {}", path, error))
            }
            MessageKind::Query { range, help } => Diagnostic::note()
                .with_message("query")
                .with_labels(vec![Label::primary(self.file, range.clone())])
                .with_notes(vec![help.clone()]),
        }
    }
}
