//! The bidirectional elaborator: parses and type-checks in one
//! pass, with no separate surface syntax.
//!
//! Every expression is parsed *against* an expected type, threading an
//! [`Environment`] of already-elaborated values the same way
//! [`crate::core::semantics::destruct`] does — a family's own constructor
//! application builds its argument environment exactly like
//! [`destruct`](crate::core::semantics::destruct) builds its outer
//! environment, and declaring a constructor, destructor, or rule reuses the
//! identity trick (an environment whose `i`-th value is `Expression::reference(i)`)
//! so that one substitution routine serves both elaboration-time and
//! reduction-time callers.

use std::rc::Rc;

use contracts::debug_ensures;

use crate::core::semantics::{destruct, is_equal, substitute_expression};
use crate::core::{Construction, Environment, Expression, Module, Parameter, Substitution};
use crate::lexer::{Lexer, Token};
use crate::reporting::{Message, MessageKind};

/// The parameters in scope at a point in source, together with the
/// environment that maps each one to its own identity reference — the
/// environment `destruct`/`substitute_expression` need to evaluate a
/// declared type that mentions an earlier parameter.
#[derive(Clone, Default)]
pub struct Scope {
    pub parameters: Vec<Parameter>,
    pub env: Environment,
}

impl Scope {
    fn push(&mut self, name: String, r#type: Expression) -> usize {
        let index = self.parameters.len();
        self.env.push(Substitution { r#type: r#type.clone(), value: Expression::reference(index) });
        self.parameters.push(Parameter { name, r#type });
        index
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|parameter| parameter.name == name)
    }
}

fn expect(lexer: &mut Lexer, file: usize, token: Token, what: &'static str) -> Result<(), Message> {
    match lexer.advance().map_err(|e| Message::lex(file, e))? {
        Some((found, _)) if found == token => Ok(()),
        Some((found, range)) => {
            Err(unexpected_token(file, range, &found, what))
        }
        None => Err(Message { file, kind: MessageKind::UnexpectedEof { expected: what } }),
    }
}

fn unexpected_token(file: usize, range: std::ops::Range<usize>, found: &Token, expected: &'static str) -> Message {
    Message {
        file,
        kind: MessageKind::UnexpectedToken {
            range,
            found: found.to_string(),
            expected,
        },
    }
}

fn unexpected_eof(file: usize, expected: &'static str) -> Message {
    Message { file, kind: MessageKind::UnexpectedEof { expected } }
}

/// The range to blame a diagnostic on when looking ahead for one has itself
/// failed (a lex error encountered while merely peeking): an empty range at
/// the lexer's current byte offset, rather than a fixed `0..0` that would
/// misattribute every such diagnostic to the start of the file.
fn current_range(lexer: &mut Lexer) -> std::ops::Range<usize> {
    match lexer.peek_range() {
        Ok(range) => range,
        Err(_) => {
            let pos = lexer.pos();
            pos..pos
        }
    }
}

/// A name, permitting `:` — used wherever a declaration or rule references
/// a (possibly already-namespaced) name.
fn parse_name(lexer: &mut Lexer, file: usize) -> Result<(String, std::ops::Range<usize>), Message> {
    match lexer.advance().map_err(|e| Message::lex(file, e))? {
        Some((Token::Name(name), range)) => Ok((name, range)),
        Some((found, range)) => Err(unexpected_token(file, range, &found, "a name")),
        None => Err(unexpected_eof(file, "a name")),
    }
}

/// A name that must be fresh and unqualified — a binder cannot itself carry
/// a namespace prefix.
fn parse_word(lexer: &mut Lexer, file: usize) -> Result<(String, std::ops::Range<usize>), Message> {
    let (name, range) = parse_name(lexer, file)?;
    if name.contains(':') {
        return Err(Message {
            file,
            kind: MessageKind::UnexpectedToken {
                range,
                found: name,
                expected: "an unqualified name",
            },
        });
    }
    Ok((name, range))
}

fn type_mismatch(
    module: &Module,
    file: usize,
    range: std::ops::Range<usize>,
    parameters: &[Parameter],
    expected: &Expression,
    found: &Expression,
) -> Message {
    let alloc = pretty::BoxAllocator;
    let expected_doc = crate::core::printer::pretty_type(&alloc, module, parameters, expected)
        .map(|doc| format!("{}", doc.1.pretty(80)))
        .unwrap_or_else(|_| "<unprintable>".to_owned());
    let found_doc = crate::core::printer::pretty_type(&alloc, module, parameters, found)
        .map(|doc| format!("{}", doc.1.pretty(80)))
        .unwrap_or_else(|_| "<unprintable>".to_owned());
    Message {
        file,
        kind: MessageKind::TypeMismatch { range, expected: expected_doc, found: found_doc },
    }
}

fn unspecified_rule_message(
    module: &Module,
    file: usize,
    range: std::ops::Range<usize>,
    error: crate::core::semantics::UnspecifiedRule,
) -> Message {
    let family = module.family_constructor(error.family_index).map(|c| c.name.clone()).unwrap_or_default();
    let matrix = module.matrix(error.family_index);
    let constructor = matrix
        .and_then(|m| m.constructors.get(error.constructor_index))
        .map(|c| c.name.clone())
        .unwrap_or_default();
    let destructor = matrix
        .and_then(|m| m.destructors.get(error.destructor_index))
        .map(|d| d.name.clone())
        .unwrap_or_default();
    Message::unspecified_rule(file, range, family, constructor, destructor)
}

/// Build the environment mapping a concrete family instance's own
/// parameters to their (already-concrete) argument values — the prefix
/// every constructor-application or destructor-chain elaboration is parsed
/// against.
fn family_param_env(module: &Module, family: &Construction) -> Environment {
    let family_constructor = module
        .family_constructor(family.index)
        .expect("a well-formed expected type's family index names a declared family");
    let mut env = Environment::new();
    for (i, parameter_type) in family_constructor.parameter_types.iter().enumerate() {
        let r#type = substitute_expression(module, parameter_type, &env)
            .expect("a declared family's own parameter types never depend on unspecified rules");
        env.push(Substitution { r#type, value: (*family.args[i]).clone() });
    }
    env
}

/// Parse zero or more positional arguments against `param_types`, threading
/// `env` (already seeded with whatever prefix the caller needs — a family's
/// parameters, plus `self` for a destructor chain) so each argument's
/// expected type can depend on the ones before it.
#[debug_ensures(ret.is_err() || ret.as_ref().unwrap().1.len() == old(env.len()) + param_types.len())]
fn parse_arg_list(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    mut env: Environment,
    param_types: &[Expression],
) -> Result<(Vec<Rc<Expression>>, Environment), Message> {
    let mut args = Vec::with_capacity(param_types.len());
    for parameter_type in param_types {
        let expected = substitute_expression(module, parameter_type, &env)
            .map_err(|e| unspecified_rule_message(module, file, current_range(lexer), e))?;
        let value = parse_expression(lexer, file, module, scope, &expected)?;
        env.push(Substitution { r#type: expected, value: value.clone() });
        args.push(Rc::new(value));
    }
    Ok((args, env))
}

/// Parse an expression known to inhabit `expected`. Dispatches on the
/// next token: a `Name` begins a constructor application, `$` an annotated
/// evaluation, `(` a parameter reference, and `?` a query.
pub fn parse_expression(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    expected: &Expression,
) -> Result<Expression, Message> {
    match lexer.peek().map_err(|e| Message::lex(file, e))?.cloned() {
        Some(Token::Question) => {
            let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
            lexer.advance().map_err(|e| Message::lex(file, e))?;
            Err(query_construction_help(module, file, range, scope, expected))
        }
        Some(Token::Name(_)) => parse_construction(lexer, file, module, scope, expected),
        Some(Token::Dollar) => parse_annotated_evaluation(lexer, file, module, scope, expected),
        Some(Token::LParen) => parse_parameter_evaluation(lexer, file, module, scope, expected),
        Some(found) => {
            let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
            Err(unexpected_token(file, range, &found, "an expression"))
        }
        None => Err(unexpected_eof(file, "an expression")),
    }
}

fn query_construction_help(
    module: &Module,
    file: usize,
    range: std::ops::Range<usize>,
    scope: &Scope,
    expected: &Expression,
) -> Message {
    let alloc = pretty::BoxAllocator;
    let type_doc = crate::core::printer::pretty_type(&alloc, module, &scope.parameters, expected)
        .map(|doc| format!("{}", doc.1.pretty(80)))
        .unwrap_or_else(|_| "<unprintable>".to_owned());
    use itertools::Itertools;

    let mut help = format!("expected type: {}\n", type_doc);
    if let Some(family) = expected.as_construction() {
        if let Some(matrix) = module.matrix(family.index) {
            help.push_str(&format!(
                "available constructors: {}\n",
                matrix.constructors.iter().map(|c| c.name.as_str()).format(", ")
            ));
        }
    }
    help.push_str(&format!("in scope: {}\n", scope.parameters.iter().map(|p| p.name.as_str()).format(", ")));
    Message { file, kind: MessageKind::Query { range, help } }
}

fn parse_construction(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    expected: &Expression,
) -> Result<Expression, Message> {
    let family = expected.as_construction().cloned().ok_or_else(|| {
        let range = current_range(lexer);
        Message { file, kind: MessageKind::ExpectedConstruction { range } }
    })?;
    let matrix = module
        .matrix(family.index)
        .expect("a well-formed expected type's family index names a declared family");
    let (name, range) = parse_name(lexer, file)?;
    let constructor_index = matrix
        .constructors
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| Message { file, kind: MessageKind::UnknownName { range: range.clone(), name: name.clone() } })?;
    let constructor = &matrix.constructors[constructor_index];

    let env = family_param_env(module, &family);
    let (args, _) = parse_arg_list(lexer, file, module, scope, env, &constructor.parameter_types)?;

    Ok(Expression::Construction(Construction { index: constructor_index, args }))
}

/// Consume zero or more `.name arg...` links, starting from `caller`
/// (already a `{type, value}` pair), returning the final `{type, value}`.
fn parse_destructor_chain(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    mut caller: Substitution,
) -> Result<Substitution, Message> {
    while matches!(lexer.peek().map_err(|e| Message::lex(file, e))?, Some(Token::Dot)) {
        lexer.advance().map_err(|e| Message::lex(file, e))?;

        if matches!(lexer.peek().map_err(|e| Message::lex(file, e))?, Some(Token::Question)) {
            let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
            lexer.advance().map_err(|e| Message::lex(file, e))?;
            return Err(query_destructor_help(module, file, range, &caller));
        }

        let family = caller.r#type.as_construction().cloned().ok_or_else(|| {
            let range = current_range(lexer);
            Message { file, kind: MessageKind::ExpectedConstruction { range } }
        })?;
        let matrix = module
            .matrix(family.index)
            .expect("a well-formed caller type's family index names a declared family");
        let (name, range) = parse_name(lexer, file)?;
        let destructor_index = matrix
            .destructors
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| Message { file, kind: MessageKind::UnknownName { range: range.clone(), name: name.clone() } })?;
        let destructor = &matrix.destructors[destructor_index];

        let mut env = family_param_env(module, &family);
        env.push(Substitution { r#type: caller.r#type.clone(), value: caller.value.clone() });
        let (args, _) = parse_arg_list(lexer, file, module, scope, env, &destructor.parameter_types)?;

        let caller_family = family;
        caller = destruct(module, &caller_family, caller.value, destructor_index, &args)
            .map_err(|e| unspecified_rule_message(module, file, range, e))?;
    }
    Ok(caller)
}

fn query_destructor_help(module: &Module, file: usize, range: std::ops::Range<usize>, caller: &Substitution) -> Message {
    let alloc = pretty::BoxAllocator;
    let type_doc = crate::core::printer::pretty_type(&alloc, module, &[], &caller.r#type)
        .map(|doc| format!("{}", doc.1.pretty(80)))
        .unwrap_or_else(|_| "<unprintable>".to_owned());
    use itertools::Itertools;

    let mut help = format!("caller type: {}\n", type_doc);
    if let Some(family) = caller.r#type.as_construction() {
        if let Some(matrix) = module.matrix(family.index) {
            help.push_str(&format!(
                "available destructors: {}\n",
                matrix.destructors.iter().map(|d| d.name.as_str()).format(", ")
            ));
        }
    }
    Message { file, kind: MessageKind::Query { range, help } }
}

fn parse_annotated_evaluation(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    expected: &Expression,
) -> Result<Expression, Message> {
    expect(lexer, file, Token::Dollar, "`$`")?;
    let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
    let annotated_type = parse_type(lexer, file, module, scope)?;
    expect(lexer, file, Token::LBracket, "`[`")?;
    let value = parse_expression(lexer, file, module, scope, &annotated_type)?;
    let caller = parse_destructor_chain(
        lexer,
        file,
        module,
        scope,
        Substitution { r#type: annotated_type, value },
    )?;
    expect(lexer, file, Token::RBracket, "`]`")?;

    if !is_equal(&caller.r#type, expected) {
        return Err(type_mismatch(module, file, range, &scope.parameters, expected, &caller.r#type));
    }
    Ok(caller.value)
}

fn parse_parameter_evaluation(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    expected: &Expression,
) -> Result<Expression, Message> {
    expect(lexer, file, Token::LParen, "`(`")?;
    let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
    let (name, name_range) = parse_name(lexer, file)?;
    let index = scope
        .resolve(&name)
        .ok_or_else(|| Message { file, kind: MessageKind::UnknownName { range: name_range, name } })?;
    let parameter = &scope.parameters[index];
    let caller = parse_destructor_chain(
        lexer,
        file,
        module,
        scope,
        Substitution { r#type: parameter.r#type.clone(), value: Expression::reference(index) },
    )?;
    expect(lexer, file, Token::RParen, "`)`")?;

    if !is_equal(&caller.r#type, expected) {
        return Err(type_mismatch(module, file, range, &scope.parameters, expected, &caller.r#type));
    }
    Ok(caller.value)
}

/// Parse a type: an expression checked against the universe.
pub fn parse_type(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
) -> Result<Expression, Message> {
    parse_expression(lexer, file, module, scope, &Module::universe())
}

// --- Declarations -----------------------------------------------------

/// Parse and apply one top-level declaration statement:
/// `TYPENAME (param)* | NAME (TYPE [name])* ;`           — a constructor
/// `TYPENAME (param)* . NAME (TYPE [name])* ~ TYPE ;`    — a destructor
/// `TYPENAME (param)* [ CTOR (n)* . DEST (n)* ] ~ BODY ;` — a rule
///
/// A brand-new type family is declared the same way as any other
/// constructor, with `TYPENAME` equal to the builtin `Type`: matrix 0's own
/// constructors *are* the declared families, so `Type | Bool ;` adds `Bool`
/// to matrix 0 and opens a fresh, empty matrix for it.
pub fn parse_declaration(
    lexer: &mut Lexer,
    file: usize,
    module: &mut Module,
    depth: usize,
) -> Result<(), Message> {
    let (type_name, type_range) = parse_name(lexer, file)?;
    let type_index = module.matrices[0]
        .constructors
        .iter()
        .position(|c| c.name == type_name)
        .ok_or_else(|| Message {
            file,
            kind: MessageKind::UnknownName { range: type_range, name: type_name },
        })?;
    let type_constructor = module.matrices[0].constructors[type_index].clone();

    let mut scope = Scope::default();
    for declared_param_type in &type_constructor.parameter_types {
        expect(lexer, file, Token::LParen, "`(`")?;
        let (name, _) = parse_word(lexer, file)?;
        expect(lexer, file, Token::RParen, "`)`")?;
        let r#type = substitute_expression(module, declared_param_type, &scope.env)
            .map_err(|e| unspecified_rule_message(module, file, current_range(lexer), e))?;
        scope.push(name, r#type);
    }
    let family_arity = scope.parameters.len();

    match lexer.peek().map_err(|e| Message::lex(file, e))?.cloned() {
        Some(Token::Pipe) => parse_constructor_decl(lexer, file, module, depth, type_index, scope)?,
        Some(Token::Dot) => parse_destructor_decl(lexer, file, module, depth, type_index, scope, family_arity)?,
        Some(Token::LBracket) => parse_rule_decl(lexer, file, module, type_index, scope, family_arity)?,
        Some(found) => {
            let range = lexer.peek_range().map_err(|e| Message::lex(file, e))?;
            return Err(unexpected_token(file, range, &found, "`|`, `.`, or `[`"));
        }
        None => return Err(unexpected_eof(file, "`|`, `.`, or `[`")),
    }

    expect(lexer, file, Token::Semicolon, "`;`")
}

fn parse_constructor_decl(
    lexer: &mut Lexer,
    file: usize,
    module: &mut Module,
    depth: usize,
    type_index: usize,
    scope: Scope,
) -> Result<(), Message> {
    expect(lexer, file, Token::Pipe, "`|`")?;
    let (name, name_range) = parse_word(lexer, file)?;

    let mut local_scope = scope;
    let mut param_types = Vec::new();
    loop {
        match lexer.peek().map_err(|e| Message::lex(file, e))?.cloned() {
            Some(Token::Semicolon) => break,
            _ => {
                let declared_type = parse_type(lexer, file, module, &local_scope)?;
                expect(lexer, file, Token::LBracket, "`[`")?;
                let (pname, prange) = parse_word(lexer, file)?;
                if local_scope_has(&local_scope, &pname) {
                    return Err(Message {
                        file,
                        kind: MessageKind::DuplicateName { range: prange, name: pname },
                    });
                }
                expect(lexer, file, Token::RBracket, "`]`")?;
                local_scope.push(pname, declared_type.clone());
                param_types.push(declared_type);
            }
        }
    }

    // `TYPENAME | CTORNAME ...` where `TYPENAME` is `Type` itself declares a
    // brand-new family: matrix 0's own constructors *are* the declared
    // families, so this path goes through `add_family`, which both
    // records the name there and opens the fresh, empty matrix the new
    // family needs. Every other `TYPENAME` names an already-declared family,
    // so an ordinary constructor is appended to its matrix instead.
    if type_index == crate::core::TYPE_INDEX {
        module
            .add_family(depth, name, param_types)
            .map_err(|e| Message::from_store_error(file, name_range, e))?;
    } else {
        module
            .add_constructor(type_index, depth, name, param_types)
            .map_err(|e| Message::from_store_error(file, name_range, e))?;
    }
    Ok(())
}

fn local_scope_has(scope: &Scope, name: &str) -> bool {
    scope.resolve(name).is_some()
}

fn parse_destructor_decl(
    lexer: &mut Lexer,
    file: usize,
    module: &mut Module,
    depth: usize,
    type_index: usize,
    scope: Scope,
    family_arity: usize,
) -> Result<(), Message> {
    expect(lexer, file, Token::Dot, "`.`")?;
    let (name, name_range) = parse_name(lexer, file)?;

    let mut local_scope = scope;
    let self_type = Expression::Construction(Construction {
        index: type_index,
        args: (0..family_arity).map(|i| Rc::new(Expression::reference(i))).collect(),
    });
    local_scope.push(String::new(), self_type);

    let mut param_types = Vec::new();
    loop {
        match lexer.peek().map_err(|e| Message::lex(file, e))?.cloned() {
            Some(Token::Tilde) => break,
            _ => {
                let declared_type = parse_type(lexer, file, module, &local_scope)?;
                expect(lexer, file, Token::LBracket, "`[`")?;
                let (pname, prange) = parse_word(lexer, file)?;
                if local_scope_has(&local_scope, &pname) {
                    return Err(Message {
                        file,
                        kind: MessageKind::DuplicateName { range: prange, name: pname },
                    });
                }
                expect(lexer, file, Token::RBracket, "`]`")?;
                local_scope.push(pname, declared_type.clone());
                param_types.push(declared_type);
            }
        }
    }
    expect(lexer, file, Token::Tilde, "`~`")?;
    let return_type = parse_type(lexer, file, module, &local_scope)?;

    module
        .add_destructor(type_index, depth, name, param_types, return_type)
        .map_err(|e| Message::from_store_error(file, name_range, e))?;
    Ok(())
}

// --- Thin public re-exports for the driver -------------------------------
//
// The driver's namespace and print-directive handling needs a handful of
// parsing primitives that are otherwise private to this module's own
// recursive-descent grammar; these forward to them unchanged so the grammar
// helpers stay defined in exactly one place.

pub(crate) fn parse_name_public(
    lexer: &mut Lexer,
    file: usize,
) -> Result<(String, std::ops::Range<usize>), Message> {
    parse_name(lexer, file)
}

pub(crate) fn expect_public(
    lexer: &mut Lexer,
    file: usize,
    token: Token,
    what: &'static str,
) -> Result<(), Message> {
    expect(lexer, file, token, what)
}

/// Consume a destructor chain starting from an already-elaborated
/// `{type, value}` pair — used by the driver for the `$ TYPE [ VALUE ] (.dest
/// args...)*` print directive, which builds its initial pair itself rather
/// than going through [`parse_annotated_evaluation`].
pub(crate) fn parse_destructor_chain_public(
    lexer: &mut Lexer,
    file: usize,
    module: &Module,
    scope: &Scope,
    r#type: Expression,
    value: Expression,
) -> Result<Substitution, Message> {
    parse_destructor_chain(lexer, file, module, scope, Substitution { r#type, value })
}

pub(crate) fn unspecified_rule_message_public(
    module: &Module,
    file: usize,
    range: std::ops::Range<usize>,
    error: crate::core::semantics::UnspecifiedRule,
) -> Message {
    unspecified_rule_message(module, file, range, error)
}

fn parse_rule_decl(
    lexer: &mut Lexer,
    file: usize,
    module: &mut Module,
    type_index: usize,
    scope: Scope,
    family_arity: usize,
) -> Result<(), Message> {
    expect(lexer, file, Token::LBracket, "`[`")?;
    let (ctor_name, ctor_range) = parse_name(lexer, file)?;
    let constructor_index = module.matrices[type_index]
        .constructors
        .iter()
        .position(|c| c.name == ctor_name)
        .ok_or_else(|| Message {
            file,
            kind: MessageKind::UnknownName { range: ctor_range, name: ctor_name },
        })?;
    let constructor = module.matrices[type_index].constructors[constructor_index].clone();

    let mut local_scope = scope;
    for declared_type in &constructor.parameter_types {
        let r#type = substitute_expression(module, declared_type, &local_scope.env)
            .map_err(|e| unspecified_rule_message(module, file, current_range(lexer), e))?;
        expect(lexer, file, Token::LParen, "`(`")?;
        let (pname, prange) = parse_word(lexer, file)?;
        if local_scope_has(&local_scope, &pname) {
            return Err(Message {
                file,
                kind: MessageKind::DuplicateName { range: prange, name: pname },
            });
        }
        expect(lexer, file, Token::RParen, "`)`")?;
        local_scope.push(pname, r#type);
    }

    expect(lexer, file, Token::Dot, "`.`")?;
    let (dest_name, dest_range) = parse_name(lexer, file)?;
    let destructor_index = module.matrices[type_index]
        .destructors
        .iter()
        .position(|d| d.name == dest_name)
        .ok_or_else(|| Message {
            file,
            kind: MessageKind::UnknownName { range: dest_range.clone(), name: dest_name },
        })?;
    let destructor = module.matrices[type_index].destructors[destructor_index].clone();

    // The environment for converting the destructor's own declared parameter
    // and return types into this rule's terms: family parameters (shared
    // with `local_scope`), then a reconstructed `self` built from the
    // constructor parameters just bound, then the destructor parameters as
    // they're bound below.
    let mut type_env = Environment::new();
    for i in 0..family_arity {
        type_env.push(local_scope.env.get(i).expect("family slot present").clone());
    }
    let self_value = Expression::Construction(Construction {
        index: constructor_index,
        args: (0..constructor.parameter_types.len())
            .map(|k| Rc::new(Expression::reference(family_arity + k)))
            .collect(),
    });
    let self_type = Expression::Construction(Construction {
        index: type_index,
        args: (0..family_arity).map(|i| Rc::new(Expression::reference(i))).collect(),
    });
    type_env.push(Substitution { r#type: self_type, value: self_value });

    for declared_type in &destructor.parameter_types {
        let r#type = substitute_expression(module, declared_type, &type_env)
            .map_err(|e| unspecified_rule_message(module, file, current_range(lexer), e))?;
        expect(lexer, file, Token::LParen, "`(`")?;
        let (pname, prange) = parse_word(lexer, file)?;
        if local_scope_has(&local_scope, &pname) {
            return Err(Message {
                file,
                kind: MessageKind::DuplicateName { range: prange, name: pname },
            });
        }
        expect(lexer, file, Token::RParen, "`)`")?;
        let rule_index = local_scope.push(pname, r#type.clone());
        type_env.push(Substitution { r#type, value: Expression::reference(rule_index) });
    }

    expect(lexer, file, Token::RBracket, "`]`")?;
    expect(lexer, file, Token::Tilde, "`~`")?;

    let expected_body_type = substitute_expression(module, &destructor.return_type, &type_env)
        .map_err(|e| unspecified_rule_message(module, file, current_range(lexer), e))?;
    let body = parse_expression(lexer, file, module, &local_scope, &expected_body_type)?;

    module
        .set_rule(type_index, constructor_index, destructor_index, body)
        .map_err(|e| Message::from_store_error(file, dest_range, e))?;
    Ok(())
}
