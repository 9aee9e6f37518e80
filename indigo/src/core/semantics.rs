//! Substitution and destructor reduction — the substitution engine and
//! the reducer that drives both type computation and evaluation.
//!
//! Both take the [`Module`] by reference: a destructor reduction needs its
//! family's parameter types and its rule table, and a substitution can carry
//! a stuck destruction across the point where its target stops being neutral,
//! so it needs the same access transitively.

use std::rc::Rc;

use crate::core::{
    Construction, Destruction, Environment, Evaluation, ExprRef, Expression, Matrix, Module, Rule,
    Substitution,
};

/// A destructor reduction that cannot proceed because its rule table is
/// incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspecifiedRule {
    pub family_index: usize,
    pub constructor_index: usize,
    pub destructor_index: usize,
}

/// Substitute `env` into `expr`, returning only the resulting `Expression`.
///
/// Used wherever the caller doesn't need the substituted term's type back —
/// chiefly when recomputing a declared parameter or return type, which lives
/// one level up and has no "type of its type" to report.
pub fn substitute_expression(
    module: &Module,
    expr: &Expression,
    env: &Environment,
) -> Result<Expression, UnspecifiedRule> {
    match expr {
        Expression::Construction(construction) => {
            let mut args = Vec::with_capacity(construction.args.len());
            for arg in &construction.args {
                args.push(Rc::new(substitute_expression(module, arg, env)?));
            }
            Ok(Expression::Construction(Construction { index: construction.index, args }))
        }
        Expression::Evaluation(evaluation) => {
            Ok(substitute_evaluation(module, evaluation, env)?.value)
        }
    }
}

/// Substitute `env` into `eval`, returning both the resulting value and its
/// type.
pub fn substitute_evaluation(
    module: &Module,
    eval: &Evaluation,
    env: &Environment,
) -> Result<Substitution, UnspecifiedRule> {
    match eval {
        Evaluation::Reference(index) => Ok(env
            .get(*index)
            .cloned()
            .expect("reference index out of bounds of a well-formed environment")),
        Evaluation::Destruction(destruction) => {
            let caller = substitute_evaluation(module, &destruction.caller, env)?;
            let mut args = Vec::with_capacity(destruction.args.len());
            for arg in &destruction.args {
                args.push(Rc::new(substitute_expression(module, arg, env)?));
            }

            let caller_family = caller
                .r#type
                .as_construction()
                .expect("a well-typed caller's type is always a Construction")
                .clone();

            destruct(module, &caller_family, caller.value, destruction.index, &args)
        }
    }
}

/// Given a family (the caller's type, already proven to be a `Construction`),
/// a caller value of that family, a destructor index, and already-substituted
/// arguments, compute the `{type, value}` result of the destructor
/// application.
///
/// Taking `caller_family: &Construction` rather than `&Expression` pins the
/// precondition "the caller's type has already been reduced to a
/// Construction" at the type level — there is no code path here that has to
/// re-check it.
pub fn destruct(
    module: &Module,
    caller_family: &Construction,
    caller_value: Expression,
    destructor_index: usize,
    args: &[ExprRef],
) -> Result<Substitution, UnspecifiedRule> {
    let family_index = caller_family.index;
    let family_constructor = module
        .family_constructor(family_index)
        .expect("caller_family.index names a declared family");
    let matrix = module.matrix(family_index).expect("caller_family.index names a declared family");
    let destructor = &matrix.destructors[destructor_index];

    // The outer environment: family parameters, then the caller itself, then
    // the destructor's own parameters — in that order, per the declaration
    // head `destructor_name(family_params)(self)(destructor_params)`.
    let mut outer_env = Environment::new();
    for (i, parameter_type) in family_constructor.parameter_types.iter().enumerate() {
        let r#type = substitute_expression(module, parameter_type, &outer_env)?;
        outer_env.push(Substitution { r#type, value: (*caller_family.args[i]).clone() });
    }
    let family_arity = outer_env.len();
    outer_env.push(Substitution {
        r#type: Expression::Construction(caller_family.clone()),
        value: caller_value.clone(),
    });
    for (j, parameter_type) in destructor.parameter_types.iter().enumerate() {
        let r#type = substitute_expression(module, parameter_type, &outer_env)?;
        outer_env.push(Substitution { r#type, value: (*args[j]).clone() });
    }

    let result_type = substitute_expression(module, &destructor.return_type, &outer_env)?;

    let result_value = match &caller_value {
        Expression::Construction(construction) => {
            let rule = &destructor.rules[construction.index];
            let rule_expr = rule.as_expression().ok_or(UnspecifiedRule {
                family_index,
                constructor_index: construction.index,
                destructor_index,
            })?;

            // The rule environment: family parameters, then the matched
            // constructor's own parameters, then the destructor's
            // parameters — the rule body is written in terms of exactly
            // these names.
            let constructor = &matrix.constructors[construction.index];
            let mut rule_env = Environment::new();
            for i in 0..family_arity {
                rule_env.push(outer_env.get(i).expect("family slot present").clone());
            }
            for (k, parameter_type) in constructor.parameter_types.iter().enumerate() {
                let r#type = substitute_expression(module, parameter_type, &rule_env)?;
                rule_env.push(Substitution { r#type, value: (*construction.args[k]).clone() });
            }
            for j in 0..destructor.parameter_types.len() {
                rule_env.push(
                    outer_env
                        .get(family_arity + 1 + j)
                        .expect("destructor param slot present")
                        .clone(),
                );
            }

            substitute_expression(module, rule_expr, &rule_env)?
        }
        Expression::Evaluation(evaluation) => {
            Expression::Evaluation(Evaluation::Destruction(Destruction {
                caller: Rc::new(evaluation.clone()),
                index: destructor_index,
                args: args.to_vec(),
            }))
        }
    };

    Ok(Substitution { r#type: result_type, value: result_value })
}

/// Structural equality between two expressions already known to inhabit the
/// same type. There is no definitional-equality beyond reduction to this
/// normal form: no unification, no eta, no universe subtyping.
pub fn is_equal(a: &Expression, b: &Expression) -> bool {
    a == b
}
