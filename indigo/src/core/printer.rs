//! Rendering terms back to source-like text.
//!
//! A term alone does not know its own type, so every entry point here takes the type
//! alongside the value it annotates — for a [`Construction`] that type is
//! known ahead of time by the caller; for an [`Evaluation`] it is recovered
//! bottom-up, a [`Parameter`]'s declared type at a `Reference` leaf and a
//! substituted `return_type` at each `Destruction` built on top of it.

use pretty::{DocAllocator, DocBuilder};

use crate::core::semantics::{substitute_expression, UnspecifiedRule};
use crate::core::{Construction, Destruction, Environment, Evaluation, Expression, Module, Parameter, Substitution};

/// Render `expr`, known to have type `expr_type`, against the parameter
/// names in scope (for resolving `Reference` leaves).
pub fn pretty_expression<'a, D>(
    alloc: &'a D,
    module: &Module,
    parameters: &[Parameter],
    expr_type: &Expression,
    expr: &Expression,
) -> Result<DocBuilder<'a, D>, UnspecifiedRule>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    match expr {
        Expression::Construction(construction) => {
            let family = expr_type
                .as_construction()
                .expect("a well-typed construction's type is itself a Construction")
                .clone();
            pretty_construction(alloc, module, parameters, &family, construction)
        }
        Expression::Evaluation(evaluation) => {
            let doc = alloc
                .text("(")
                .append(pretty_evaluation(alloc, module, parameters, evaluation)?.0)
                .append(")");
            Ok(doc)
        }
    }
}

/// Render a type — an expression known to inhabit the universe.
pub fn pretty_type<'a, D>(
    alloc: &'a D,
    module: &Module,
    parameters: &[Parameter],
    r#type: &Expression,
) -> Result<DocBuilder<'a, D>, UnspecifiedRule>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    pretty_expression(alloc, module, parameters, &Module::universe(), r#type)
}

fn pretty_construction<'a, D>(
    alloc: &'a D,
    module: &Module,
    parameters: &[Parameter],
    family: &Construction,
    construction: &Construction,
) -> Result<DocBuilder<'a, D>, UnspecifiedRule>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    let family_constructor = module
        .family_constructor(family.index)
        .expect("a well-typed construction's family index names a declared family");
    let matrix = module
        .matrix(family.index)
        .expect("a well-typed construction's family index names a declared family");
    let constructor = &matrix.constructors[construction.index];

    let mut env = Environment::new();
    for (i, parameter_type) in family_constructor.parameter_types.iter().enumerate() {
        let r#type = substitute_expression(module, parameter_type, &env)?;
        env.push(Substitution { r#type, value: (*family.args[i]).clone() });
    }

    let mut doc = alloc.text(constructor.name.clone());
    for (k, parameter_type) in constructor.parameter_types.iter().enumerate() {
        let arg_type = substitute_expression(module, parameter_type, &env)?;
        let arg_doc = pretty_expression(alloc, module, parameters, &arg_type, &construction.args[k])?;
        doc = doc.append(alloc.space()).append(arg_doc);
        env.push(Substitution { r#type: arg_type, value: (*construction.args[k]).clone() });
    }
    Ok(doc)
}

/// Render an evaluation, also returning the type it was found to have — the
/// caller needs that type both to keep recursing (a further `.destructor`
/// link) and, at the top, to close off the `$ TYPE [ ... ]` form it came
/// from.
fn pretty_evaluation<'a, D>(
    alloc: &'a D,
    module: &Module,
    parameters: &[Parameter],
    evaluation: &Evaluation,
) -> Result<(DocBuilder<'a, D>, Expression), UnspecifiedRule>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    match evaluation {
        Evaluation::Reference(index) => {
            let parameter = &parameters[*index];
            Ok((alloc.text(parameter.name.clone()), parameter.r#type.clone()))
        }
        Evaluation::Destruction(destruction) => pretty_destruction(alloc, module, parameters, destruction),
    }
}

fn pretty_destruction<'a, D>(
    alloc: &'a D,
    module: &Module,
    parameters: &[Parameter],
    destruction: &Destruction,
) -> Result<(DocBuilder<'a, D>, Expression), UnspecifiedRule>
where
    D: DocAllocator<'a>,
    D::Doc: Clone,
{
    let (caller_doc, caller_type) = pretty_evaluation(alloc, module, parameters, &destruction.caller)?;

    let family = caller_type
        .as_construction()
        .expect("a well-typed caller's type is itself a Construction")
        .clone();
    let family_constructor = module
        .family_constructor(family.index)
        .expect("a well-typed caller's family index names a declared family");
    let matrix = module
        .matrix(family.index)
        .expect("a well-typed caller's family index names a declared family");
    let destructor = &matrix.destructors[destruction.index];

    let mut env = Environment::new();
    for (i, parameter_type) in family_constructor.parameter_types.iter().enumerate() {
        let r#type = substitute_expression(module, parameter_type, &env)?;
        env.push(Substitution { r#type, value: (*family.args[i]).clone() });
    }
    env.push(Substitution {
        r#type: caller_type.clone(),
        value: Expression::Evaluation(evaluation_of(&destruction.caller)),
    });

    let mut doc = caller_doc.append(".").append(destructor.name.clone());
    for (j, parameter_type) in destructor.parameter_types.iter().enumerate() {
        let arg_type = substitute_expression(module, parameter_type, &env)?;
        let arg_doc = pretty_expression(alloc, module, parameters, &arg_type, &destruction.args[j])?;
        doc = doc.append(alloc.space()).append(arg_doc);
        env.push(Substitution { r#type: arg_type, value: (*destruction.args[j]).clone() });
    }

    let result_type = substitute_expression(module, &destructor.return_type, &env)?;
    Ok((doc, result_type))
}

fn evaluation_of(caller: &std::rc::Rc<Evaluation>) -> Evaluation {
    (**caller).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Constructor, Destructor, Matrix, Rule};
    use pretty::BoxAllocator;

    fn bool_module() -> Module {
        let mut module = Module::new();
        module.matrices.push(Matrix {
            constructors: vec![
                Constructor { depth: 0, name: "true".to_owned(), parameter_types: Vec::new() },
                Constructor { depth: 0, name: "false".to_owned(), parameter_types: Vec::new() },
            ],
            destructors: vec![Destructor {
                depth: 0,
                name: "not".to_owned(),
                parameter_types: Vec::new(),
                return_type: Expression::Construction(Construction { index: 1, args: vec![] }),
                rules: vec![
                    Rule::Specified(Expression::Construction(Construction { index: 1, args: vec![] })),
                    Rule::Specified(Expression::Construction(Construction { index: 0, args: vec![] })),
                ],
            }],
        });
        module.matrices[0].constructors.push(Constructor {
            depth: 0,
            name: "Bool".to_owned(),
            parameter_types: Vec::new(),
        });
        module
    }

    fn render(doc: DocBuilder<'_, BoxAllocator>) -> String {
        format!("{}", doc.1.pretty(80))
    }

    #[test]
    fn a_constructor_application_prints_its_name() {
        let module = bool_module();
        let alloc = BoxAllocator;
        let bool_ty = Expression::Construction(Construction { index: 1, args: vec![] });
        let true_value = Expression::Construction(Construction { index: 0, args: vec![] });

        let doc = pretty_expression(&alloc, &module, &[], &bool_ty, &true_value).unwrap();
        assert_eq!(render(doc), "true");
    }

    #[test]
    fn a_reference_prints_its_parameter_name() {
        let module = bool_module();
        let alloc = BoxAllocator;
        let bool_ty = Expression::Construction(Construction { index: 1, args: vec![] });
        let parameters = vec![Parameter { name: "b".to_owned(), r#type: bool_ty }];
        let reference = Expression::reference(0);

        let doc = pretty_expression(&alloc, &module, &parameters, &Module::universe(), &reference);
        // A reference's expected type here is wrong on purpose: printing a
        // reference never inspects `expr_type`, only the parameter's own
        // recorded type, so this still succeeds.
        assert_eq!(render(doc.unwrap()), "(b)");
    }
}
