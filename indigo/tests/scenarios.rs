//! End-to-end scenarios: whole programs fed to [`indigo::run_source`], each
//! checking either the printed output of a run or the particular diagnostic
//! that aborted one.

use indigo::core::{Construction, Expression};
use indigo::elaborator::{self, Scope};
use indigo::lexer::Lexer;
use indigo::reporting::MessageKind;
use indigo::Outcome;
use pretty_assertions::assert_eq;

fn run_ok(source: &str) -> String {
    match indigo::run_source("test", source) {
        Outcome::Success { output, .. } => output,
        Outcome::Failure { message, .. } => panic!("expected success, got {:?}", message.kind),
    }
}

fn run_err(source: &str) -> MessageKind {
    match indigo::run_source("test", source) {
        Outcome::Success { output, .. } => panic!("expected failure, got output {:?}", output),
        Outcome::Failure { message, .. } => message.kind,
    }
}

#[test]
fn booleans_not_reduces_through_a_reflected_annotation() {
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Bool | false ;
        Bool . not ~ Bool ;
        Bool [true . not] ~ false ;
        Bool [false . not] ~ true ;

        $ Bool [ $ Bool [ true ] . not ] ;
    "#;
    assert_eq!(run_ok(source), "false\n");
}

#[test]
fn nat_add_reduces_recursively_through_both_rules() {
    let source = r#"
        Type | Nat ;
        Nat | zero ;
        Nat | succ Nat [n] ;
        Nat . add Nat [m] ~ Nat ;
        Nat [zero . add (m)] ~ (m) ;
        Nat [succ (n) . add (m)] ~ succ (n.add(m)) ;

        $ Nat [ $ Nat [ succ zero ] . add succ succ zero ] ;
    "#;
    assert_eq!(run_ok(source), "succ succ succ zero\n");
}

#[test]
fn nat_add_rule_substitution_does_not_collide_constructor_and_destructor_parameters() {
    // succ(succ(zero)).add(succ(zero)) = 2 + 1 = 3, exercising a rule body
    // that mentions both the constructor parameter `n` and the destructor
    // parameter `m` together, at a depth the single-step scenario above
    // doesn't reach.
    let source = r#"
        Type | Nat ;
        Nat | zero ;
        Nat | succ Nat [n] ;
        Nat . add Nat [m] ~ Nat ;
        Nat [zero . add (m)] ~ (m) ;
        Nat [succ (n) . add (m)] ~ succ (n.add(m)) ;

        $ Nat [ $ Nat [ succ succ zero ] . add succ zero ] ;
    "#;
    assert_eq!(run_ok(source), "succ succ succ zero\n");
}

#[test]
fn an_unspecified_rule_is_reported_at_the_end_of_the_run() {
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Bool | false ;
        Bool . not ~ Bool ;
        Bool [true . not] ~ false ;
    "#;
    match run_err(source) {
        MessageKind::Unimplemented { family, constructor, destructor } => {
            assert_eq!(family, "Bool");
            assert_eq!(constructor, "false");
            assert_eq!(destructor, "not");
        }
        other => panic!("expected Unimplemented, got {:?}", other),
    }
}

#[test]
fn a_namespace_prefixes_the_constructor_declared_inside_it() {
    let source = r#"
        Type | A ;
        A | a0 ;
        Type | B ;
        B | b0 ;
        Type | Pair ;
        @pair { Pair | mk A [a] B [b] ; } ;
    "#;
    match indigo::run_source("test", source) {
        Outcome::Success { module, .. } => {
            let pair_index = module.matrices[0]
                .constructors
                .iter()
                .position(|c| c.name == "Pair")
                .expect("Pair was declared");
            assert_eq!(module.matrices[pair_index].constructors[0].name, "pair:mk");
        }
        Outcome::Failure { message, .. } => panic!("expected success, got {:?}", message.kind),
    }
}

#[test]
fn a_type_family_parameter_ties_a_constructors_argument_to_its_own_instantiation() {
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Type | Nat ;
        Nat | zero ;
        Type | Id Type [T] ;
        Id (T) | refl (T) [t] ;

        $ Id Bool [ refl true ] ;
    "#;
    assert_eq!(run_ok(source), "refl true\n");
}

#[test]
fn declaring_inside_a_namespace_and_declaring_the_mangled_name_directly_produce_the_same_index() {
    // Property 5 (namespace idempotence): `ns:mk` declared inside `@ns { }`
    // must name the same constructor index/matrix as declaring `ns:mk`
    // directly would. The surface grammar's own fresh-binder rule (§6:
    // `parse_word` never accepts `:`) makes a *literal* `Pair | pair:mk ...`
    // source line unparseable, so "directly" is exercised at the module-store
    // level the surface layer itself bottoms out at.
    let namespaced = r#"
        Type | A ;
        A | a0 ;
        Type | Pair ;
        @pair { Pair | mk A [a] ; } ;

        $ Pair [ pair:mk a0 ] ;
    "#;
    let module = match indigo::run_source("test", namespaced) {
        Outcome::Success { module, .. } => module,
        Outcome::Failure { message, .. } => panic!("expected success, got {:?}", message.kind),
    };
    let pair_index = module.matrices[0]
        .constructors
        .iter()
        .position(|c| c.name == "Pair")
        .expect("Pair was declared");
    let mangled = &module.matrices[pair_index].constructors[0];
    assert_eq!(mangled.name, "pair:mk");

    let mut direct = indigo::core::Module::new();
    let a_family = direct.add_family(0, "A".to_owned(), Vec::new()).unwrap();
    direct.add_constructor(a_family, 0, "a0".to_owned(), Vec::new()).unwrap();
    let pair_family = direct.add_family(0, "Pair".to_owned(), Vec::new()).unwrap();
    let a_type = Expression::Construction(Construction { index: a_family, args: vec![] });
    let direct_index = direct
        .add_constructor(pair_family, 0, "pair:mk".to_owned(), vec![a_type])
        .unwrap();

    assert_eq!(pair_family, pair_index);
    assert_eq!(direct_index, 0);
}

#[test]
fn printing_a_constructor_term_and_reparsing_it_yields_a_structurally_equal_value() {
    // Property 7 (round-trip): printing a constructor-only expression and
    // re-parsing the rendered text against the same type must reproduce a
    // structurally equal value.
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Bool | false ;
    "#;
    let module = match indigo::run_source("test", source) {
        Outcome::Success { module, .. } => module,
        Outcome::Failure { message, .. } => panic!("expected success, got {:?}", message.kind),
    };
    let bool_index = module.matrices[0]
        .constructors
        .iter()
        .position(|c| c.name == "Bool")
        .expect("Bool was declared");
    let bool_type = Expression::Construction(Construction { index: bool_index, args: vec![] });
    let true_value = Expression::Construction(Construction { index: 0, args: vec![] });

    let alloc = pretty::BoxAllocator;
    let doc = indigo::core::printer::pretty_expression(&alloc, &module, &[], &bool_type, &true_value)
        .expect("a constructor-only term always prints");
    let rendered = doc.1.pretty(80).to_string();
    assert_eq!(rendered, "true");

    let mut lexer = Lexer::new(&rendered);
    let scope = Scope::default();
    let reparsed = elaborator::parse_expression(&mut lexer, 0, &module, &scope, &bool_type)
        .expect("the printer's own output always re-parses against the type it was printed for");
    assert_eq!(reparsed, true_value);
}

#[test]
fn a_query_at_an_expression_position_aborts_with_a_help_dump_naming_the_expected_type() {
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Bool | false ;

        $ Bool [ ? ] ;
    "#;
    match run_err(source) {
        MessageKind::Query { help, .. } => {
            assert!(help.contains("true"), "help text should list candidate constructors: {}", help);
            assert!(help.contains("false"), "help text should list candidate constructors: {}", help);
        }
        other => panic!("expected Query, got {:?}", other),
    }
}

#[test]
fn asserting_a_family_parameterized_value_at_the_wrong_instantiation_is_a_type_mismatch() {
    let source = r#"
        Type | Bool ;
        Bool | true ;
        Type | Nat ;
        Nat | zero ;
        Type | Id Type [T] ;
        Id (T) | refl (T) [t] ;

        $ Id Nat [ $ Id Bool [ refl true ] ] ;
    "#;
    match run_err(source) {
        MessageKind::TypeMismatch { .. } => {}
        other => panic!("expected TypeMismatch, got {:?}", other),
    }
}
