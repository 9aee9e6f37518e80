//! The module store: mutators for declaring families, constructors,
//! destructors, and rewrite rules, plus namespace closing and the final
//! validation pass.

use crate::core::{Constructor, Destructor, Expression, Matrix, Module, Rule};

/// A rejected store mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// `index` does not name a declared family.
    UnknownFamily { index: usize },
    /// `index` does not name a declared destructor of the given family.
    UnknownDestructor { family_index: usize, destructor_index: usize },
    /// `index` does not name a declared constructor of the given family.
    UnknownConstructor { family_index: usize, constructor_index: usize },
    /// A rule was set twice for the same (constructor, destructor) pair.
    RuleAlreadySpecified { family_index: usize, constructor_index: usize, destructor_index: usize },
    /// A constructor or destructor name collided with one already declared
    /// in the same family.
    DuplicateName { family_index: usize, name: String },
    /// Matrix 0 (the universe `Type`) never has destructors.
    UniverseHasNoDestructors,
    /// [`Module::validate`] found a constructor/destructor pair at or below
    /// the checked depth whose rule is still unspecified.
    Unimplemented { family_name: String, constructor_name: String, destructor_name: String },
}

impl Module {
    /// Declare a new, empty family, returning its index. The family's own
    /// name and parameter types are recorded as a constructor of matrix 0,
    /// per the convention that a type family's introduction form is itself
    /// found there. Matrix 0 is a family like any other, so a duplicate
    /// family name is rejected the same way [`Module::add_constructor`]
    /// rejects one.
    pub fn add_family(
        &mut self,
        depth: usize,
        name: String,
        parameter_types: Vec<Expression>,
    ) -> Result<usize, StoreError> {
        if self.matrices[0].constructors.iter().any(|c| c.name == name) {
            return Err(StoreError::DuplicateName { family_index: 0, name });
        }
        let index = self.matrices.len();
        self.matrices[0].constructors.push(Constructor {
            depth,
            name,
            parameter_types,
        });
        self.matrices.push(Matrix::default());
        Ok(index)
    }

    /// Add a constructor to family `family_index`, returning its index
    /// within that family's constructor table.
    pub fn add_constructor(
        &mut self,
        family_index: usize,
        depth: usize,
        name: String,
        parameter_types: Vec<Expression>,
    ) -> Result<usize, StoreError> {
        let matrix = self
            .matrices
            .get_mut(family_index)
            .ok_or(StoreError::UnknownFamily { index: family_index })?;

        if matrix.constructors.iter().any(|c| c.name == name) {
            return Err(StoreError::DuplicateName { family_index, name });
        }

        let constructor_index = matrix.constructors.len();
        // Every destructor already declared on this family grows an
        // `Unspecified` rule slot for the new constructor, keeping
        // `destructor.rules` indexed 1:1 by constructor index.
        for destructor in matrix.destructors.iter_mut() {
            destructor.rules.push(Rule::Unspecified);
        }
        matrix.constructors.push(Constructor { depth, name, parameter_types });
        Ok(constructor_index)
    }

    /// Add a destructor to family `family_index`, returning its index within
    /// that family's destructor table. Its rule table starts fully
    /// unspecified, one slot per constructor declared on the family so far.
    pub fn add_destructor(
        &mut self,
        family_index: usize,
        depth: usize,
        name: String,
        parameter_types: Vec<Expression>,
        return_type: Expression,
    ) -> Result<usize, StoreError> {
        if family_index == 0 {
            return Err(StoreError::UniverseHasNoDestructors);
        }
        let matrix = self
            .matrices
            .get_mut(family_index)
            .ok_or(StoreError::UnknownFamily { index: family_index })?;

        if matrix.destructors.iter().any(|d| d.name == name) {
            return Err(StoreError::DuplicateName { family_index, name });
        }

        let destructor_index = matrix.destructors.len();
        let rules = vec![Rule::Unspecified; matrix.constructors.len()];
        matrix.destructors.push(Destructor {
            depth,
            name,
            parameter_types,
            return_type,
            rules,
        });
        Ok(destructor_index)
    }

    /// Assign the rewrite rule fired when `destructor_index` is applied to a
    /// value built from `constructor_index`. Fails if a rule is already
    /// specified there: single-assignment.
    pub fn set_rule(
        &mut self,
        family_index: usize,
        constructor_index: usize,
        destructor_index: usize,
        body: Expression,
    ) -> Result<(), StoreError> {
        let matrix = self
            .matrices
            .get_mut(family_index)
            .ok_or(StoreError::UnknownFamily { index: family_index })?;

        if constructor_index >= matrix.constructors.len() {
            return Err(StoreError::UnknownConstructor { family_index, constructor_index });
        }
        let destructor = matrix
            .destructors
            .get_mut(destructor_index)
            .ok_or(StoreError::UnknownDestructor { family_index, destructor_index })?;

        match destructor.rules[constructor_index] {
            Rule::Specified(_) => Err(StoreError::RuleAlreadySpecified {
                family_index,
                constructor_index,
                destructor_index,
            }),
            Rule::Unspecified => {
                destructor.rules[constructor_index] = Rule::Specified(body);
                Ok(())
            }
        }
    }

    /// Close a namespace opened `depth` levels deep, prefixing every name
    /// declared at exactly that depth (whose family was declared shallower)
    /// with `namespace`, then pulling all names at that depth back down one
    /// level. Mirrors the two-pass rename-then-decrement of the original
    /// `module_endNamespace`.
    pub fn close_namespace(&mut self, depth: usize, namespace: &str) {
        let family_depths: Vec<usize> =
            self.matrices[0].constructors.iter().map(|c| c.depth).collect();
        for (family_index, matrix) in self.matrices.iter_mut().enumerate() {
            let family_depth = family_depths[family_index];
            for constructor in matrix.constructors.iter_mut() {
                if constructor.depth == depth && family_depth < depth {
                    constructor.name = format!("{}:{}", namespace, constructor.name);
                }
            }
            for destructor in matrix.destructors.iter_mut() {
                if destructor.depth == depth && family_depth < depth {
                    destructor.name = format!("{}:{}", namespace, destructor.name);
                }
            }
        }
        for matrix in self.matrices.iter_mut() {
            for constructor in matrix.constructors.iter_mut() {
                if constructor.depth == depth {
                    constructor.depth -= 1;
                }
            }
            for destructor in matrix.destructors.iter_mut() {
                if destructor.depth == depth {
                    destructor.depth -= 1;
                }
            }
        }
    }

    /// Check that every destructor rule at or below `depth`, for every
    /// constructor at or below `depth` of the same family, has been
    /// specified. Returns the first gap found, naming the family,
    /// constructor, and destructor involved.
    pub fn validate(&self, depth: usize) -> Result<(), StoreError> {
        for (family_index, matrix) in self.matrices.iter().enumerate() {
            let family_name = &self.matrices[0].constructors[family_index].name;
            for destructor in &matrix.destructors {
                if destructor.depth < depth {
                    continue;
                }
                for (constructor_index, constructor) in matrix.constructors.iter().enumerate() {
                    if constructor.depth < depth {
                        continue;
                    }
                    if !destructor.rules[constructor_index].is_specified() {
                        return Err(StoreError::Unimplemented {
                            family_name: family_name.clone(),
                            constructor_name: constructor.name.clone(),
                            destructor_name: destructor.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_a_constructor_after_a_destructor_extends_its_rule_table() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 0, "true".to_owned(), Vec::new()).unwrap();
        let not = module
            .add_destructor(bool_family, 0, "not".to_owned(), Vec::new(), Module::universe())
            .unwrap();
        module.add_constructor(bool_family, 0, "false".to_owned(), Vec::new()).unwrap();

        assert_eq!(module.matrices[bool_family].destructors[not].rules.len(), 2);
    }

    #[test]
    fn setting_a_rule_twice_is_rejected() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 0, "true".to_owned(), Vec::new()).unwrap();
        let not = module
            .add_destructor(bool_family, 0, "not".to_owned(), Vec::new(), Module::universe())
            .unwrap();

        module.set_rule(bool_family, 0, not, Module::universe()).unwrap();
        let error = module.set_rule(bool_family, 0, not, Module::universe()).unwrap_err();
        assert_eq!(
            error,
            StoreError::RuleAlreadySpecified { family_index: bool_family, constructor_index: 0, destructor_index: not }
        );
    }

    #[test]
    fn validate_reports_the_first_unspecified_rule() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 0, "true".to_owned(), Vec::new()).unwrap();
        module.add_destructor(bool_family, 0, "not".to_owned(), Vec::new(), Module::universe()).unwrap();

        let error = module.validate(0).unwrap_err();
        assert_eq!(
            error,
            StoreError::Unimplemented {
                family_name: "Bool".to_owned(),
                constructor_name: "true".to_owned(),
                destructor_name: "not".to_owned(),
            }
        );
    }

    #[test]
    fn declaring_a_constructor_twice_is_rejected() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 0, "true".to_owned(), Vec::new()).unwrap();
        let error = module.add_constructor(bool_family, 0, "true".to_owned(), Vec::new()).unwrap_err();
        assert_eq!(error, StoreError::DuplicateName { family_index: bool_family, name: "true".to_owned() });
    }

    #[test]
    fn declaring_a_destructor_twice_is_rejected() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_destructor(bool_family, 0, "not".to_owned(), Vec::new(), Module::universe()).unwrap();
        let error = module
            .add_destructor(bool_family, 0, "not".to_owned(), Vec::new(), Module::universe())
            .unwrap_err();
        assert_eq!(error, StoreError::DuplicateName { family_index: bool_family, name: "not".to_owned() });
    }

    #[test]
    fn the_universe_rejects_destructor_declarations() {
        let mut module = Module::new();
        let error = module.add_destructor(0, 0, "elim".to_owned(), Vec::new(), Module::universe()).unwrap_err();
        assert_eq!(error, StoreError::UniverseHasNoDestructors);
    }

    #[test]
    fn close_namespace_prefixes_and_unindents_names_declared_inside() {
        let mut module = Module::new();
        let bool_family = module.add_family(0, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 1, "true".to_owned(), Vec::new()).unwrap();

        module.close_namespace(1, "b");

        let constructor = &module.matrices[bool_family].constructors[0];
        assert_eq!(constructor.name, "b:true");
        assert_eq!(constructor.depth, 0);
    }

    #[test]
    fn close_namespace_renames_the_family_but_not_its_own_constructors_when_both_are_local() {
        // When the family itself is declared inside the namespace being
        // closed, only the family's own name picks up the prefix — its
        // constructors, declared at the same depth as their family, are
        // always reached through the (now-prefixed) family name and are
        // left alone.
        let mut module = Module::new();
        let bool_family = module.add_family(1, "Bool".to_owned(), Vec::new()).unwrap();
        module.add_constructor(bool_family, 1, "true".to_owned(), Vec::new()).unwrap();

        module.close_namespace(1, "b");

        let family_constructor = &module.matrices[0].constructors[bool_family];
        assert_eq!(family_constructor.name, "b:Bool");
        assert_eq!(family_constructor.depth, 0);

        let true_constructor = &module.matrices[bool_family].constructors[0];
        assert_eq!(true_constructor.name, "true");
        assert_eq!(true_constructor.depth, 0);
    }
}
