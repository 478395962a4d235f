// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::languages::azure_policy::ast::{ConditionNode, CountExpr, CountSource};
use crate::languages::azure_policy::resolver::FieldValue;
use crate::value::Value;

use super::eval::{Evaluator, Scope};

impl<'a> Evaluator<'a> {
    /// Number of array elements that satisfy the count's `where` clause.
    pub(super) fn count(&mut self, count: &'a CountExpr) -> usize {
        match count.source {
            CountSource::Field(ref field) => {
                let elements = match self.field(field) {
                    FieldValue::Many(items) => items,
                    FieldValue::Found(_) | FieldValue::NotFound => return 0,
                };
                let prefix = self.aliases.path_for(field);
                let name = field.raw();
                self.count_elements(elements.into_iter(), count.condition.as_ref(), |element| {
                    Scope::Field {
                        prefix,
                        name,
                        element,
                    }
                })
            }
            CountSource::Value {
                ref operand,
                ref name,
            } => {
                let items = match self.operand(operand) {
                    Some(&Value::Array(ref items)) => items,
                    _ => return 0,
                };
                let name = name.as_deref();
                self.count_elements(items.iter(), count.condition.as_ref(), |element| {
                    Scope::Value { name, element }
                })
            }
        }
    }

    fn count_elements<I, F>(
        &mut self,
        elements: I,
        condition: Option<&'a ConditionNode>,
        scope: F,
    ) -> usize
    where
        I: Iterator<Item = &'a Value>,
        F: Fn(&'a Value) -> Scope<'a>,
    {
        let Some(condition) = condition else {
            return elements.count();
        };

        let mut matched = 0;
        for element in elements {
            self.scopes.push(scope(element));
            if self.evaluate_muted(condition) {
                matched += 1;
            }
            self.scopes.pop();
        }
        matched
    }
}
