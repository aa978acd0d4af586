//! Resolution of parsed references against a scope and the root object.
//!
//! A path whose first key exists in the scope is read from the scope;
//! otherwise it is read from the root. Intermediate keys must exist, a
//! missing final key reads as `undefined`.

use crate::parser::{Comparator, Literal, Operand, Path, Pointer, Reference, Segment};
use crate::scope::Scope;
use crate::value::{Call, Object, Value};
use std::cmp::Ordering;

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(value) => Value::Bool(*value),
            Literal::Number(number) => Value::Number(*number),
            Literal::Text(text) => Value::text(text),
        }
    }
}

impl Comparator {
    /// `==`/`!=` compare loosely, `===`/`!==` strictly.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            Comparator::Eq => left.loose_eq(right),
            Comparator::StrictEq => left.strict_eq(right),
            Comparator::NotEq => !left.loose_eq(right),
            Comparator::StrictNotEq => !left.strict_eq(right),
            Comparator::Less => left.compare(right) == Some(Ordering::Less),
            Comparator::Greater => left.compare(right) == Some(Ordering::Greater),
            Comparator::LessOrEqual => {
                matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal))
            }
            Comparator::GreaterOrEqual => {
                matches!(left.compare(right), Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }
}

impl Reference {
    pub fn resolve(&self, scope: &Scope, root: &Object) -> Value {
        match self {
            Reference::Pointer(pointer) => pointer.resolve(scope, root),
            Reference::Comparison { left, op, right } => {
                Value::Bool(op.apply(&left.resolve(scope, root), &right.resolve(scope, root)))
            }
        }
    }
}

impl Pointer {
    pub fn resolve(&self, scope: &Scope, root: &Object) -> Value {
        let value = match &self.operand {
            Operand::Literal(literal) => literal.to_value(),
            Operand::Path(path) => match locate(path, scope, root) {
                Some(slot) => slot.read(),
                None => {
                    log::trace!("`{path}` does not resolve");
                    Value::Undefined
                }
            },
        };
        let value = match value {
            Value::Function(function) => {
                let args: Vec<Value> = self.args.iter().map(|arg| arg.resolve(scope, root)).collect();
                function.call(&Call { scope, args: &args })
            }
            value => value,
        };
        if self.negated {
            Value::Bool(!value.is_truthy())
        } else {
            value
        }
    }

    /// Write `value` into the slot this pointer names. Returns false when the
    /// pointer is not a path or its container does not exist.
    pub fn assign(&self, scope: &Scope, root: &Object, value: Value) -> bool {
        if !self.is_assignable() {
            return false;
        }
        let Operand::Path(path) = &self.operand else {
            return false;
        };
        match locate(path, scope, root) {
            Some(slot) => slot.write(value),
            None => false,
        }
    }
}

/// Container value plus the final key of a path.
struct Slot {
    container: Value,
    key: String,
}

impl Slot {
    fn read(&self) -> Value {
        self.container.member(&self.key).unwrap_or_default()
    }

    fn write(&self, value: Value) -> bool {
        match &self.container {
            Value::Object(object) => {
                object.insert(self.key.clone(), value);
                true
            }
            Value::List(list) => self
                .key
                .parse::<usize>()
                .is_ok_and(|index| list.set(index, value)),
            _ => false,
        }
    }
}

fn locate(path: &Path, scope: &Scope, root: &Object) -> Option<Slot> {
    let keys = path
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Name(name) => Some(name.clone()),
            Segment::Computed(inner) => locate(inner, scope, root).map(|slot| slot.read().to_text()),
        })
        .collect::<Option<Vec<String>>>()?;
    let (last, intermediate) = keys.split_last()?;
    let first = keys.first()?;
    let mut container = if scope.contains(first) {
        Value::Object(scope.object().clone())
    } else {
        Value::Object(root.clone())
    };
    for key in intermediate {
        container = container.member(key)?;
    }
    Some(Slot {
        container,
        key: last.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_pointer;
    use serde_json::json;

    fn root(json: serde_json::Value) -> Object {
        match Value::from(json) {
            Value::Object(object) => object,
            other => panic!("expected an object, got {other:?}"),
        }
    }

    fn resolve(text: &str, scope: &Scope, root: &Object) -> Value {
        parse_pointer(text).resolve(scope, root)
    }

    #[test]
    fn scope_shadows_root() {
        let root = root(json!({"x": 1, "a": {"b": 5}}));
        let scope = Scope::new();
        scope.set("a", Value::from(json!({"b": 7})));

        assert_eq!(resolve("x", &scope, &root), Value::from(1));
        assert_eq!(resolve("a.b", &scope, &root), Value::from(7));
        assert_eq!(resolve("a.c", &Scope::new(), &root), Value::Undefined);
        assert_eq!(resolve("q.r.s", &Scope::new(), &root), Value::Undefined);
    }

    #[test]
    fn computed_segments() {
        let root = root(json!({"items": ["a", "b", "c"], "index": 2, "key": "name", "user": {"name": "ann"}}));
        let scope = Scope::new();
        assert_eq!(resolve("items[index]", &scope, &root), Value::from("c"));
        assert_eq!(resolve("user[key].length", &scope, &root), Value::from(3));
    }

    #[test]
    fn functions_receive_arguments() {
        let root = Object::new();
        root.insert(
            "add",
            Value::function(|call| Value::from(call.arg(0).to_number() + call.arg(1).to_number())),
        );
        root.insert("n", 4);
        assert_eq!(resolve("add:n:3", &Scope::new(), &root), Value::from(7));
        assert_eq!(resolve("!add:n:-4", &Scope::new(), &root), Value::from(true));
    }

    #[test]
    fn comparator_semantics() {
        let one = Value::from(1);
        let text_one = Value::from("1");
        assert!(Comparator::Eq.apply(&one, &text_one));
        assert!(!Comparator::NotEq.apply(&one, &text_one));
        assert!(Comparator::StrictNotEq.apply(&one, &text_one));
        assert!(Comparator::LessOrEqual.apply(&one, &text_one));
        assert!(!Comparator::Less.apply(&Value::Undefined, &one));
    }

    #[test]
    fn assignment_writes_through_the_owning_container() {
        let root = root(json!({"todo": {"done": false}, "list": [1, 2]}));
        let scope = Scope::new();
        scope.set("local", 1);

        assert!(parse_pointer("todo.done").assign(&scope, &root, Value::from(true)));
        assert!(parse_pointer("list.1").assign(&scope, &root, Value::from(9)));
        assert!(parse_pointer("local").assign(&scope, &root, Value::from(2)));
        assert!(!parse_pointer("missing.key").assign(&scope, &root, Value::from(0)));
        assert!(!parse_pointer("!todo.done").assign(&scope, &root, Value::from(0)));

        assert_eq!(root.get("todo").unwrap().to_json(), json!({"done": true}));
        assert_eq!(root.get("list").unwrap().to_json(), json!([1, 9]));
        assert_eq!(scope.get("local"), Some(Value::from(2)));
        assert!(!root.contains_key("local"));
    }
}
