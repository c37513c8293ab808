//! External function library
//!
//! Native functions callable from selector expressions, keyed by qualified name.
//! The built-in set lives in the engine namespace; embedders copy it into their
//! registry and add their own before the registry is frozen.

use crate::runtime::path::PathError;
use crate::runtime::qname::QName;
use crate::runtime::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Namespace of the built-in functions.
pub const ENGINE_NAMESPACE: &str = "http://catena.dev/engine";

/// Prefix bound to [`ENGINE_NAMESPACE`] in every fresh registry.
pub const ENGINE_PREFIX: &str = "catena";

/// Native function signature
pub type NativeFn = fn(&[Value]) -> Result<Value, PathError>;

/// A native function bound to a qualified name.
#[derive(Debug, Clone)]
pub struct ExternalFunction {
    /// Name selectors call it by
    pub name: QName,
    pub func: NativeFn,
}

/// Built-in functions, registered once.
pub static BUILTIN_FUNCTIONS: Lazy<FunctionLibrary> = Lazy::new(|| {
    let mut library = FunctionLibrary::new();
    library.init_builtins();
    library
});

/// Functions keyed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<QName, ExternalFunction>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Add `func`, replacing any function of the same name.
    pub fn register(
        &mut self,
        func: ExternalFunction,
    ) {
        self.functions.insert(func.name.clone(), func);
    }

    pub fn get(
        &self,
        name: &QName,
    ) -> Option<&ExternalFunction> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn init_builtins(&mut self) {
        self.register(ExternalFunction {
            name: QName::new(ENGINE_NAMESPACE, "concat"),
            func: ext_concat,
        });
        self.register(ExternalFunction {
            name: QName::new(ENGINE_NAMESPACE, "count"),
            func: ext_count,
        });
        self.register(ExternalFunction {
            name: QName::new(ENGINE_NAMESPACE, "string"),
            func: ext_string,
        });
    }
}

fn ext_concat(args: &[Value]) -> Result<Value, PathError> {
    let joined: String = args.iter().map(|v| v.to_string()).collect();
    Ok(Value::from(joined))
}

fn ext_count(args: &[Value]) -> Result<Value, PathError> {
    match args {
        [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
        [Value::Map(map)] => Ok(Value::Int(map.len() as i64)),
        [Value::Null] => Ok(Value::Int(0)),
        [other] => Err(PathError::BadArgument {
            function: "count".to_string(),
            message: format!("expected a list or map, got {}", other.type_name()),
        }),
        _ => Err(PathError::Arity {
            function: "count".to_string(),
            expected: 1,
            found: args.len(),
        }),
    }
}

fn ext_string(args: &[Value]) -> Result<Value, PathError> {
    match args {
        [value] => Ok(Value::from(value.to_string())),
        _ => Err(PathError::Arity {
            function: "string".to_string(),
            expected: 1,
            found: args.len(),
        }),
    }
}
