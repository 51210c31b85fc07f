//! Type declarations for the static checker.
//!
//! The checker itself is an external collaborator; builtins feed it through
//! the [`TypeContext`] interface during the first initialization phase, so
//! that hosted TypeScript sees `Error`, `Map`, `fetch` and friends as typed
//! globals before any runtime object exists.

use rustc_hash::FxHashMap;

/// A structural type, rich enough to declare the builtin surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Unknown,
    Never,
    Void,
    Undefined,
    Null,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    /// Object type with named members.
    Object(Vec<(String, Type)>),
    /// Homogeneous array.
    Array(Box<Type>),
    /// Callable signature.
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Constructor signature.
    Ctor {
        params: Vec<Type>,
        instance: Box<Type>,
    },
    Union(Vec<Type>),
    /// Reference to a declared alias, e.g. `Response`.
    Named(String),
    /// Instantiated generic, e.g. `Map<string, number>`.
    Generic(String, Vec<Type>),
}

impl Type {
    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn ctor(params: Vec<Type>, instance: Type) -> Type {
        Type::Ctor {
            params,
            instance: Box::new(instance),
        }
    }

    pub fn named(name: &str) -> Type {
        Type::Named(name.to_string())
    }

    pub fn promise_of(inner: Type) -> Type {
        Type::Generic("Promise".to_string(), vec![inner])
    }

    pub fn union(members: Vec<Type>) -> Type {
        Type::Union(members)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Unknown => write!(f, "unknown"),
            Type::Never => write!(f, "never"),
            Type::Void => write!(f, "void"),
            Type::Undefined => write!(f, "undefined"),
            Type::Null => write!(f, "null"),
            Type::Boolean => write!(f, "boolean"),
            Type::Number => write!(f, "number"),
            Type::BigInt => write!(f, "bigint"),
            Type::String => write!(f, "string"),
            Type::Symbol => write!(f, "symbol"),
            Type::Object(members) => {
                write!(f, "{{ ")?;
                for (i, (name, ty)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, " }}")
            }
            Type::Array(inner) => write!(f, "{inner}[]"),
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "arg{i}: {p}")?;
                }
                write!(f, ") => {ret}")
            }
            Type::Ctor { params, instance } => {
                write!(f, "new (")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "arg{i}: {p}")?;
                }
                write!(f, ") => {instance}")
            }
            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Type::Named(name) => write!(f, "{name}"),
            Type::Generic(name, args) => {
                write!(f, "{name}<")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// The registration interface the static checker exposes to builtin
/// initializers.
pub trait TypeContext {
    /// Declare a typed global binding.
    fn define_global(&mut self, name: &str, ty: Type);
    /// Declare a named type usable in annotations.
    fn define_type_alias(&mut self, name: &str, ty: Type);
    /// Look up a previously declared type.
    fn get_type(&self, name: &str) -> Option<Type>;
    /// Attach the prototype type of a primitive (`"string"`, `"boolean"`),
    /// so member access on primitives resolves.
    fn set_primitive_prototype(&mut self, primitive: &str, proto: Type);
}

/// In-memory [`TypeContext`] used by the embedder and tests.
#[derive(Debug, Default)]
pub struct TypeEnvironment {
    globals: FxHashMap<String, Type>,
    aliases: FxHashMap<String, Type>,
    primitive_prototypes: FxHashMap<String, Type>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self, name: &str) -> Option<&Type> {
        self.globals.get(name)
    }

    pub fn primitive_prototype(&self, primitive: &str) -> Option<&Type> {
        self.primitive_prototypes.get(primitive)
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }
}

impl TypeContext for TypeEnvironment {
    fn define_global(&mut self, name: &str, ty: Type) {
        self.globals.insert(name.to_string(), ty);
    }

    fn define_type_alias(&mut self, name: &str, ty: Type) {
        self.aliases.insert(name.to_string(), ty);
    }

    fn get_type(&self, name: &str) -> Option<Type> {
        self.aliases
            .get(name)
            .or_else(|| self.globals.get(name))
            .cloned()
    }

    fn set_primitive_prototype(&mut self, primitive: &str, proto: Type) {
        self.primitive_prototypes
            .insert(primitive.to_string(), proto);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let mut env = TypeEnvironment::new();
        env.define_global("fetch", Type::function(vec![Type::String], Type::promise_of(Type::named("Response"))));
        env.define_type_alias("Response", Type::Object(vec![("ok".into(), Type::Boolean)]));

        assert!(env.global("fetch").is_some());
        assert_eq!(
            env.get_type("Response"),
            Some(Type::Object(vec![("ok".into(), Type::Boolean)]))
        );
    }

    #[test]
    fn test_display() {
        let ty = Type::function(vec![Type::String], Type::promise_of(Type::named("Response")));
        assert_eq!(ty.to_string(), "(arg0: string) => Promise<Response>");
    }
}
