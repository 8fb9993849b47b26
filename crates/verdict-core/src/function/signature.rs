//! First-order function signatures.

use std::fmt;

use crate::value::ValueType;

/// The signature of a first-order function: identifier, return type, and
/// parameter types, optionally variadic.
///
/// When `varargs` is set, the final parameter type repeats zero or more
/// times: `string-concatenate(string, string, string...)` declares
/// `params = [string, string]`, `varargs = true`, and accepts two or more
/// arguments. A variadic signature must declare at least one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    id: String,
    return_type: ValueType,
    params: Vec<ValueType>,
    varargs: bool,
}

impl FunctionSignature {
    /// Builds a fixed-arity signature.
    pub fn new(id: impl Into<String>, return_type: ValueType, params: Vec<ValueType>) -> Self {
        Self { id: id.into(), return_type, params, varargs: false }
    }

    /// Builds a variadic signature; the last parameter repeats ≥ 0 times.
    ///
    /// `params` must be non-empty; this is a programming error in the
    /// registration code, not an input error, hence the debug assertion.
    pub fn varargs(id: impl Into<String>, return_type: ValueType, params: Vec<ValueType>) -> Self {
        debug_assert!(!params.is_empty(), "varargs signature needs a repeating parameter type");
        Self { id: id.into(), return_type, params, varargs: true }
    }

    /// The function identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declared return type.
    pub const fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// The declared parameter types.
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Whether the final parameter repeats.
    pub const fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Checks an argument type list against this signature.
    ///
    /// # Errors
    ///
    /// Returns a human-readable mismatch description; the caller wraps it
    /// into its load-error type.
    pub fn check_args(&self, args: &[ValueType]) -> Result<(), String> {
        if self.varargs {
            let Some(repeating) = self.params.last() else {
                return Err(format!("{} declares varargs without a parameter type", self.id));
            };
            let fixed = self.params.len() - 1;
            if args.len() < fixed {
                return Err(format!(
                    "{} expects at least {fixed} arguments, got {}",
                    self.id,
                    args.len()
                ));
            }
            for (position, arg) in args.iter().enumerate() {
                let expected = self.params.get(position).unwrap_or(repeating);
                Self::check_one(&self.id, position, expected, arg)?;
            }
            Ok(())
        } else {
            if args.len() != self.params.len() {
                return Err(format!(
                    "{} expects {} arguments, got {}",
                    self.id,
                    self.params.len(),
                    args.len()
                ));
            }
            for (position, (expected, arg)) in self.params.iter().zip(args).enumerate() {
                Self::check_one(&self.id, position, expected, arg)?;
            }
            Ok(())
        }
    }

    fn check_one(id: &str, position: usize, expected: &ValueType, actual: &ValueType) -> Result<(), String> {
        if expected == actual {
            Ok(())
        } else {
            Err(format!(
                "{id} argument {position} has type {actual}, expected {expected}"
            ))
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.id)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        if self.varargs {
            f.write_str("...")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}
