// Copyright 2025 LinkRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Positional parameter access for method handlers.

use serde_json::{Number, Value};

use crate::error::MethodError;

/// Read-only view over a request's positional parameters.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    values: &'a [Value],
}

impl<'a> Params<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    pub fn required(&self, index: usize) -> Result<&'a Value, MethodError> {
        self.get(index)
            .ok_or_else(|| MethodError::invalid_params(format!("missing parameter {}", index)))
    }

    pub fn str(&self, index: usize) -> Result<&'a str, MethodError> {
        self.required(index)?.as_str().ok_or_else(|| {
            MethodError::invalid_params(format!("parameter {} must be a string", index))
        })
    }

    pub fn array(&self, index: usize) -> Result<&'a [Value], MethodError> {
        self.required(index)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| MethodError::invalid_params(format!("parameter {} must be an array", index)))
    }
}

/// A numeric operand, keeping integers exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
}

impl Operand {
    /// Reads a JSON number, or a string holding one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Operand::Int)
                    .or_else(|_| s.parse::<f64>().map(Operand::Float))
                    .ok()
                    .filter(Operand::is_finite)
            }
            _ => None,
        }
    }

    fn from_number(n: &Number) -> Option<Self> {
        match n.as_i64() {
            Some(i) => Some(Operand::Int(i)),
            None => n.as_f64().map(Operand::Float),
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Operand::Int(_) => true,
            Operand::Float(f) => f.is_finite(),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Operand::Int(i) => i as f64,
            Operand::Float(f) => f,
        }
    }

    /// Integer sum when both sides are integers and it fits, float otherwise.
    pub fn add(self, other: Operand) -> Value {
        if let (Operand::Int(a), Operand::Int(b)) = (self, other) {
            if let Some(sum) = a.checked_add(b) {
                return Value::from(sum);
            }
        }
        Number::from_f64(self.as_f64() + other.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Renders a parameter for inclusion in text: strings verbatim, anything
/// else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_accessors() {
        let values = vec![json!("name"), json!([1, 2]), json!(3)];
        let params = Params::new(&values);

        assert_eq!(params.len(), 3);
        assert_eq!(params.str(0).unwrap(), "name");
        assert_eq!(params.array(1).unwrap().len(), 2);
        assert!(params.str(2).is_err());
        assert!(params.array(0).is_err());
        assert_eq!(
            params.required(5).unwrap_err(),
            MethodError::InvalidParams("missing parameter 5".to_string())
        );
    }

    #[test]
    fn test_operand_parsing() {
        assert_eq!(Operand::from_value(&json!(3)), Some(Operand::Int(3)));
        assert_eq!(Operand::from_value(&json!(2.5)), Some(Operand::Float(2.5)));
        assert_eq!(Operand::from_value(&json!(" 4 ")), Some(Operand::Int(4)));
        assert_eq!(Operand::from_value(&json!("1.5")), Some(Operand::Float(1.5)));
        assert_eq!(Operand::from_value(&json!("abc")), None);
        assert_eq!(Operand::from_value(&json!("NaN")), None);
        assert_eq!(Operand::from_value(&json!(null)), None);
        assert_eq!(Operand::from_value(&json!([1])), None);
    }

    #[test]
    fn test_operand_add_keeps_integers() {
        assert_eq!(Operand::Int(3).add(Operand::Int(4)), json!(7));
        assert_eq!(Operand::Int(1).add(Operand::Float(0.5)), json!(1.5));
        assert_eq!(Operand::Int(i64::MAX).add(Operand::Int(1)), json!(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("hi")), "hi");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
