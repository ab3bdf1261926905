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

//! Demonstration methods served by `linkrpc serve`.

use linkrpc_common::protocol::error::Result;
use linkrpc_common::protocol::RpcParams;
use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::{MethodError, MethodResult};
use crate::params::{display_value, Operand, Params};

pub const ECHO: &str = "echo";
pub const CALCULATE: &str = "calculate";
pub const PROCESS_DATA: &str = "processData";

/// `echo [message]` -> `"Echo: <message>"`
pub fn echo(params: RpcParams) -> MethodResult {
    let params = Params::new(&params);
    let message = params
        .get(0)
        .ok_or_else(|| MethodError::invalid_params("No message to echo"))?;
    Ok(Value::String(format!("Echo: {}", display_value(message))))
}

/// `calculate [[a, b]]` -> `a + b`
///
/// Operands may be numbers or numeric strings. Two integers give an integer.
pub fn calculate(params: RpcParams) -> MethodResult {
    let params = Params::new(&params);
    let operands = match params.array(0) {
        Ok(operands) if operands.len() >= 2 => operands,
        _ => return Err(MethodError::invalid_params("Invalid parameters for calculate")),
    };

    match (Operand::from_value(&operands[0]), Operand::from_value(&operands[1])) {
        (Some(a), Some(b)) => Ok(a.add(b)),
        _ => Err(MethodError::invalid_params("Invalid numbers for calculation")),
    }
}

/// `processData [name, [args...]]` -> `"Processed: <name> with <n> parameters"`
pub fn process_data(params: RpcParams) -> MethodResult {
    let params = Params::new(&params);
    let invalid = |_| MethodError::invalid_params("Invalid parameters for processData");
    let name = params.str(0).map_err(invalid)?;
    let args = params.array(1).map_err(invalid)?;
    Ok(Value::String(format!(
        "Processed: {} with {} parameters",
        name,
        args.len()
    )))
}

/// Registers `echo`, `calculate` and `processData` on `dispatcher`.
pub fn register_demo_methods(dispatcher: &mut Dispatcher) -> Result<()> {
    dispatcher.register(ECHO, echo)?;
    dispatcher.register(CALCULATE, calculate)?;
    dispatcher.register(PROCESS_DATA, process_data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo() {
        assert_eq!(echo(vec![json!("hi")]).unwrap(), json!("Echo: hi"));
        assert_eq!(echo(vec![json!(5), json!("ignored")]).unwrap(), json!("Echo: 5"));
        assert_eq!(
            echo(vec![]).unwrap_err(),
            MethodError::InvalidParams("No message to echo".to_string())
        );
    }

    #[test]
    fn test_calculate() {
        assert_eq!(calculate(vec![json!([3, 4])]).unwrap(), json!(7));
        assert_eq!(calculate(vec![json!([1.5, 2])]).unwrap(), json!(3.5));
        assert_eq!(calculate(vec![json!(["3", "4"])]).unwrap(), json!(7));
        assert_eq!(calculate(vec![json!([1, 2, 99])]).unwrap(), json!(3));
    }

    #[test]
    fn test_calculate_rejects_bad_input() {
        let bad_shape = MethodError::InvalidParams("Invalid parameters for calculate".to_string());
        assert_eq!(calculate(vec![]).unwrap_err(), bad_shape);
        assert_eq!(calculate(vec![json!([1])]).unwrap_err(), bad_shape);
        assert_eq!(calculate(vec![json!(3), json!(4)]).unwrap_err(), bad_shape);

        assert_eq!(
            calculate(vec![json!(["x", 4])]).unwrap_err(),
            MethodError::InvalidParams("Invalid numbers for calculation".to_string())
        );
    }

    #[test]
    fn test_process_data() {
        assert_eq!(
            process_data(vec![json!("load"), json!([1, 2, 3])]).unwrap(),
            json!("Processed: load with 3 parameters")
        );
        assert_eq!(
            process_data(vec![json!("load")]).unwrap_err(),
            MethodError::InvalidParams("Invalid parameters for processData".to_string())
        );
        assert!(process_data(vec![json!(1), json!([])]).is_err());
    }

    #[test]
    fn test_register_demo_methods() {
        let mut dispatcher = Dispatcher::new();
        register_demo_methods(&mut dispatcher).unwrap();
        assert!(dispatcher.has_method(ECHO));
        assert!(dispatcher.has_method(CALCULATE));
        assert!(dispatcher.has_method(PROCESS_DATA));
    }
}
