use std::time::{SystemTime, UNIX_EPOCH};

use crate::evaluator::RuntimeErrorKind;
use crate::types::Value;

/// `clock()`: milliseconds since the Unix epoch, as an int.
pub fn prim_clock(_args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RuntimeErrorKind::Native(format!("clock error: {}", e)))?;
    let millis = i64::try_from(elapsed.as_millis())
        .map_err(|_| RuntimeErrorKind::Native("clock overflowed an int".to_string()))?;
    Ok(Value::Integer(millis))
}
