use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::environment::Environment;
use crate::value::{NativeFunction, Value};

/// Installs the host-provided functions into the globals scope. Done
/// once when the interpreter is constructed.
pub fn install(globals: &Rc<Environment>) {
    globals.define(
        "clock",
        Value::Native(Rc::new(NativeFunction {
            name: "clock",
            arity: 0,
            call: clock,
        })),
    );
}

/// Seconds since the Unix epoch, as a number.
fn clock(_arguments: &[Value]) -> Value {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch");
    Value::Number(elapsed.as_secs_f64())
}
