use crate::value::Value;

/// Outcome of executing one statement.
///
/// `return` is modeled as a value-carrying outcome rather than an
/// error: blocks, conditionals, and loops pass `Return` upward
/// unchanged and stop executing, and the function-call boundary turns
/// it back into an ordinary value. A runtime fault can never be
/// mistaken for a `return`, and vice versa.
#[derive(Debug)]
pub enum ControlFlow {
    Next,
    Return(Value),
}
