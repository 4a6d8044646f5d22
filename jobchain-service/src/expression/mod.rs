// Expression Engine Module
// `${path}` / `${name}` references and `$func(args);` calls with a small argument evaluator

pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod patterns;
pub mod resolver;

pub use evaluator::{evaluate, EvalError, Evaluator};
pub use functions::{BuiltinFunction, BUILTIN_FUNCTIONS};
pub use lexer::{LexError, Lexer, Token};
pub use parser::{BinaryOp, Expr, ExprParser, ParseExprError, UnaryOp};
pub use resolver::{apply_function, evaluate_arguments, substitute, Resolver};
