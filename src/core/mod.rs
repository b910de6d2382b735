pub mod compiler;
pub mod conditional;
pub mod config;
pub mod context;
pub mod eval;
pub mod expr;
pub mod filter;
pub mod lexer;
pub mod links;
pub mod pipeline;
pub mod print;
pub mod scanner;
pub mod store;
pub mod visited;
