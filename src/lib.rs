pub mod assembler;
pub mod cfg;
pub mod error;
pub mod utils;

pub use assembler::assembler::{compile_program, CompileOptions};
pub use cfg::three_address_code::{Func, FuncBuilder, Program};
pub use error::CodegenError;
