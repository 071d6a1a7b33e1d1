pub mod addr_fold;
pub mod assembler;
pub mod codegen;
#[path = "visual/ig_visualizer.rs"]
pub mod ig_visualizer;
pub mod interference_graph;
pub mod liveness;
pub mod parallel_move;
pub mod reg_alloc;
pub mod x86;

#[cfg(test)]
mod tests;
