pub mod cfg_visualizer;
pub mod three_address_code;
pub mod utils;
