pub mod modern;
pub mod pipe;
pub mod sink;
pub mod styles;

pub use modern::{ViewConfig, display_mini_player};
pub use pipe::display_pipe;
