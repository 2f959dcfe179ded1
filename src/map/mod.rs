//! Map geometry and tile state

pub mod coords;
pub mod grid;
