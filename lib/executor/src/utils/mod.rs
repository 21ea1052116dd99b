pub mod consts;
pub mod pretty_display;
pub mod traverse;
