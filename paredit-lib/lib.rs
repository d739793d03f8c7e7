//! Structural editing on top of the Clojure scanner: the line model, token
//! cursors, paredit commands, indentation and undo.

pub mod config;
pub mod cursor;
pub mod document;
pub mod history;
pub mod indent;
pub mod model;
pub mod paredit;
