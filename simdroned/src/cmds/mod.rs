pub use list::*;
pub use run::*;

mod list;
mod run;
