pub mod data;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod validate;

pub use data::Database;
pub use model::{Page, Scope, ScopeKey};
pub use pipeline::{JobRegistry, Orchestrator, PipelineError, PlannerSettings};

use colored::Colorize;

pub fn print_banner() {
    println!(
        "{}",
        r#"
    __    _       __   ____
   / /   (_)___  / /__/ __/___  _________ ____
  / /   / / __ \/ //_/ /_/ __ \/ ___/ __ `/ _ \
 / /___/ / / / / ,< / __/ /_/ / /  / /_/ /  __/
/_____/_/_/ /_/_/|_/_/  \____/_/   \__, /\___/
                                  /____/"#
            .bright_blue()
            .bold()
    );
    println!(
        "{}\n",
        "        internal link planning for generated sites".bright_white()
    );
}
