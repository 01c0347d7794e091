use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkforge")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkforge")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the linkforge database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the linkforge database")
                        .default_value("~/.config/linkforge/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("import")
                .about("Imports pages from a JSON file into the database")
                .arg(
                    arg!(-d --"database" <PATH>)
                        .required(true)
                        .help("Path to the linkforge database"),
                )
                .arg(
                    arg!(-f --"file" <PATH>)
                        .required(true)
                        .help("Path to a JSON array of page records")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("plan")
                .about(
                    "Plans and injects internal links for one scope of a project. \
                Re-planning a scope snapshots and replaces its previous links.",
                )
                .arg(
                    arg!(-d --"database" <PATH>)
                        .required(true)
                        .help("Path to the linkforge database"),
                )
                .arg(
                    arg!(-p --"project" <ID>)
                        .required(true)
                        .help("Project to plan links for")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(-s --"scope" <SCOPE>)
                        .required(true)
                        .help("Planning scope: onboarding, cluster, blog")
                        .value_parser(["onboarding", "cluster", "blog"]),
                )
                .arg(
                    arg!(-c --"cluster" <ID>)
                        .required(false)
                        .help("Cluster id (required for cluster scope)")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(--"fallback-url" <URL>)
                        .required(false)
                        .help("Endpoint for LLM fallback injection when rule-based placement fails")
                        .value_parser(clap::value_parser!(Url)),
                ),
        )
        .subcommand(
            command!("report")
                .about("Generates a link plan report for one scope")
                .arg(
                    arg!(-d --"database" <PATH>)
                        .required(true)
                        .help("Path to the linkforge database"),
                )
                .arg(
                    arg!(-p --"project" <ID>)
                        .required(true)
                        .help("Project to report on")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(-s --"scope" <SCOPE>)
                        .required(true)
                        .help("Planning scope: onboarding, cluster, blog")
                        .value_parser(["onboarding", "cluster", "blog"]),
                )
                .arg(
                    arg!(-c --"cluster" <ID>)
                        .required(false)
                        .help("Cluster id (required for cluster scope)")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("restore")
                .about("Rolls page bodies and links back to a captured snapshot")
                .arg(
                    arg!(-d --"database" <PATH>)
                        .required(true)
                        .help("Path to the linkforge database"),
                )
                .arg(
                    arg!(-s --"snapshot" <ID>)
                        .required(true)
                        .help("The snapshot id to restore"),
                ),
        )
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
