use crate::CLAP_STYLING;
use clap::{arg, command};
use divcrawl_scanner::fetch::{DEFAULT_BASE_URL, DEFAULT_ENCODING};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("divcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("divcrawl")
        .styles(CLAP_STYLING)
        .about(
            "Crawl the statistical division code tables (province to village) into a flat \
        JSON list. Runs a full crawl when no subcommand is given.",
        )
        .arg(arg!(-q --"quiet" "Suppress banner, progress and non-essential output").global(true))
        .arg(
            arg!(--"base-url" <URL>)
                .required(false)
                .help("Base address every page link is resolved against")
                .value_parser(clap::value_parser!(Url))
                .default_value(DEFAULT_BASE_URL)
                .global(true),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Where to write the JSON record list")
                .default_value("~/district.json")
                .global(true),
        )
        .arg(
            arg!(-r --"retries-file" <PATH>)
                .required(false)
                .help("Where to write the retry list as JSON (default: only printed)")
                .global(true),
        )
        .arg(
            arg!(-e --"encoding" <LABEL>)
                .required(false)
                .help("Encoding used when a page does not declare a charset")
                .default_value(DEFAULT_ENCODING)
                .global(true),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("10")
                .global(true),
        )
        .arg(
            arg!(--"pretty")
                .required(false)
                .help("Pretty-print the JSON output")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            arg!(--"root" <PAGE>)
                .required(false)
                .help("Root page listing the provinces")
                .default_value("index.html"),
        )
        .arg(
            arg!(-l --"max-level" <LEVEL>)
                .required(false)
                .help("Deepest level to expand: 1 province, 2 city, 3 county, 4 town, 5 village")
                .value_parser(clap::value_parser!(u8).range(1..=5))
                .default_value("5")
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("retry")
                .about(
                    "Re-expand the pages listed in a saved retry file and merge the new records \
                into the output file.",
                )
                .arg(
                    arg!(-f --"from" <PATH>)
                        .required(true)
                        .help("Retry list written by an earlier crawl"),
                ),
        )
}
