pub mod crawl;
pub mod data;

use colored::Colorize;

pub fn print_banner() {
    println!(
        "{} {}",
        "divcrawl".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "province → city → county → town → village".bright_black());
    println!();
}
