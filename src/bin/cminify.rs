use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

use clap::{App, Arg, ArgGroup};
use log::info;

use cminify::{rank_candidates, spelling_text, tokens, MinimizeOptions, Minimizer};

enum Action {
    Minimize,
    Count,
    DumpTokens,
    Top(usize),
}

struct Options {
    action: Action,
    output: Option<String>,
    input: String,
    minimize: MinimizeOptions,
}

fn is_number(value: String) -> Result<(), String> {
    value
        .parse::<usize>()
        .map(|_| ())
        .map_err(|err| format!("{}: {}", value, err))
}

impl Options {
    fn match_options() -> Self {
        let matches = App::new("cminify")
            .version("0.0.1")
            .about("Shrinks the token count of a C program by extracting macros")
            .arg(
                Arg::with_name("count")
                    .long("count")
                    .help("Print the token count and exit"),
            )
            .arg(
                Arg::with_name("dump_tokens")
                    .long("dump-tokens")
                    .help("Dump tokens, one per line; for debugging"),
            )
            .arg(
                Arg::with_name("top")
                    .long("top")
                    .help("Print the best macro candidates without rewriting")
                    .takes_value(true)
                    .empty_values(false)
                    .validator(is_number)
                    .value_name("n"),
            )
            .group(ArgGroup::with_name("actions").args(&["count", "dump_tokens", "top"]))
            .arg(
                Arg::with_name("out_name")
                    .short("o")
                    .help("Output file name")
                    .takes_value(true)
                    .empty_values(false)
                    .value_name("file"),
            )
            .arg(
                Arg::with_name("prefix")
                    .long("prefix")
                    .help("Prefix of generated macro names")
                    .takes_value(true)
                    .empty_values(false)
                    .default_value("m")
                    .value_name("name"),
            )
            .arg(
                Arg::with_name("max_macros")
                    .long("max-macros")
                    .help("Stop after generating this many macros")
                    .takes_value(true)
                    .validator(is_number)
                    .value_name("n"),
            )
            .arg(
                Arg::with_name("max_len")
                    .long("max-len")
                    .help("Longest run of tokens considered for a macro body")
                    .takes_value(true)
                    .validator(is_number)
                    .value_name("tokens"),
            )
            .arg(
                Arg::with_name("FILENAME")
                    .help("Source file to minimize; reads stdin if absent or -")
                    .index(1),
            )
            .get_matches();

        let number = |name: &str| {
            matches
                .value_of(name)
                .and_then(|value| value.parse::<usize>().ok())
        };

        let action = if matches.is_present("count") {
            Action::Count
        } else if matches.is_present("dump_tokens") {
            Action::DumpTokens
        } else if let Some(n) = number("top") {
            Action::Top(n)
        } else {
            Action::Minimize
        };

        Options {
            action,
            output: matches.value_of("out_name").map(str::to_string),
            input: matches.value_of("FILENAME").unwrap_or("-").to_string(),
            minimize: MinimizeOptions {
                prefix: matches.value_of("prefix").unwrap_or("m").to_string(),
                max_macros: number("max_macros"),
                max_len: number("max_len"),
            },
        }
    }

    fn get_output(&self) -> &str {
        match self.output.as_ref() {
            Some(output) => output,
            None => "-",
        }
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::match_options();

    let code = read_input(&options.input)?;

    // Nothing is written until the work succeeds, so `-o` may name the input
    let output: String = match options.action {
        Action::Count => match cminify::count_tokens(&code) {
            Ok(count) => format!("{}\n", count),
            Err(err) => lexing_failed(err),
        },
        Action::DumpTokens => match tokens(&code) {
            Ok(tokens) => tokens
                .iter()
                .map(|token| format!("{:?}\n", token))
                .collect(),
            Err(err) => lexing_failed(err),
        },
        Action::Top(n) => match tokens(&code) {
            Ok(tokens) => rank_candidates(&tokens, options.minimize.max_len)
                .iter()
                .take(n)
                .map(|candidate| {
                    format!(
                        "==== Score: {} ({} occurrences)\n{}\n",
                        candidate.score,
                        candidate.frequency(),
                        spelling_text(candidate.body(&tokens))
                    )
                })
                .collect(),
            Err(err) => lexing_failed(err),
        },
        Action::Minimize => {
            let report = match Minimizer::new(options.minimize.clone()).run(&code) {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(1);
                }
            };
            info!(
                "Initial tokens: {}, macroed tokens: {} ({} macros)",
                report.initial_tokens,
                report.final_tokens,
                report.macros.len()
            );
            report.source
        }
    };

    let mut out = open_output_file(options.get_output())?;
    out.write_all(output.as_bytes())?;
    out.flush()
}

fn lexing_failed(err: cminify::LexError) -> ! {
    eprintln!("Lexing error: {}", err);
    process::exit(1);
}

fn read_input(name: &str) -> io::Result<String> {
    let mut code = String::new();
    if name == "-" {
        io::stdin().read_to_string(&mut code)?;
    } else {
        File::open(name)?.read_to_string(&mut code)?;
    }
    Ok(code)
}

fn open_output_file(name: &str) -> io::Result<Box<dyn Write>> {
    if name == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(File::create(&name)?))
    }
}
