//! The TrueJ compiler front half: everything up to and including the proof
//! pass. Java emission only happens when no pass reported an error, and is
//! handled elsewhere.

mod ast;
mod errors;
mod kb;
mod prove;
mod report;
mod scope;
mod tokens;

use prove::ProofOptions;
use report::Reports;
use std::process::exit;

fn main() {
    let mut show_prolog = false;
    let mut options = ProofOptions {
        require_decorated_final_value: env_flag("TRUEJ_REQUIRE_DECORATED_FINAL"),
        ..ProofOptions::default()
    };
    let mut path: Option<String> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--show-prolog" => show_prolog = true,
            "--require-decorated-final" => options.require_decorated_final_value = true,
            _ if path.is_none() && !arg.starts_with('-') => path = Some(arg),
            _ => usage(),
        }
    }
    let path = path.unwrap_or_else(|| usage());

    let file_str = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", path, e);
            exit(2);
        }
    };

    let tokens = tokens::tokenize(&file_str);

    let invalid = tokens::collect_invalid(&tokens);
    if !invalid.is_empty() {
        let mut reports = Reports::new();
        for t in invalid {
            reports.collect(
                "Tokenizer",
                Some(t),
                format!("unrecognized character sequence {:?}", t.src),
            );
        }
        errors::display_errors(&file_str, &path, reports.records(), "compilation failed");
        exit(1);
    }

    let classes = match ast::try_parse(&tokens) {
        Ok(classes) => classes,
        Err(e) => {
            let mut reports = Reports::new();
            reports.collect("Parser", e.token, e.message);
            errors::display_errors(&file_str, &path, reports.records(), "compilation failed");
            exit(1);
        }
    };

    let mut reports = Reports::new();
    let scopes = scope::resolve(&classes, &mut reports);

    let transcript =
        match prove::prove_classes(&classes, &tokens, &file_str, &scopes, &options, &mut reports) {
            Ok(transcript) => transcript,
            Err(fatal) => {
                eprintln!("internal error: {}", fatal.message);
                exit(3);
            }
        };

    if show_prolog {
        println!("{}", transcript);
    }

    if !reports.is_empty() {
        errors::display_errors(&file_str, &path, reports.records(), "compilation failed");
        exit(1);
    }
}

fn usage() -> ! {
    eprintln!("usage: truej [--show-prolog] [--require-decorated-final] <file.tj>");
    exit(2);
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
